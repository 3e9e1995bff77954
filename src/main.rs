use anyhow::{Context as _, Result};
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};

/// Discord bot that locks and unlocks guild channels for @everyone
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to all guilds (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to sync commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,
}

mod commands;
mod config;
mod error;
mod events;
mod lockdown;
mod logging;
mod managers;
mod state;

use commands::{help, ping};
use config::{BotConfig, LockdownSettings};
use events::handle_channel_delete;
use managers::{create_shared_lockdown_manager, SharedLockdownManager};
use state::create_shared_lockdown_store;

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub lockdown_manager: SharedLockdownManager,
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::ChannelDelete { channel, .. } = event {
        if let Err(e) = handle_channel_delete(channel, &data.lockdown_manager).await {
            error!("Failed to handle channel delete: {}", e);
        }
    }
    Ok(())
}

/// Log the application ID encoded in the first segment of the token
fn log_bot_id(token: &str) {
    use base64::Engine;

    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };
    // Discord tokens use base64 without padding, sometimes the URL-safe variant
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));

    if let Some(id_str) = decoded.ok().and_then(|d| String::from_utf8(d).ok()) {
        info!(
            "Bot ID: {} (invite it with the Manage Channels permission at https://discord.com/developers/applications/{}/oauth2)",
            id_str, id_str
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let bot_config = BotConfig::from_env().context("Failed to read bot configuration")?;
    logging::init_tracing(&bot_config.log_level);
    log_bot_id(&bot_config.token);

    let settings_path = bot_config.lockdown_settings_file();
    info!("Loading lockdown settings from {}...", settings_path.display());
    let settings = LockdownSettings::load_or_default(&settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;

    // Ensure state directory exists
    tokio::fs::create_dir_all(&bot_config.state_path)
        .await
        .with_context(|| format!("Failed to create {}", bot_config.state_path.display()))?;

    let store = create_shared_lockdown_store(bot_config.lockdown_state_file());
    info!("Loading lockdown state from {}...", store.path().display());
    match store.active_guilds().await {
        Ok(active) if active.is_empty() => info!("No active lockdowns"),
        Ok(active) => {
            for state in &active {
                warn!(
                    "Guild {} is under lockdown since {} (scope {}, {} channel(s), by {})",
                    state.guild_id,
                    state
                        .enabled_at_utc()
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| state.enabled_at.to_string()),
                    state.scope,
                    state.channel_count(),
                    state.enabled_by
                );
            }
        }
        Err(e) => error!("Could not read lockdown state: {}", e),
    }

    let lockdown_manager = create_shared_lockdown_manager(store, settings);

    // Extract CLI flags for use in setup
    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id;

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Targeting specific guild {}", gid);
    }

    // Build framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![ping(), help(), commands::lockdown()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                        }
                        poise::FrameworkError::MissingBotPermissions { missing_permissions, ctx, .. } => {
                            error!("Bot missing permissions for '{}': {:?}", ctx.command().qualified_name, missing_permissions);
                            let _ = ctx.say(format!("Bot is missing permissions: {:?}", missing_permissions)).await;
                        }
                        poise::FrameworkError::MissingUserPermissions { missing_permissions, ctx, .. } => {
                            error!("User {} missing permissions for '{}': {:?}", ctx.author().name, ctx.command().qualified_name, missing_permissions);
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                            let _ = ctx.say("This command can only be used in a server.").await;
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let lockdown_manager = lockdown_manager.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                // Determine which guilds to register commands for
                let guilds_to_register: Vec<serenity::GuildId> = if let Some(gid) = target_guild_id {
                    vec![serenity::GuildId::new(gid)]
                } else {
                    ready.guilds.iter().map(|g| g.id).collect()
                };

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        ).await {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Successfully registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    ).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!("Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                              framework.options().commands.len());
                    }
                }

                Ok(Data { lockdown_manager })
            })
        })
        .build();

    // GUILDS covers the channel cache and ChannelDelete
    let intents = serenity::GatewayIntents::non_privileged();

    let mut client = serenity::ClientBuilder::new(&bot_config.token, intents)
        .framework(framework)
        .await
        .context("Failed to create Discord client")?;

    info!("Starting bot...");
    client.start().await.context("Bot stopped with an error")?;
    warn!("Bot ended.");

    Ok(())
}
