use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(poise::CreateReply::default()
        .content("Pong! Lockdown bot is working!")
        .ephemeral(true))
        .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let settings = ctx.data().lockdown_manager.settings();
    let embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("/ping", "Check if the bot is running", false)
        .field(
            "/lockdown enable [scope] [reason]",
            format!(
                "Deny @everyone sending, reactions and threads in this channel, its category or every channel (Manage Channels, default scope: {})",
                settings.default_scope
            ),
            false,
        )
        .field(
            "/lockdown disable [reason]",
            "Restore the @everyone overwrites saved when the lockdown started (Manage Channels)",
            false,
        )
        .field("/lockdown status", "Show the current lockdown for this server", false)
        .color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
