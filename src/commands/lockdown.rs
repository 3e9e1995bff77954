use poise::serenity_prelude as serenity;
use tracing::{info, warn};

use crate::error::BotError;
use crate::lockdown::{SerenityGuild, SkippedChannel};
use crate::managers::{DisableOutcome, DisableRequest, EnableOutcome, EnableRequest};
use crate::state::{GuildLockdownState, LockdownScope};
use crate::{Context, Error};

const COLOR_LOCKED: u32 = 0xe74c3c;
const COLOR_UNLOCKED: u32 = 0x2ecc71;
const COLOR_WARNING: u32 = 0xf39c12;
const COLOR_INFO: u32 = 0x3498db;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ScopeChoice {
    #[name = "This channel"]
    Channel,
    #[name = "This category"]
    Category,
    #[name = "All channels"]
    All,
}

impl From<ScopeChoice> for LockdownScope {
    fn from(choice: ScopeChoice) -> Self {
        match choice {
            ScopeChoice::Channel => LockdownScope::Channel,
            ScopeChoice::Category => LockdownScope::Category,
            ScopeChoice::All => LockdownScope::All,
        }
    }
}

/// Render skipped channels one per line, summarising past `max`
pub fn format_skipped(skipped: &[SkippedChannel], max: usize) -> String {
    if skipped.is_empty() {
        return "None".to_string();
    }

    let mut lines: Vec<String> = skipped
        .iter()
        .take(max)
        .map(|s| {
            let name = if s.channel_name.is_empty() {
                &s.channel_id
            } else {
                &s.channel_name
            };
            format!("- **{}** - {}", name, s.reason)
        })
        .collect();

    if skipped.len() > max {
        lines.push(format!("...and **{}** more.", skipped.len() - max));
    }
    lines.join("\n")
}

fn reason_text(reason: Option<&str>) -> String {
    reason.map(str::to_string).unwrap_or_else(|| "*none*".to_string())
}

fn relative_time(enabled_at_ms: i64) -> String {
    format!("<t:{}:R>", enabled_at_ms.div_euclid(1000))
}

/// Title, body and colour of the reply to `/lockdown enable`
fn describe_enable(outcome: &EnableOutcome, preview: usize) -> (&'static str, String, u32) {
    match outcome {
        EnableOutcome::AlreadyActive(existing) => (
            "Lockdown",
            format!(
                "Lockdown is already **active**\nEnabled {} by <@{}>.\nUse `/lockdown disable` first.",
                relative_time(existing.enabled_at),
                existing.enabled_by
            ),
            COLOR_WARNING,
        ),
        EnableOutcome::NoTargets { scope } => {
            let body = if *scope == LockdownScope::Category {
                "This channel has no category; nothing to lock."
            } else {
                "No lockable channels found for that scope."
            };
            ("Lockdown", body.to_string(), COLOR_WARNING)
        }
        EnableOutcome::NothingLocked { skipped } => (
            "Lockdown",
            format!(
                "I couldn't lock any channels (likely missing **Manage Channels** in all targets)\n\nSkipped:\n{}",
                format_skipped(skipped, preview)
            ),
            COLOR_WARNING,
        ),
        EnableOutcome::Enabled { state, skipped } => (
            "Lockdown enabled",
            format!(
                "- Scope: **{}**\n- Channels locked: **{}**\n- Skipped: **{}**\n- Reason: {}\n\nSkipped details:\n{}",
                state.scope,
                state.channel_count(),
                skipped.len(),
                reason_text(state.reason.as_deref()),
                format_skipped(skipped, preview)
            ),
            COLOR_LOCKED,
        ),
    }
}

/// Title, body and colour of the reply to `/lockdown disable`
fn describe_disable(
    outcome: &DisableOutcome,
    reason: Option<&str>,
    preview: usize,
) -> (&'static str, String, u32) {
    match outcome {
        DisableOutcome::NotActive => (
            "Lockdown disable",
            "Lockdown is **not active** (no stored state for this server).".to_string(),
            COLOR_INFO,
        ),
        DisableOutcome::Partial {
            restored,
            skipped,
            remaining,
        } => (
            "Lockdown disable was partial",
            format!(
                "- Restored: **{}**\n- Still locked (stored): **{}**\n- Skipped: **{}**\n\nYou can run `/lockdown disable` again after fixing permissions or missing channels.\n\nSkipped details:\n{}",
                restored.len(),
                remaining.channel_count(),
                skipped.len(),
                format_skipped(skipped, preview)
            ),
            COLOR_WARNING,
        ),
        DisableOutcome::Completed { restored, skipped } => (
            "Lockdown disabled",
            format!(
                "- Channels restored: **{}**\n- Skipped: **{}**\n- Reason: {}\n\nSkipped details:\n{}",
                restored.len(),
                skipped.len(),
                reason_text(reason),
                format_skipped(skipped, preview)
            ),
            COLOR_UNLOCKED,
        ),
    }
}

/// Body of the reply to `/lockdown status`
fn describe_status(state: Option<&GuildLockdownState>) -> (String, u32) {
    let Some(state) = state else {
        return ("Lockdown is **not active** for this server.".to_string(), COLOR_INFO);
    };

    let enabled = match state.enabled_at_utc() {
        Some(at) => format!(
            "{} ({})",
            at.format("%Y-%m-%d %H:%M UTC"),
            relative_time(state.enabled_at)
        ),
        None => relative_time(state.enabled_at),
    };

    (
        format!(
            "Lockdown is **active**.\n- Scope: **{}**\n- Enabled: {}\n- Enabled by: <@{}>\n- Channels locked: **{}**\n- Reason: {}",
            state.scope,
            enabled,
            state.enabled_by,
            state.channel_count(),
            reason_text(state.reason.as_deref())
        ),
        COLOR_LOCKED,
    )
}

async fn reply_embed(ctx: Context<'_>, title: &str, body: String, color: u32) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .description(body)
        .color(color);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

async fn reply_busy(ctx: Context<'_>) -> Result<(), Error> {
    reply_embed(
        ctx,
        "Lockdown",
        "Another lockdown command is still running for this server. Try again in a moment."
            .to_string(),
        COLOR_WARNING,
    )
    .await
}

/// Lock or unlock channels by denying @everyone send, reactions and threads
#[poise::command(
    slash_command,
    guild_only,
    subcommands("lockdown_enable", "lockdown_disable", "lockdown_status"),
    subcommand_required,
    default_member_permissions = "MANAGE_CHANNELS"
)]
pub async fn lockdown(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Enable lockdown
#[poise::command(slash_command, guild_only, rename = "enable")]
pub async fn lockdown_enable(
    ctx: Context<'_>,
    #[description = "Where to apply lockdown"] scope: Option<ScopeChoice>,
    #[description = "Optional reason"]
    #[max_length = 200]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;

    // Bulk channel edits can take longer than the interaction deadline
    ctx.defer_ephemeral().await?;

    let manager = &ctx.data().lockdown_manager;
    let settings = manager.settings();
    let scope = scope.map(LockdownScope::from).unwrap_or(settings.default_scope);
    let reason = settings.normalize_reason(reason);

    let platform = SerenityGuild::load(ctx.serenity_context(), guild_id).await?;
    let request = EnableRequest {
        guild_id,
        scope,
        current_channel: ctx.channel_id(),
        actor_id: ctx.author().id,
        actor_tag: ctx.author().tag(),
        reason,
    };

    let outcome = match manager.enable(&platform, request).await {
        Ok(outcome) => outcome,
        Err(BotError::LockdownBusy { .. }) => return reply_busy(ctx).await,
        Err(e) => return Err(e.into()),
    };

    if let EnableOutcome::Enabled { state, skipped } = &outcome {
        info!(
            "Lockdown enabled in guild {}: {} locked, {} skipped",
            platform.guild_id(),
            state.channel_count(),
            skipped.len()
        );
    }

    let (title, body, color) = describe_enable(&outcome, settings.skipped_preview_limit);
    reply_embed(ctx, title, body, color).await
}

/// Disable lockdown (restore previous @everyone overwrites)
#[poise::command(slash_command, guild_only, rename = "disable")]
pub async fn lockdown_disable(
    ctx: Context<'_>,
    #[description = "Optional reason"]
    #[max_length = 200]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;

    ctx.defer_ephemeral().await?;

    let manager = &ctx.data().lockdown_manager;
    let settings = manager.settings();
    let reason = settings.normalize_reason(reason);

    let platform = SerenityGuild::load(ctx.serenity_context(), guild_id).await?;
    let request = DisableRequest {
        guild_id,
        actor_tag: ctx.author().tag(),
        reason: reason.clone(),
    };

    let outcome = match manager.disable(&platform, request).await {
        Ok(outcome) => outcome,
        Err(BotError::LockdownBusy { .. }) => return reply_busy(ctx).await,
        Err(e) => return Err(e.into()),
    };

    if let DisableOutcome::Partial { remaining, .. } = &outcome {
        warn!(
            "Lockdown in guild {} still holds {} channel(s) after disable",
            guild_id,
            remaining.channel_count()
        );
    }

    let (title, body, color) =
        describe_disable(&outcome, reason.as_deref(), settings.skipped_preview_limit);
    reply_embed(ctx, title, body, color).await
}

/// Show current lockdown status for this server
#[poise::command(slash_command, guild_only, rename = "status")]
pub async fn lockdown_status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;

    let state = ctx.data().lockdown_manager.status(guild_id).await?;
    let (body, color) = describe_status(state.as_ref());
    reply_embed(ctx, "Lockdown status", body, color).await
}
