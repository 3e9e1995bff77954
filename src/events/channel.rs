use poise::serenity_prelude::{self as serenity, ChannelId, GuildId};
use tracing::{debug, warn};

use crate::error::Result;
use crate::managers::LockdownManager;

/// Handle a deleted guild channel.
///
/// A channel deleted while locked keeps its snapshot; the next disable
/// reports it as unavailable. Returns whether the channel was tracked.
pub async fn handle_channel_delete(
    channel: &serenity::GuildChannel,
    manager: &LockdownManager,
) -> Result<bool> {
    let tracked = is_tracked(manager, channel.guild_id, channel.id).await?;
    if tracked {
        warn!(
            "Channel '{}' ({}) was deleted while under lockdown in guild {}; it will be skipped on disable",
            channel.name, channel.id, channel.guild_id
        );
    } else {
        debug!("Channel {} deleted in guild {}", channel.id, channel.guild_id);
    }
    Ok(tracked)
}

/// Whether the active lockdown of `guild_id` holds a snapshot of `channel_id`
async fn is_tracked(manager: &LockdownManager, guild_id: GuildId, channel_id: ChannelId) -> Result<bool> {
    Ok(manager
        .status(guild_id)
        .await?
        .is_some_and(|state| state.channels.contains_key(&channel_id.to_string())))
}
