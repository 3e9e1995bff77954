use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, ChannelId, GuildId, Http, Permissions, RoleId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::channels::{ChannelKind, ChannelTree, GuildChannelInfo};
use super::permissions::{EveryoneOverwrite, TriStateMap};
use super::platform::{ChannelError, LockdownPlatform};
use crate::error::{BotError, Result};

/// A guild as seen from the serenity cache at the start of one command.
///
/// Channel tree, overwrites and the bot's capabilities are captured once;
/// only overwrite writes go to the Discord API.
pub struct SerenityGuild {
    http: Arc<Http>,
    guild_id: GuildId,
    everyone_role: RoleId,
    channels: Vec<GuildChannelInfo>,
    manageable: HashSet<ChannelId>,
}

impl SerenityGuild {
    pub async fn load(ctx: &serenity::Context, guild_id: GuildId) -> Result<Self> {
        let guild = ctx
            .cache
            .guild(guild_id)
            .map(|g| (*g).clone())
            .ok_or_else(|| BotError::GuildNotFound {
                id: guild_id.to_string(),
            })?;

        let bot_id = ctx.cache.current_user().id;
        let bot_member = guild_id.member(ctx, bot_id).await?;

        Ok(Self::from_guild(ctx.http.clone(), &guild, &bot_member))
    }

    fn from_guild(http: Arc<Http>, guild: &serenity::Guild, bot: &serenity::Member) -> Self {
        let everyone_role = guild.id.everyone_role();

        let mut channels: Vec<GuildChannelInfo> = guild
            .channels
            .values()
            .map(|c| channel_info(c, everyone_role))
            .collect();
        channels.sort_by_key(|c| (c.position, c.id));

        let manageable = guild
            .channels
            .values()
            .filter(|c| {
                guild
                    .user_permissions_in(c, bot)
                    .contains(Permissions::MANAGE_CHANNELS)
            })
            .map(|c| c.id)
            .collect();

        Self {
            http,
            guild_id: guild.id,
            everyone_role,
            channels,
            manageable,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }
}

fn channel_info(channel: &serenity::GuildChannel, everyone_role: RoleId) -> GuildChannelInfo {
    let everyone = channel
        .permission_overwrites
        .iter()
        .find(|ow| matches!(ow.kind, serenity::PermissionOverwriteType::Role(r) if r == everyone_role))
        .map(|ow| EveryoneOverwrite {
            allow: ow.allow,
            deny: ow.deny,
        });

    GuildChannelInfo {
        id: channel.id,
        name: channel.name.clone(),
        kind: ChannelKind::from(channel.kind),
        parent_id: channel.parent_id,
        position: channel.position,
        everyone,
    }
}

impl ChannelTree for SerenityGuild {
    fn channel(&self, id: ChannelId) -> Option<GuildChannelInfo> {
        self.channels.iter().find(|c| c.id == id).cloned()
    }

    fn children_of(&self, category: ChannelId) -> Vec<GuildChannelInfo> {
        self.channels
            .iter()
            .filter(|c| c.parent_id == Some(category))
            .cloned()
            .collect()
    }

    fn all_channels(&self) -> Vec<GuildChannelInfo> {
        self.channels.clone()
    }
}

#[async_trait]
impl LockdownPlatform for SerenityGuild {
    fn can_manage(&self, channel: ChannelId) -> bool {
        self.manageable.contains(&channel)
    }

    async fn write_everyone(
        &self,
        channel: ChannelId,
        patch: &TriStateMap,
        audit_reason: &str,
    ) -> std::result::Result<(), ChannelError> {
        let current = self.channel(channel).and_then(|c| c.everyone);
        let target = serenity::TargetId::new(self.everyone_role.get());

        let result = match OverwriteWrite::plan(patch, current) {
            OverwriteWrite::Put(overwrite) => {
                // type 0 = role overwrite
                let body = serde_json::json!({
                    "allow": overwrite.allow.bits().to_string(),
                    "deny": overwrite.deny.bits().to_string(),
                    "type": 0,
                });
                self.http
                    .create_permission(channel, target, &body, Some(audit_reason))
                    .await
            }
            // The cache may lag behind our own enable write
            OverwriteWrite::Delete => match self
                .http
                .delete_permission(channel, target, Some(audit_reason))
                .await
            {
                Err(e) if is_unknown_overwrite(&e) => {
                    debug!("No @everyone overwrite to remove on {}", channel);
                    Ok(())
                }
                other => other,
            },
        };

        result.map_err(|e| ChannelError::RemoteWrite {
            message: e.to_string(),
        })
    }
}

/// Request sent to Discord for one `@everyone` overwrite write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverwriteWrite {
    Put(EveryoneOverwrite),
    Delete,
}

impl OverwriteWrite {
    fn plan(patch: &TriStateMap, current: Option<EveryoneOverwrite>) -> Self {
        match patch.merge_into(current) {
            Some(overwrite) => OverwriteWrite::Put(overwrite),
            None => OverwriteWrite::Delete,
        }
    }
}

/// Discord JSON error code for "Unknown Overwrite"
const UNKNOWN_OVERWRITE: isize = 10009;

fn is_unknown_overwrite(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(resp))
            if resp.error.code == UNKNOWN_OVERWRITE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockdown::permissions::PermissionKey;

    fn all_unset() -> TriStateMap {
        TriStateMap::capture(None)
    }

    #[test]
    fn test_unset_restore_deletes_even_when_cache_shows_no_overwrite() {
        // Cache not yet updated after the enable write
        assert_eq!(OverwriteWrite::plan(&all_unset(), None), OverwriteWrite::Delete);

        let locked = TriStateMap::lockdown().merge_into(None);
        assert_eq!(OverwriteWrite::plan(&all_unset(), locked), OverwriteWrite::Delete);
    }

    #[test]
    fn test_lock_and_partial_restore_put_merged_overwrite() {
        let existing = EveryoneOverwrite {
            allow: Permissions::ATTACH_FILES,
            deny: Permissions::empty(),
        };

        let OverwriteWrite::Put(locked) = OverwriteWrite::plan(&TriStateMap::lockdown(), Some(existing)) else {
            panic!("locking must write an overwrite");
        };
        assert!(locked.allow.contains(Permissions::ATTACH_FILES));
        assert!(locked.deny.contains(PermissionKey::SendMessages.bit()));

        assert_eq!(
            OverwriteWrite::plan(&all_unset(), Some(locked)),
            OverwriteWrite::Put(existing)
        );
    }

    #[test]
    fn test_other_errors_are_not_unknown_overwrite() {
        let err = serenity::Error::Other("boom");
        assert!(!is_unknown_overwrite(&err));
    }
}
