use poise::serenity_prelude::ChannelId;
use tracing::{debug, info, warn};

use super::permissions::TriStateMap;
use super::platform::{audit_reason, ChannelError, LockdownPlatform, SkippedChannel};
use crate::state::GuildLockdownState;

/// Result of restoring the channels of a lockdown
#[derive(Debug, Default)]
pub struct RestoreOutcome {
    /// IDs of channels whose overwrite was confirmed restored
    pub restored: Vec<String>,
    pub skipped: Vec<SkippedChannel>,
}

/// Write every recorded `before` snapshot back to its channel.
///
/// Safe to re-run against the same state: restoring a channel twice writes
/// the same values twice. Channels that fail stay in the caller's state so
/// a later run only retries those.
pub async fn restore_lockdown<P: LockdownPlatform + ?Sized>(
    platform: &P,
    state: &GuildLockdownState,
    audit_tag: &str,
    actor: &str,
    reason: Option<&str>,
) -> RestoreOutcome {
    let mut outcome = RestoreOutcome::default();
    let audit = audit_reason(audit_tag, "disable", actor, reason);

    for (channel_id, snapshot) in &state.channels {
        let channel = parse_channel_id(channel_id)
            .and_then(|id| platform.channel(id))
            .filter(|c| c.is_lockable());

        let Some(channel) = channel else {
            warn!(
                "Cannot restore '{}' ({}): channel missing or not lockable",
                snapshot.channel_name, channel_id
            );
            outcome.skipped.push(SkippedChannel::new(
                channel_id,
                &snapshot.channel_name,
                ChannelError::Unavailable,
            ));
            continue;
        };

        if !platform.can_manage(channel.id) {
            warn!("Cannot restore '{}' ({}): missing capability", channel.name, channel.id);
            outcome.skipped.push(SkippedChannel::new(
                channel_id,
                &channel.name,
                ChannelError::MissingCapability,
            ));
            continue;
        }

        if !TriStateMap::is_locked(channel.everyone.as_ref()) {
            warn!(
                "@everyone overwrite on '{}' ({}) was edited during the lockdown; restoring the recorded values anyway",
                channel.name, channel.id
            );
        }

        match platform
            .write_everyone(channel.id, &snapshot.before, &audit)
            .await
        {
            Ok(()) => {
                debug!("Restored '{}' ({})", channel.name, channel.id);
                outcome.restored.push(channel_id.clone());
            }
            Err(e) => {
                warn!("Failed to restore '{}' ({}): {}", channel.name, channel.id, e);
                outcome
                    .skipped
                    .push(SkippedChannel::new(channel_id, &channel.name, e));
            }
        }
    }

    info!(
        "Lockdown restore finished for guild {}: {} restored, {} skipped",
        state.guild_id,
        outcome.restored.len(),
        outcome.skipped.len()
    );
    outcome
}

fn parse_channel_id(raw: &str) -> Option<ChannelId> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockdown::apply::apply_lockdown;
    use crate::lockdown::channels::ChannelKind;
    use crate::lockdown::permissions::EveryoneOverwrite;
    use crate::lockdown::testing::{channel, FakeGuild};
    use crate::lockdown::channels::ChannelTree;
    use crate::state::LockdownScope;
    use poise::serenity_prelude::Permissions;

    /// Lock three channels; also returns their overwrites from before the lockdown
    async fn locked_guild() -> (FakeGuild, GuildLockdownState, Vec<Option<EveryoneOverwrite>>) {
        let guild = FakeGuild::new(vec![
            channel(1, "a", ChannelKind::Text, None),
            channel(2, "b", ChannelKind::Text, None),
            channel(3, "c", ChannelKind::Announcement, None),
        ]);
        guild.set_everyone(
            1,
            Some(EveryoneOverwrite {
                allow: Permissions::SEND_MESSAGES,
                deny: Permissions::empty(),
            }),
        );
        guild.set_everyone(
            2,
            Some(EveryoneOverwrite {
                allow: Permissions::ATTACH_FILES,
                deny: Permissions::ADD_REACTIONS,
            }),
        );

        let originals = (1..=3).map(|id| guild.everyone(id)).collect();
        let targets = guild.all_channels();
        let outcome = apply_lockdown(&guild, &targets, "LOCKDOWN", "mod", None).await;
        let state = GuildLockdownState::new("9", LockdownScope::All, "42", None, outcome.changed);
        (guild, state, originals)
    }

    #[tokio::test]
    async fn test_round_trip_restores_original_overwrites() {
        let (guild, state, originals) = locked_guild().await;
        assert!(originals[2].is_none());
        assert!((1..=3).all(|id| guild.is_locked(id)));

        let outcome = restore_lockdown(&guild, &state, "LOCKDOWN", "mod", Some("calm")).await;
        assert_eq!(outcome.restored, vec!["1", "2", "3"]);
        assert!(outcome.skipped.is_empty());

        assert_eq!(
            guild.everyone(1),
            Some(EveryoneOverwrite {
                allow: Permissions::SEND_MESSAGES,
                deny: Permissions::empty(),
            })
        );
        assert_eq!(
            guild.everyone(2),
            Some(EveryoneOverwrite {
                allow: Permissions::ATTACH_FILES,
                deny: Permissions::ADD_REACTIONS,
            })
        );
        // Unset before the lockdown: the overwrite is removed, not allowed
        assert_eq!(guild.everyone(3), None);
        let restored: Vec<_> = (1..=3).map(|id| guild.everyone(id)).collect();
        assert_eq!(restored, originals);
        assert_eq!(
            guild.last_audit_reason(3).as_deref(),
            Some("LOCKDOWN disable by mod | calm")
        );
    }

    #[tokio::test]
    async fn test_missing_channel_and_capability_are_skipped() {
        let (guild, state, _) = locked_guild().await;
        guild.delete_channel(1);
        guild.revoke_capability(2);

        let outcome = restore_lockdown(&guild, &state, "LOCKDOWN", "mod", None).await;

        assert_eq!(outcome.restored, vec!["3"]);
        assert_eq!(
            outcome.skipped,
            vec![
                SkippedChannel::new(1u64, "a", ChannelError::Unavailable),
                SkippedChannel::new(2u64, "b", ChannelError::MissingCapability),
            ]
        );
    }

    #[tokio::test]
    async fn test_channel_no_longer_lockable_is_skipped() {
        let (guild, state, _) = locked_guild().await;
        guild.set_kind(1, ChannelKind::Voice);
        guild.set_kind(2, ChannelKind::Category);

        let outcome = restore_lockdown(&guild, &state, "LOCKDOWN", "mod", None).await;

        assert_eq!(outcome.restored, vec!["3"]);
        assert_eq!(
            outcome.skipped,
            vec![
                SkippedChannel::new(1u64, "a", ChannelError::Unavailable),
                SkippedChannel::new(2u64, "b", ChannelError::Unavailable),
            ]
        );
        assert_eq!(outcome.skipped[0].reason.to_string(), "channel missing or not lockable");
        assert_eq!(guild.write_count(1), 1);
        assert_eq!(guild.write_count(2), 1);
    }

    #[tokio::test]
    async fn test_resumed_restore_matches_single_restore() {
        let (guild, state, _) = locked_guild().await;
        let (reference, reference_state, _) = locked_guild().await;

        restore_lockdown(&reference, &reference_state, "LOCKDOWN", "mod", None).await;

        guild.fail_writes(2, "rate limited");
        let first = restore_lockdown(&guild, &state, "LOCKDOWN", "mod", None).await;
        assert_eq!(first.restored, vec!["1", "3"]);
        assert_eq!(first.skipped[0].reason.to_string(), "rate limited");

        let remaining = state.without_restored(&first.restored).unwrap();
        assert_eq!(remaining.channel_count(), 1);

        guild.clear_failures(2);
        let second = restore_lockdown(&guild, &remaining, "LOCKDOWN", "mod", None).await;
        assert_eq!(second.restored, vec!["2"]);
        assert!(state.without_restored(&[first.restored, second.restored].concat()).is_none());

        for id in 1..=3 {
            assert_eq!(guild.everyone(id), reference.everyone(id));
        }
    }

    #[tokio::test]
    async fn test_restoring_stale_state_twice_is_a_no_op() {
        let (guild, state, _) = locked_guild().await;

        restore_lockdown(&guild, &state, "LOCKDOWN", "mod", None).await;
        let after_first: Vec<_> = (1..=3).map(|id| guild.everyone(id)).collect();

        let again = restore_lockdown(&guild, &state, "LOCKDOWN", "mod", None).await;
        assert_eq!(again.restored.len(), 3);
        let after_second: Vec<_> = (1..=3).map(|id| guild.everyone(id)).collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn test_parse_channel_id() {
        assert_eq!(parse_channel_id("12"), Some(ChannelId::new(12)));
        assert_eq!(parse_channel_id("0"), None);
        assert_eq!(parse_channel_id("general"), None);
    }
}
