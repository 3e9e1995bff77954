use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::channels::GuildChannelInfo;
use super::permissions::TriStateMap;
use super::platform::{audit_reason, ChannelError, LockdownPlatform, SkippedChannel};
use crate::state::ChannelSnapshot;

/// Result of locking a batch of channels
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// Channel ID -> pre-lockdown snapshot, for every channel now locked
    pub changed: BTreeMap<String, ChannelSnapshot>,
    pub skipped: Vec<SkippedChannel>,
}

/// Snapshot and lock each channel in order.
///
/// Channels are handled one at a time and independently: a failure is
/// recorded in `skipped` and never undoes another channel. Non-lockable
/// channels are ignored.
pub async fn apply_lockdown<P: LockdownPlatform + ?Sized>(
    platform: &P,
    channels: &[GuildChannelInfo],
    audit_tag: &str,
    actor: &str,
    reason: Option<&str>,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();
    let patch = TriStateMap::lockdown();
    let audit = audit_reason(audit_tag, "enable", actor, reason);

    for channel in channels.iter().filter(|c| c.is_lockable()) {
        let channel_id = channel.id.to_string();

        if !platform.can_manage(channel.id) {
            warn!("Lockdown skipped '{}' ({}): missing capability", channel.name, channel.id);
            outcome.skipped.push(SkippedChannel::new(
                &channel_id,
                &channel.name,
                ChannelError::MissingCapability,
            ));
            continue;
        }

        // Recorded before the write so the pre-state is known even if it fails
        outcome.changed.insert(
            channel_id.clone(),
            ChannelSnapshot {
                channel_id: channel_id.clone(),
                channel_name: channel.name.clone(),
                before: TriStateMap::capture(channel.everyone.as_ref()),
            },
        );

        match platform.write_everyone(channel.id, &patch, &audit).await {
            Ok(()) => debug!("Locked '{}' ({})", channel.name, channel.id),
            Err(e) => {
                warn!("Failed to lock '{}' ({}): {}", channel.name, channel.id, e);
                outcome.changed.remove(&channel_id);
                outcome
                    .skipped
                    .push(SkippedChannel::new(&channel_id, &channel.name, e));
            }
        }
    }

    info!(
        "Lockdown apply finished: {} locked, {} skipped",
        outcome.changed.len(),
        outcome.skipped.len()
    );
    outcome
}
