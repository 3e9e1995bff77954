use async_trait::async_trait;
use poise::serenity_prelude::ChannelId;
use serde::Serialize;
use thiserror::Error;

use super::channels::ChannelTree;
use super::permissions::TriStateMap;

/// Why a single channel was left out of a batch.
///
/// None of these abort the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("missing capability")]
    MissingCapability,

    #[error("channel missing or not lockable")]
    Unavailable,

    #[error("{message}")]
    RemoteWrite { message: String },
}

/// A channel the engine could not change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedChannel {
    pub channel_id: String,
    pub channel_name: String,
    #[serde(serialize_with = "serialize_display")]
    pub reason: ChannelError,
}

impl SkippedChannel {
    pub fn new(channel_id: impl ToString, channel_name: &str, reason: ChannelError) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_name: channel_name.to_string(),
            reason,
        }
    }
}

fn serialize_display<S: serde::Serializer>(
    value: &ChannelError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Host capabilities the lockdown engine runs against
#[async_trait]
pub trait LockdownPlatform: ChannelTree + Send + Sync {
    /// Whether the bot may manage permission overwrites on `channel`
    fn can_manage(&self, channel: ChannelId) -> bool;

    /// Merge `patch` into the channel's `@everyone` overwrite.
    ///
    /// `audit_reason` ends up in the guild's audit log.
    async fn write_everyone(
        &self,
        channel: ChannelId,
        patch: &TriStateMap,
        audit_reason: &str,
    ) -> std::result::Result<(), ChannelError>;
}

/// Audit log line for a lockdown action, e.g.
/// `LOCKDOWN enable by mod#0001 | raid`
pub fn audit_reason(tag: &str, action: &str, actor: &str, reason: Option<&str>) -> String {
    match reason.filter(|r| !r.trim().is_empty()) {
        Some(reason) => format!("{} {} by {} | {}", tag, action, actor, reason),
        None => format!("{} {} by {}", tag, action, actor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_messages() {
        assert_eq!(ChannelError::MissingCapability.to_string(), "missing capability");
        assert_eq!(
            ChannelError::Unavailable.to_string(),
            "channel missing or not lockable"
        );
        assert_eq!(
            ChannelError::RemoteWrite {
                message: "You are being rate limited.".to_string()
            }
            .to_string(),
            "You are being rate limited."
        );
    }

    #[test]
    fn test_skipped_channel_serializes_reason_text() {
        let skipped = SkippedChannel::new(7u64, "general", ChannelError::MissingCapability);
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["channelId"], serde_json::json!("7"));
        assert_eq!(json["reason"], serde_json::json!("missing capability"));
    }

    #[test]
    fn test_audit_reason() {
        assert_eq!(
            audit_reason("LOCKDOWN", "enable", "mod", Some("raid")),
            "LOCKDOWN enable by mod | raid"
        );
        assert_eq!(
            audit_reason("LOCKDOWN", "disable", "mod", Some("  ")),
            "LOCKDOWN disable by mod"
        );
        assert_eq!(audit_reason("LOCKDOWN", "disable", "mod", None), "LOCKDOWN disable by mod");
    }
}
