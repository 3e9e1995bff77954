use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::lockdown::TriStateMap;

/// Breadth of a lockdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockdownScope {
    Channel,
    Category,
    All,
}

impl fmt::Display for LockdownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockdownScope::Channel => "channel",
            LockdownScope::Category => "category",
            LockdownScope::All => "all",
        };
        f.write_str(name)
    }
}

/// Pre-lockdown `@everyone` values of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnapshot {
    pub channel_id: String,
    pub channel_name: String,
    pub before: TriStateMap,
}

/// The active lockdown of one guild
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildLockdownState {
    pub active: bool,
    pub guild_id: String,
    pub scope: LockdownScope,

    /// User ID of the moderator who enabled it
    pub enabled_by: String,

    /// Unix timestamp in milliseconds
    pub enabled_at: i64,

    pub reason: Option<String>,

    /// Channel ID -> snapshot, for every channel still locked by this state
    pub channels: BTreeMap<String, ChannelSnapshot>,
}

impl GuildLockdownState {
    pub fn new(
        guild_id: &str,
        scope: LockdownScope,
        enabled_by: &str,
        reason: Option<String>,
        channels: BTreeMap<String, ChannelSnapshot>,
    ) -> Self {
        Self {
            active: true,
            guild_id: guild_id.to_string(),
            scope,
            enabled_by: enabled_by.to_string(),
            enabled_at: Utc::now().timestamp_millis(),
            reason,
            channels,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn enabled_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.enabled_at).single()
    }

    /// The state left after `restored` channels were confirmed restored.
    ///
    /// Returns `None` once nothing remains, meaning the record should be
    /// cleared rather than persisted.
    pub fn without_restored(&self, restored: &[String]) -> Option<Self> {
        let channels: BTreeMap<String, ChannelSnapshot> = self
            .channels
            .iter()
            .filter(|(id, _)| !restored.contains(id))
            .map(|(id, snapshot)| (id.clone(), snapshot.clone()))
            .collect();

        if channels.is_empty() {
            return None;
        }

        Some(Self {
            active: true,
            channels,
            ..self.clone()
        })
    }
}

/// Everything persisted in the lockdown state file (guild ID -> state)
pub type LockdownCollection = BTreeMap<String, GuildLockdownState>;
