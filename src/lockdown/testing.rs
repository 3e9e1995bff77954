//! In-memory guild used by the engine and orchestrator tests.

use async_trait::async_trait;
use poise::serenity_prelude::ChannelId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::channels::{ChannelKind, ChannelTree, GuildChannelInfo};
use super::permissions::{EveryoneOverwrite, TriStateMap};
use super::platform::{ChannelError, LockdownPlatform};

pub fn channel(id: u64, name: &str, kind: ChannelKind, parent: Option<u64>) -> GuildChannelInfo {
    GuildChannelInfo {
        id: ChannelId::new(id),
        name: name.to_string(),
        kind,
        parent_id: parent.map(ChannelId::new),
        position: 0,
        everyone: None,
    }
}

#[derive(Default)]
struct Inner {
    channels: BTreeMap<u64, GuildChannelInfo>,
    revoked: HashSet<u64>,
    failures: HashMap<u64, String>,
    writes: HashMap<u64, usize>,
    audit: HashMap<u64, String>,
}

#[derive(Default)]
pub struct FakeGuild {
    inner: Mutex<Inner>,
}

impl FakeGuild {
    pub fn new(channels: Vec<GuildChannelInfo>) -> Self {
        let guild = Self::default();
        {
            let mut inner = guild.inner.lock().unwrap();
            for channel in channels {
                inner.channels.insert(channel.id.get(), channel);
            }
        }
        guild
    }

    pub fn revoke_capability(&self, id: u64) {
        self.inner.lock().unwrap().revoked.insert(id);
    }

    pub fn grant_capability(&self, id: u64) {
        self.inner.lock().unwrap().revoked.remove(&id);
    }

    pub fn fail_writes(&self, id: u64, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(id, message.to_string());
    }

    pub fn clear_failures(&self, id: u64) {
        self.inner.lock().unwrap().failures.remove(&id);
    }

    pub fn delete_channel(&self, id: u64) {
        self.inner.lock().unwrap().channels.remove(&id);
    }

    pub fn set_kind(&self, id: u64, kind: ChannelKind) {
        if let Some(channel) = self.inner.lock().unwrap().channels.get_mut(&id) {
            channel.kind = kind;
        }
    }

    pub fn set_everyone(&self, id: u64, overwrite: Option<EveryoneOverwrite>) {
        if let Some(channel) = self.inner.lock().unwrap().channels.get_mut(&id) {
            channel.everyone = overwrite;
        }
    }

    pub fn everyone(&self, id: u64) -> Option<EveryoneOverwrite> {
        self.inner
            .lock()
            .unwrap()
            .channels
            .get(&id)
            .and_then(|c| c.everyone)
    }

    pub fn is_locked(&self, id: u64) -> bool {
        TriStateMap::is_locked(self.everyone(id).as_ref())
    }

    pub fn write_count(&self, id: u64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .writes
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_audit_reason(&self, id: u64) -> Option<String> {
        self.inner.lock().unwrap().audit.get(&id).cloned()
    }

    fn sorted(&self, filter: impl Fn(&GuildChannelInfo) -> bool) -> Vec<GuildChannelInfo> {
        let inner = self.inner.lock().unwrap();
        let mut channels: Vec<GuildChannelInfo> = inner
            .channels
            .values()
            .filter(|c| filter(c))
            .cloned()
            .collect();
        channels.sort_by_key(|c| (c.position, c.id));
        channels
    }
}

impl ChannelTree for FakeGuild {
    fn channel(&self, id: ChannelId) -> Option<GuildChannelInfo> {
        self.inner.lock().unwrap().channels.get(&id.get()).cloned()
    }

    fn children_of(&self, category: ChannelId) -> Vec<GuildChannelInfo> {
        self.sorted(|c| c.parent_id == Some(category))
    }

    fn all_channels(&self) -> Vec<GuildChannelInfo> {
        self.sorted(|_| true)
    }
}

#[async_trait]
impl LockdownPlatform for FakeGuild {
    fn can_manage(&self, channel: ChannelId) -> bool {
        !self.inner.lock().unwrap().revoked.contains(&channel.get())
    }

    async fn write_everyone(
        &self,
        channel: ChannelId,
        patch: &TriStateMap,
        audit_reason: &str,
    ) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().unwrap();
        let id = channel.get();

        if let Some(message) = inner.failures.get(&id) {
            return Err(ChannelError::RemoteWrite {
                message: message.clone(),
            });
        }

        let Some(info) = inner.channels.get_mut(&id) else {
            return Err(ChannelError::RemoteWrite {
                message: "Unknown Channel".to_string(),
            });
        };
        info.everyone = patch.merge_into(info.everyone);

        *inner.writes.entry(id).or_insert(0) += 1;
        inner.audit.insert(id, audit_reason.to_string());
        Ok(())
    }
}
