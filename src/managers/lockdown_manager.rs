use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::LockdownSettings;
use crate::error::{BotError, Result};
use crate::lockdown::{
    apply_lockdown, resolve_targets, restore_lockdown, LockdownPlatform, SkippedChannel,
};
use crate::state::{GuildLockdownState, LockdownScope, SharedLockdownStore};

/// Input of `/lockdown enable`
#[derive(Debug, Clone)]
pub struct EnableRequest {
    pub guild_id: GuildId,
    pub scope: LockdownScope,
    /// Channel the command was run in
    pub current_channel: ChannelId,
    pub actor_id: UserId,
    /// Human readable actor name for the audit log
    pub actor_tag: String,
    pub reason: Option<String>,
}

/// Input of `/lockdown disable`
#[derive(Debug, Clone)]
pub struct DisableRequest {
    pub guild_id: GuildId,
    pub actor_tag: String,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub enum EnableOutcome {
    /// A lockdown is already active; nothing was touched
    AlreadyActive(GuildLockdownState),
    /// The scope resolved to no lockable channel
    NoTargets { scope: LockdownScope },
    /// Every target was skipped; nothing was persisted
    NothingLocked { skipped: Vec<SkippedChannel> },
    Enabled {
        state: GuildLockdownState,
        skipped: Vec<SkippedChannel>,
    },
}

#[derive(Debug)]
pub enum DisableOutcome {
    NotActive,
    /// Some channels could not be restored and are still recorded
    Partial {
        restored: Vec<String>,
        skipped: Vec<SkippedChannel>,
        remaining: GuildLockdownState,
    },
    /// Every recorded channel was restored and the record cleared
    Completed {
        restored: Vec<String>,
        skipped: Vec<SkippedChannel>,
    },
}

/// Runs lockdown commands against the store and the engine.
///
/// Only one enable/disable may be in flight per guild at a time.
pub struct LockdownManager {
    store: SharedLockdownStore,
    settings: LockdownSettings,
    in_flight: DashMap<GuildId, ()>,
}

/// Releases the per-guild slot when dropped
struct GuildGuard<'a> {
    in_flight: &'a DashMap<GuildId, ()>,
    guild_id: GuildId,
}

impl Drop for GuildGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.guild_id);
    }
}

impl LockdownManager {
    pub fn new(store: SharedLockdownStore, settings: LockdownSettings) -> Self {
        Self {
            store,
            settings,
            in_flight: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &LockdownSettings {
        &self.settings
    }

    fn acquire(&self, guild_id: GuildId) -> Result<GuildGuard<'_>> {
        match self.in_flight.entry(guild_id) {
            Entry::Occupied(_) => Err(BotError::LockdownBusy {
                guild_id: guild_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(GuildGuard {
                    in_flight: &self.in_flight,
                    guild_id,
                })
            }
        }
    }

    /// Lock the channels covered by the requested scope
    pub async fn enable<P: LockdownPlatform + ?Sized>(
        &self,
        platform: &P,
        request: EnableRequest,
    ) -> Result<EnableOutcome> {
        let _guard = self.acquire(request.guild_id)?;
        let guild_key = request.guild_id.to_string();

        if let Some(existing) = self.store.get(&guild_key).await? {
            if existing.active {
                info!(
                    "Lockdown enable in guild {} rejected: already active since {}",
                    guild_key, existing.enabled_at
                );
                return Ok(EnableOutcome::AlreadyActive(existing));
            }
        }

        let targets = match platform.channel(request.current_channel) {
            Some(current) => resolve_targets(request.scope, &current, platform),
            None => Vec::new(),
        };
        if targets.is_empty() {
            info!(
                "Lockdown enable in guild {}: no lockable channels for scope {}",
                guild_key, request.scope
            );
            return Ok(EnableOutcome::NoTargets {
                scope: request.scope,
            });
        }

        info!(
            "Enabling lockdown in guild {} (scope {}, {} target channel(s)) by {}",
            guild_key,
            request.scope,
            targets.len(),
            request.actor_tag
        );
        let outcome = apply_lockdown(
            platform,
            &targets,
            &self.settings.audit_tag,
            &request.actor_tag,
            request.reason.as_deref(),
        )
        .await;

        if outcome.changed.is_empty() {
            warn!(
                "Lockdown enable in guild {} locked nothing ({} skipped)",
                guild_key,
                outcome.skipped.len()
            );
            return Ok(EnableOutcome::NothingLocked {
                skipped: outcome.skipped,
            });
        }

        let state = GuildLockdownState::new(
            &guild_key,
            request.scope,
            &request.actor_id.to_string(),
            request.reason,
            outcome.changed,
        );

        if let Err(e) = self.store.set(&guild_key, state.clone()).await {
            error!(
                "Locked {} channel(s) in guild {} but could not persist the lockdown: {}",
                state.channel_count(),
                guild_key,
                e
            );
            return Err(e);
        }

        Ok(EnableOutcome::Enabled {
            state,
            skipped: outcome.skipped,
        })
    }

    /// Restore every recorded channel, keeping the ones that fail
    pub async fn disable<P: LockdownPlatform + ?Sized>(
        &self,
        platform: &P,
        request: DisableRequest,
    ) -> Result<DisableOutcome> {
        let _guard = self.acquire(request.guild_id)?;
        let guild_key = request.guild_id.to_string();

        let state = match self.store.get(&guild_key).await? {
            Some(state) if state.active => state,
            _ => return Ok(DisableOutcome::NotActive),
        };

        info!(
            "Disabling lockdown in guild {} ({} recorded channel(s)) by {}",
            guild_key,
            state.channel_count(),
            request.actor_tag
        );
        let outcome = restore_lockdown(
            platform,
            &state,
            &self.settings.audit_tag,
            &request.actor_tag,
            request.reason.as_deref(),
        )
        .await;

        match state.without_restored(&outcome.restored) {
            Some(remaining) => {
                self.store.set(&guild_key, remaining.clone()).await?;
                warn!(
                    "Lockdown disable in guild {} was partial: {} channel(s) still locked",
                    guild_key,
                    remaining.channel_count()
                );
                Ok(DisableOutcome::Partial {
                    restored: outcome.restored,
                    skipped: outcome.skipped,
                    remaining,
                })
            }
            None => {
                self.store.clear(&guild_key).await?;
                info!("Lockdown in guild {} fully lifted", guild_key);
                Ok(DisableOutcome::Completed {
                    restored: outcome.restored,
                    skipped: outcome.skipped,
                })
            }
        }
    }

    /// The active lockdown of a guild, if any
    pub async fn status(&self, guild_id: GuildId) -> Result<Option<GuildLockdownState>> {
        Ok(self
            .store
            .get(&guild_id.to_string())
            .await?
            .filter(|state| state.active))
    }
}

/// Shared lockdown manager type
pub type SharedLockdownManager = Arc<LockdownManager>;

pub fn create_shared_lockdown_manager(
    store: SharedLockdownStore,
    settings: LockdownSettings,
) -> SharedLockdownManager {
    Arc::new(LockdownManager::new(store, settings))
}
