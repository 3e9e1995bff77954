//! Guild lockdown engine.
//!
//! Denies a fixed set of messaging permissions for `@everyone` on a set of
//! channels, records what each channel had before, and restores it later.
//! Every channel is handled independently; failures are collected instead
//! of aborting the batch.

pub mod apply;
pub mod channels;
pub mod discord;
pub mod permissions;
pub mod platform;
pub mod restore;

#[cfg(test)]
pub mod testing;

pub use apply::apply_lockdown;
pub use channels::resolve_targets;
pub use discord::SerenityGuild;
pub use permissions::TriStateMap;
pub use platform::{LockdownPlatform, SkippedChannel};
pub use restore::restore_lockdown;
