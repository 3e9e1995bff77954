pub mod lockdown_state;
pub mod lockdown_store;

pub use lockdown_state::{ChannelSnapshot, GuildLockdownState, LockdownScope};
pub use lockdown_store::{create_shared_lockdown_store, SharedLockdownStore};
