pub mod lockdown_manager;

pub use lockdown_manager::{
    create_shared_lockdown_manager, DisableOutcome, DisableRequest, EnableOutcome, EnableRequest,
    LockdownManager, SharedLockdownManager,
};
