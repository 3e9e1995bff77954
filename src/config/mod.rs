pub mod bot;
pub mod lockdown;

pub use bot::BotConfig;
pub use lockdown::LockdownSettings;
