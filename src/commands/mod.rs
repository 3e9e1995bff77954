pub mod general;
pub mod lockdown;

pub use general::{help, ping};
pub use lockdown::lockdown;
