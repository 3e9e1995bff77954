pub mod channel;

pub use channel::handle_channel_delete;
