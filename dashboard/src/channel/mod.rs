//! Build-log channel: one live stream connection and its line buffer

pub mod event;
pub mod log_channel;
pub mod stream;

pub use log_channel::{ChannelState, ChannelStats, LogChannel, SubscriptionId};
