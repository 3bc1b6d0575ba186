//! Watch layer: long-lived streams that keep an open conversation screen
//! current. Each stream owns a pipeline task and tears it down on drop.

pub mod security;
pub mod unread;
