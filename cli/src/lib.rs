//! The songbox client: an http client for the daemon and a terminal music player.

pub mod api;
pub mod notification;
pub mod player;
