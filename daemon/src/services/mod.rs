//! The http handlers of the daemon.

pub mod health;
pub mod songs;
