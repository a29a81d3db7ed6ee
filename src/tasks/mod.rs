//! Background Tasks Module
//!
//! # Tasks
//! - Expiry reaper: drops expired entries at the configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
