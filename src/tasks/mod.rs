//! Background Tasks Module
//!
//! Optional background maintenance for a shared cache. Nothing here runs
//! unless the caller spawns it.
//!
//! # Tasks
//! - Expiry Cleanup: Removes expired cache entries at a configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
