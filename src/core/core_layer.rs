// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "sheet/mod.rs"]
pub mod sheet;

#[path = "fitbit/mod.rs"]
pub mod fitbit;

#[path = "config/mod.rs"]
pub mod config;

#[path = "sync/sync_service.rs"]
pub mod sync;
