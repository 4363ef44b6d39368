// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "sheet/mod.rs"]
pub mod sheet;

#[path = "fitbit/mod.rs"]
pub mod fitbit;

#[path = "config/json_store.rs"]
pub mod config;
