//! HTTP route handlers. Thin transport glue over the gateway core.

mod gateway;
mod health;

pub use gateway::{pattern_history, process, system_metrics, update_settings, usage};
pub use health::{health, live, metrics, ready};
