//! `cronbind-core`: configuration, shared error type and key types used by
//! every other cronbind crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::CronbindConfig;
pub use error::{CoreError, Result};
pub use types::{JobKey, TriggerKey, DEFAULT_GROUP};
