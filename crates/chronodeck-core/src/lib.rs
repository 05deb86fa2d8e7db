//! `chronodeck-core` — configuration and shared error type.

pub mod config;
pub mod error;

pub use config::ChronodeckConfig;
pub use error::{CoreError, Result};
