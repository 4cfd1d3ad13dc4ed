//! Shared foundation for the lavado batch-analysis portal client
//!
//! Holds the pieces both current and future workspace members need:
//! the common error type, configuration loading, and exact money
//! arithmetic for the regulator-facing pricing contract.

pub mod config;
pub mod error;
pub mod money;

pub use error::{Error, Result};
pub use money::Cents;
