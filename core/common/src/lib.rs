//! Common utilities and types shared across drivekit crates.
//!
//! Holds the single error type every crate returns and the small validated
//! value types used at API boundaries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{require_name, ResourceId};
