//! Centralized error handling for topicbus.
//!
//! The engine itself never fails in normal operation; the errors here cover
//! the edges around it: reading from a delivery queue, validating and loading
//! configuration, and installing the logging subscriber.

pub mod ext;
pub mod status_code;
pub mod types;

// Publicly re-export all error types so that callers only need the crate
// root.
pub use ext::*;
pub use status_code::*;
pub use types::*;
