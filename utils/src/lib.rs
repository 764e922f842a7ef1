//! Shared utilities for the bounty workspace.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingError};
