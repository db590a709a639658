//! Logging utilities.
//!
//! This module centralizes logger initialization. Library code only uses the
//! `log` facade; the binary decides whether `env_logger` is installed.

mod init;

pub use init::{LoggingConfig, init_logging};
