//! Logging setup.
//!
//! Everything in the crate logs through the `log` facade; binaries install
//! `env_logger` once via [`init_logging`].

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
