//! Common utilities shared across the tester

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, ExitStatus, Result};
