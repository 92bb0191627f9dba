//! WaTTS plugin tester
//!
//! Builds plugin requests, runs WaTTS plugins and checks their responses
//! against the versioned plugin contract.

pub mod cli;
pub mod commands;
pub mod common;
pub mod input;
pub mod plugin;
pub mod schema;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, ExitStatus, Result};
pub use input::{Action, PluginInput};
