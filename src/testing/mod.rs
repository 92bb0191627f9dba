//! Plugin test runner
//!
//! Runs a plugin once (`check`, `test`) or once per case of a suite
//! (`tests`), validates every output against the contract of its action
//! and collects the results into report documents.

mod config;
mod report;
mod runner;

pub use config::*;
pub use report::*;
pub use runner::{compare_expected, TestRunner};
