//! Test suite configuration types
//!
//! A suite names the plugin to run and a list of cases. Suites are JSON
//! documents; files ending in `.yaml` or `.yml` are read as YAML.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::input::read_text;

/// A complete test suite loaded from a file
#[derive(Deserialize, Debug)]
pub struct TestSuite {
    /// Plugin executable; relative paths resolve against the suite file
    pub exec_file: Option<PathBuf>,
    /// Cases, run in order
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// One plugin invocation and its expected output
#[derive(Deserialize, Debug, Clone)]
pub struct TestCase {
    /// Optional label shown in the report
    pub name: Option<String>,
    /// Input overrides merged over the default document
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Keys the plugin output must contain with exactly these values
    #[serde(default)]
    pub expected_output: Map<String, Value>,
}

impl TestSuite {
    /// Load a suite, resolving `exec_file` relative to the suite's directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_text(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );

        let mut suite = if is_yaml {
            Self::from_yaml(&text)?
        } else {
            Self::from_json(&text)?
        };

        if let Some(exec) = &suite.exec_file {
            if exec.is_relative() {
                let suite_dir = path.parent().unwrap_or(Path::new("."));
                suite.exec_file = Some(suite_dir.join(exec));
            }
        }
        Ok(suite)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidSuite(e.to_string()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::InvalidSuite(e.to_string()))
    }
}
