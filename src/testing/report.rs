//! Report documents
//!
//! Every command ends by printing one report. In machine mode the report is
//! a pretty-printed JSON document; in human mode each top-level key is
//! printed on its own, right-aligned, followed by its JSON value.

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::common::{ExitStatus, Result};

/// Width of the key column in human mode
const KEY_WIDTH: usize = 15;

/// Overall verdict as it appears in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Ok,
    Error,
}

/// How a single case ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    /// Output failed the schema, could not be decoded, or was unexpected
    ContractViolation,
    /// The plugin could not be run to a successful exit
    ExecutionFailure,
    /// The case's input could not be built
    InputError,
}

impl CaseStatus {
    pub fn exit_status(self) -> ExitStatus {
        match self {
            CaseStatus::Passed => ExitStatus::Success,
            CaseStatus::ContractViolation => ExitStatus::PluginError,
            CaseStatus::ExecutionFailure => ExitStatus::PluginExecutionError,
            CaseStatus::InputError => ExitStatus::UserError,
        }
    }
}

/// What was sent to and received from the plugin
#[derive(Debug, Clone, Serialize)]
pub struct PluginRun {
    pub name: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginRun {
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
            duration: None,
            output: None,
            output_expected: None,
            plugin_output: None,
            error: None,
        }
    }
}

/// Result of one check or test
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginRun>,
    pub result: Verdict,
    pub description: String,
    #[serde(skip)]
    pub status: CaseStatus,
}

impl CaseReport {
    pub fn passed(plugin: PluginRun, description: impl Into<String>) -> Self {
        Self {
            name: None,
            plugin: Some(plugin),
            result: Verdict::Ok,
            description: description.into(),
            status: CaseStatus::Passed,
        }
    }

    pub fn failed(
        plugin: Option<PluginRun>,
        status: CaseStatus,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            plugin,
            result: Verdict::Error,
            description: description.into(),
            status,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == CaseStatus::Passed
    }
}

/// Suite counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SuiteStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl SuiteStats {
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Result of a whole suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub tests: Vec<CaseReport>,
    pub result: Verdict,
    pub stats: SuiteStats,
}

impl Default for SuiteReport {
    fn default() -> Self {
        Self {
            tests: Vec::new(),
            result: Verdict::Ok,
            stats: SuiteStats::default(),
        }
    }
}

impl SuiteReport {
    pub fn push(&mut self, case: CaseReport) {
        self.stats.record(case.is_pass());
        if !case.is_pass() {
            self.result = Verdict::Error;
        }
        self.tests.push(case);
    }

    /// Any failed case makes the whole suite a contract violation
    pub fn exit_status(&self) -> ExitStatus {
        if self.stats.failed == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::PluginError
        }
    }
}

/// The document a command prints
#[derive(Debug, Clone)]
pub enum Report {
    Case(CaseReport),
    Suite(SuiteReport),
    /// A plugin input; always printed machine-readable
    Input(Value),
}

impl Report {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Report::Case(case) => case.status.exit_status(),
            Report::Suite(suite) => suite.exit_status(),
            Report::Input(_) => ExitStatus::Success,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Report::Case(case) => serde_json::to_value(case)?,
            Report::Suite(suite) => serde_json::to_value(suite)?,
            Report::Input(input) => input.clone(),
        })
    }

    /// Render for stdout
    pub fn render(&self, machine: bool) -> Result<String> {
        let value = self.to_value()?;
        if machine || matches!(self, Report::Input(_)) {
            return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
        }

        let Value::Object(map) = value else {
            return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
        };

        let continuation = format!("\n{}", " ".repeat(KEY_WIDTH + 2));
        let mut out = String::new();
        for (key, value) in &map {
            let rendered = match (key.as_str(), value) {
                ("result", Value::String(s)) if s == "ok" => s.as_str().green().bold().to_string(),
                ("result", Value::String(s)) => s.as_str().red().bold().to_string(),
                _ => serde_json::to_string_pretty(value)?.replace('\n', &continuation),
            };
            out.push_str(&format!("{key:>width$}: {rendered}\n", width = KEY_WIDTH));
        }
        Ok(out)
    }
}
