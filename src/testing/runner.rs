//! Test runner implementation
//!
//! Drives plugin runs through build, invoke and validate, and turns every
//! run into a [`CaseReport`]. Suites never stop at a failing case.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::common::{Error, ExitStatus, Result};
use crate::input::{merge, Action, CanonicalInput, PluginInput};
use crate::plugin::{resolve_plugin, ExecutionOutcome, PassMode, PluginInvoker};
use crate::schema::{SchemaRegistry, ValidationOutcome};

use super::config::{TestCase, TestSuite};
use super::report::{CaseReport, CaseStatus, PluginRun, SuiteReport};

/// What came back from invoking a plugin
enum Invoked {
    Output(Value),
    Failed(CaseStatus, String),
}

/// Runs plugins and judges their output
pub struct TestRunner<I> {
    invoker: I,
    schemas: SchemaRegistry,
    mode: PassMode,
}

impl<I: PluginInvoker> TestRunner<I> {
    pub fn new(invoker: I, schemas: SchemaRegistry, mode: PassMode) -> Self {
        Self {
            invoker,
            schemas,
            mode,
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Run the plugin once and record what happened in `run`
    async fn invoke(
        &self,
        plugin: &Path,
        input: &CanonicalInput,
        run: &mut PluginRun,
    ) -> Result<Invoked> {
        let payload = input.payload()?;
        let outcome = self.invoker.invoke(plugin, &payload, &self.mode).await;
        run.duration = Some(format!("{:?}", outcome.duration()));

        Ok(match outcome {
            ExecutionOutcome::Success { output, .. } => {
                run.output = Some(output.clone());
                Invoked::Output(output)
            }
            ExecutionOutcome::ProcessFailure {
                exit, raw_output, ..
            } => {
                tracing::warn!(plugin = %plugin.display(), %exit, "Plugin execution failed");
                run.error = Some(exit.to_string());
                run.plugin_output = Some(raw_output);
                Invoked::Failed(
                    CaseStatus::ExecutionFailure,
                    "Error executing the plugin".to_string(),
                )
            }
            ExecutionOutcome::DecodeFailure {
                raw_output, cause, ..
            } => {
                tracing::warn!(plugin = %plugin.display(), %cause, "Plugin output is not JSON");
                run.error = Some(cause);
                run.plugin_output = Some(raw_output);
                Invoked::Failed(
                    CaseStatus::ContractViolation,
                    "Error processing the output of the plugin".to_string(),
                )
            }
        })
    }

    /// Invoke and validate; `Err(report)` when the run already failed
    async fn invoke_and_validate(
        &self,
        plugin: &Path,
        input: &CanonicalInput,
        run: &mut PluginRun,
    ) -> Result<std::result::Result<Value, CaseReport>> {
        // Unknown (version, action) pairs fail before the plugin runs
        let schema = self.schemas.lookup(&input.version, input.action)?;

        let output = match self.invoke(plugin, input, run).await? {
            Invoked::Output(output) => output,
            Invoked::Failed(status, description) => {
                return Ok(Err(CaseReport::failed(Some(run.clone()), status, description)));
            }
        };

        match schema.validate(&output) {
            ValidationOutcome::Pass => Ok(Ok(output)),
            ValidationOutcome::Fail { path, cause } => {
                tracing::warn!(schema = schema.name(), %path, %cause, "Plugin output failed validation");
                Ok(Err(CaseReport::failed(
                    Some(run.clone()),
                    CaseStatus::ContractViolation,
                    format!("Validation error {cause} at {path}"),
                )))
            }
        }
    }

    /// Run the plugin once and check its output against the schema
    pub async fn check(&self, plugin: &Path, input: CanonicalInput) -> Result<CaseReport> {
        let mut run = PluginRun::new(plugin.display().to_string(), input.input.to_value());

        match self.invoke_and_validate(plugin, &input, &mut run).await? {
            Ok(_) => Ok(CaseReport::passed(run, "Validation passed")),
            Err(report) => Ok(report),
        }
    }

    /// Run the plugin once, check the schema, then compare expected keys
    pub async fn test(
        &self,
        plugin: &Path,
        input: CanonicalInput,
        expected: &Map<String, Value>,
    ) -> Result<CaseReport> {
        let mut run = PluginRun::new(plugin.display().to_string(), input.input.to_value());
        run.output_expected = Some(Value::Object(expected.clone()));

        let output = match self.invoke_and_validate(plugin, &input, &mut run).await? {
            Ok(output) => output,
            Err(report) => return Ok(report),
        };

        match compare_expected(expected, &output) {
            Ok(()) => Ok(CaseReport::passed(run, "Test passed. All output as expected")),
            Err(description) => Ok(CaseReport::failed(
                Some(run),
                CaseStatus::ContractViolation,
                description,
            )),
        }
    }

    /// Build the canonical input of a suite case
    fn case_input(&self, case: &TestCase) -> Result<CanonicalInput> {
        let overrides = PluginInput::from_value(Value::Object(case.input.clone()), "test case")?;
        merge(PluginInput::default(), [overrides]).canonicalize(None, &self.schemas)
    }

    async fn run_case(&self, plugin: &Path, case: &TestCase) -> Result<CaseReport> {
        let input = self.case_input(case)?;
        self.test(plugin, input, &case.expected_output).await
    }

    /// Run every case of `suite` in order
    ///
    /// `plugin` replaces the suite's own `exec_file` when given.
    pub async fn run_suite(&self, suite: &TestSuite, plugin: Option<&Path>) -> Result<SuiteReport> {
        let plugin: PathBuf = match (plugin, &suite.exec_file) {
            (Some(plugin), _) => plugin.to_path_buf(),
            (None, Some(exec)) => resolve_plugin(&exec.to_string_lossy())?,
            (None, None) => {
                return Err(Error::MissingInput(
                    "the suite has no exec_file and no plugin was given".to_string(),
                ))
            }
        };

        let mut report = SuiteReport::default();
        for (index, case) in suite.tests.iter().enumerate() {
            tracing::info!(case = index + 1, total = suite.tests.len(), "Running test case");

            let case_report = match self.run_case(&plugin, case).await {
                Ok(case_report) => case_report,
                Err(e) if e.exit_status() == ExitStatus::UserError => {
                    tracing::warn!(case = index + 1, error = %e, "Test case input is invalid");
                    CaseReport::failed(None, CaseStatus::InputError, e.to_string())
                }
                Err(e) => return Err(e),
            };
            report.push(case_report.with_name(case.name.clone()));
        }

        tracing::info!(
            total = report.stats.total,
            passed = report.stats.passed,
            failed = report.stats.failed,
            "Suite finished"
        );
        Ok(report)
    }

    /// Ask the plugin for its parameters and fold their defaults into `input`
    pub async fn generate(&self, plugin: &Path, input: CanonicalInput) -> Result<PluginInput> {
        let mut probe = input.clone();
        probe.action = Action::Parameter;
        probe
            .input
            .set("action", Value::String(Action::Parameter.as_str().to_string()));

        let mut run = PluginRun::new(plugin.display().to_string(), probe.input.to_value());
        let output = match self.invoke_and_validate(plugin, &probe, &mut run).await? {
            Ok(output) => output,
            Err(report) => {
                let detail = run_detail(&report);
                return Err(match report.status {
                    CaseStatus::ExecutionFailure => Error::PluginExecution(detail),
                    _ => Error::PluginOutput(detail),
                });
            }
        };

        let mut conf_params = Map::new();
        if let Some(Value::Array(entries)) = output.get("conf_params") {
            for entry in entries {
                if let (Some(Value::String(name)), Some(default)) =
                    (entry.get("name"), entry.get("default"))
                {
                    conf_params.insert(name.clone(), default.clone());
                }
            }
        }
        tracing::debug!(count = conf_params.len(), "Collected conf_params defaults");

        let mut generated = input.input;
        generated.set("conf_params", Value::Object(conf_params));
        let canonical = generated.canonicalize(Some(input.action), &self.schemas)?;
        Ok(canonical.input)
    }
}

fn run_detail(report: &CaseReport) -> String {
    match report.plugin.as_ref().and_then(|run| run.error.as_ref()) {
        Some(error) => format!("{}: {error}", report.description),
        None => report.description.clone(),
    }
}

/// Compare only the keys named in `expected`, by value equality
///
/// Numbers compare by value, so `1` matches `1.0`.
pub fn compare_expected(expected: &Map<String, Value>, actual: &Value) -> std::result::Result<(), String> {
    for (key, want) in expected {
        match actual.get(key) {
            Some(got) if same_value(got, want) => {}
            Some(got) => {
                return Err(format!(
                    "Unexpected output for key {key}: '{got}' instead of '{want}'"
                ))
            }
            None => return Err(format!("Missing output for key {key}: expected '{want}'")),
        }
    }
    Ok(())
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => l == r,
        },
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(l, r)| same_value(l, r))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(key, l)| r.get(key).is_some_and(|r| same_value(l, r)))
        }
        _ => left == right,
    }
}
