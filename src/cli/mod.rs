//! CLI command handling
//!
//! Turns a parsed command into a [`Report`]. Nothing is printed here; the
//! caller renders the report and maps it to an exit code.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::commands::{Commands, GlobalOptions};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::input::{read_json_object, Action, CanonicalInput, PluginInput};
use crate::plugin::{resolve_plugin, PassMode, ProcessInvoker};
use crate::schema::SchemaRegistry;
use crate::testing::{Report, TestRunner, TestSuite};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, opts: &GlobalOptions) -> Result<Report> {
    match command {
        Commands::Default => Ok(Report::Input(PluginInput::default().to_value())),

        Commands::Specific => {
            let schemas = SchemaRegistry::builtin()?;
            let input = specify(opts, &schemas)?;
            Ok(Report::Input(input.input.to_value()))
        }

        Commands::Check => {
            let runner = build_runner(opts)?;
            let input = specify(opts, runner.schemas())?;
            let plugin = plugin_path(opts)?;
            Ok(Report::Case(runner.check(&plugin, input).await?))
        }

        Commands::Test {
            expected_output_file,
            expected_output_string,
        } => {
            let runner = build_runner(opts)?;
            let input = specify(opts, runner.schemas())?;
            let expected = expected_output(expected_output_file, expected_output_string)?;
            let plugin = plugin_path(opts)?;
            Ok(Report::Case(runner.test(&plugin, input, &expected).await?))
        }

        Commands::Tests { config } => {
            let runner = build_runner(opts)?;
            let suite = TestSuite::load(&config)?;
            let plugin = opts.plugin.as_deref().map(resolve_plugin).transpose()?;
            Ok(Report::Suite(
                runner.run_suite(&suite, plugin.as_deref()).await?,
            ))
        }

        Commands::Generate => {
            let runner = build_runner(opts)?;
            let input = specify(opts, runner.schemas())?;
            let plugin = plugin_path(opts)?;
            let generated = runner.generate(&plugin, input).await?;
            Ok(Report::Input(generated.to_value()))
        }
    }
}

/// Whether a command's report is forced into machine-readable form
pub fn forces_machine_output(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Default | Commands::Specific | Commands::Generate
    )
}

/// Build the canonical input from the default document and the user's sources
fn specify(opts: &GlobalOptions, schemas: &SchemaRegistry) -> Result<CanonicalInput> {
    let action = opts
        .plugin_action
        .as_deref()
        .map(str::parse::<Action>)
        .transpose()?;
    opts.input_sources().specify()?.canonicalize(action, schemas)
}

fn plugin_path(opts: &GlobalOptions) -> Result<PathBuf> {
    let reference = opts
        .plugin
        .as_deref()
        .ok_or_else(|| Error::MissingInput("no plugin given (use --plugin)".to_string()))?;
    resolve_plugin(reference)
}

fn pass_mode(opts: &GlobalOptions, settings: &Config) -> PassMode {
    if opts.env {
        let var = opts
            .env_var
            .clone()
            .unwrap_or_else(|| settings.invocation.env_var.clone());
        PassMode::Env(var)
    } else {
        PassMode::Argument
    }
}

fn build_runner(opts: &GlobalOptions) -> Result<TestRunner<ProcessInvoker>> {
    let settings = Config::load()?;
    let timeout = Duration::from_secs(opts.timeout.unwrap_or(settings.invocation.timeout_secs));
    tracing::debug!(?timeout, env = opts.env, "Configured plugin invocation");

    Ok(TestRunner::new(
        ProcessInvoker::new(timeout),
        SchemaRegistry::builtin()?,
        pass_mode(opts, &settings),
    ))
}

fn expected_output(file: Option<PathBuf>, string: Option<String>) -> Result<Map<String, Value>> {
    let expected = match (file, string) {
        (Some(file), _) => read_json_object(&file)?,
        (None, Some(string)) => PluginInput::from_json_str(&string, "expected output string")?,
        (None, None) => return Err(Error::MissingInput("no expected output provided".to_string())),
    };
    Ok(expected.into_map())
}
