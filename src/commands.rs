//! CLI command definitions
//!
//! Defines the clap commands and the flags shared by all of them.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::input::InputSources;

/// Flags accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// The plugin action to run the plugin with (parameter, request, revoke)
    #[arg(long = "plugin-action", short = 'a', global = true)]
    pub plugin_action: Option<String>,

    /// Path or name of the plugin executable
    #[arg(long, short = 'p', global = true)]
    pub plugin: Option<String>,

    /// Complement the plugin input with a json file
    #[arg(long = "input-file", short = 'j', global = true)]
    pub input_file: Option<PathBuf>,

    /// Complement the plugin input with a json object (provided as a string)
    #[arg(long = "input-string", global = true)]
    pub input_string: Option<String>,

    /// Complement the plugin input with the config parameters from a watts config
    #[arg(long = "input-config", short = 'c', global = true)]
    pub input_config: Option<PathBuf>,

    /// Service ID for the watts config
    #[arg(long = "input-config-identifier", short = 'i', global = true)]
    pub input_config_id: Option<String>,

    /// Be machine readable (all output will be json)
    #[arg(long, short = 'm', global = true)]
    pub machine: bool,

    /// Pass the plugin input in an environment variable instead of an argument
    #[arg(long, short = 'e', global = true)]
    pub env: bool,

    /// Environment variable used with --env (default: WATTS_PARAMETER)
    #[arg(long = "env-var", global = true)]
    pub env_var: Option<String>,

    /// Seconds to wait for the plugin before killing it
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalOptions {
    pub fn input_sources(&self) -> InputSources {
        InputSources {
            file: self.input_file.clone(),
            string: self.input_string.clone(),
            config: self.input_config.clone(),
            config_id: self.input_config_id.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a plugin against the inbuilt typed schema
    Check,

    /// Test a plugin against the inbuilt typed schema and expected output values
    Test {
        /// Expected output as a file
        #[arg(long = "expected-output-file")]
        expected_output_file: Option<PathBuf>,

        /// Expected output as a string
        #[arg(long = "expected-output-string")]
        expected_output_string: Option<String>,
    },

    /// Test a plugin using a test suite file
    Tests {
        /// Suite file (JSON, or YAML with a .yaml/.yml extension)
        config: PathBuf,
    },

    /// Print the default plugin input as json
    Default,

    /// Print the plugin input (including the user overrides) as json
    Specific,

    /// Generate a fitting json input file for the given plugin
    Generate,
}
