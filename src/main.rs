//! WaTTS plugin tester - conformance checks for WaTTS plugins
//!
//! Runs a plugin with a generated request and validates its response
//! against the plugin contract of the requested action.

use clap::Parser;
use watts_plugin_tester::commands::{Commands, GlobalOptions};
use watts_plugin_tester::common::logging;
use watts_plugin_tester::{cli, ExitStatus};

#[derive(Parser)]
#[command(name = "watts-plugin-tester", about = "Test tool for watts plugins")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Usage errors share the user error exit code
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(ExitStatus::UserError.code());
        }
        Err(e) => e.exit(),
    };
    logging::init_cli(cli.options.verbose);

    let machine = cli.options.machine || cli::forces_machine_output(&cli.command);

    let result = cli::dispatch(cli.command, &cli.options).await.and_then(|report| {
        let rendered = report.render(machine)?;
        Ok((rendered, report.exit_status()))
    });

    match result {
        Ok((rendered, status)) => {
            print!("{rendered}");
            std::process::exit(status.code());
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("Error: {e}");
            std::process::exit(e.exit_status().code());
        }
    }
}

