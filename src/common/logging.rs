//! Logging and tracing configuration
//!
//! Logs always go to stderr: stdout is reserved for the report document,
//! which scripts parse in machine-readable mode.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map the number of `-v` flags to a default filter directive
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "watts_plugin_tester=warn,warn",
        1 => "watts_plugin_tester=info,warn",
        2 => "watts_plugin_tester=debug,info",
        _ => "watts_plugin_tester=trace,debug",
    }
}

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable. Without it
/// the level follows the verbosity flag.
pub fn init_cli(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_raises_level() {
        assert!(default_directive(0).contains("=warn"));
        assert!(default_directive(1).contains("=info"));
        assert!(default_directive(2).contains("=debug"));
        assert!(default_directive(7).contains("=trace"));
    }

    #[test]
    fn test_directives_parse() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(default_directive(v)).is_ok());
        }
    }
}
