//! ossec-config - command-line editor for Wazuh/OSSEC configuration files
//!
//! Thin binary entry point that delegates to the handlers in `cli`.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let args = Cli::parse();
    initialize_tracing(args.verbose);
    cli::run(args)
}

/// `RUST_LOG` takes precedence; otherwise only warnings are shown unless
/// `--verbose` is passed.
fn initialize_tracing(verbose: bool) {
    let fallback = if verbose {
        "ossec_config_core=debug,ossec_config=debug"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
