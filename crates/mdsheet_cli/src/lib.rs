//! `mdsheet_cli` v1:
//! Command-line front end for the Markdown to workbook conversion.
//!
//! - `cli`     : clap argument model
//! - `conf`    : exit codes and asset paths
//! - `resolve` : package root, config, and template resolution
//! - `run`     : single-pass orchestration
pub mod cli;
pub mod conf;
pub mod resolve;
pub mod run;

pub use cli::Cli;
pub use run::{derive_exit_code, run, run_with_root};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Log filter: `-v` picks the level; otherwise `RUST_LOG` applies, falling back to `warn`.
pub fn derive_env_filter(n_verbose: u8, c_env: Option<&str>) -> EnvFilter {
    let filter = c_env
        .filter(|c_env| !c_env.trim().is_empty())
        .and_then(|c_env| EnvFilter::try_new(c_env).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    match n_verbose {
        0 => filter,
        1 => filter.add_directive(LevelFilter::INFO.into()),
        _ => filter.add_directive(LevelFilter::DEBUG.into()),
    }
}

/// Install the stderr log subscriber.
pub fn init_tracing(n_verbose: u8) {
    let c_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(derive_env_filter(n_verbose, c_env.as_deref()))
        .init();
}
