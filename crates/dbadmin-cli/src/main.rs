//! dbadmin
//!
//! Interactive administration shell for a database cluster's management API:
//! - `list`, `create`, `change` and `delete` databases,
//! - grammar-aware tab completion that never calls the cluster,
//! - single-shot (`dbadmin -u admin list db`) and script (`--script FILE|-`) modes.

use anyhow::{anyhow, Result};
use clap::Parser;
use dbadmin_core::{CommandExecutor, EntityRegistry};
use dbadmin_rest::{RestClient, DEFAULT_PORT};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

use config::{Mode, ShellConfig};

#[derive(Parser, Debug)]
#[command(name = "dbadmin")]
#[command(
    author,
    version,
    about = "Interactive administration shell for a database cluster"
)]
pub struct Cli {
    /// Cluster management host.
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Management API port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// User name for HTTP basic auth. The password comes from
    /// `DBADMIN_PASSWORD` or an interactive prompt.
    #[arg(short, long)]
    user: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Verify the cluster's TLS certificate.
    #[arg(long)]
    verify_tls: bool,

    /// Full base URL of the management API, overriding host and port.
    #[arg(long, hide = true)]
    base_url: Option<String>,

    /// Log filter (e.g. `debug`, `dbadmin_rest=debug`). Defaults to `RUST_LOG`,
    /// then `warn`.
    #[arg(long)]
    log_level: Option<String>,

    /// Read commands from a file (`-` for stdin) instead of the terminal.
    #[arg(long)]
    script: Option<PathBuf>,

    /// In script mode, report failing lines and keep going.
    #[arg(long)]
    continue_on_error: bool,

    /// Run this one command and exit.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let password = config::read_password(
        &cli.user,
        |key| std::env::var(key).ok(),
        |prompt| rpassword::prompt_password(prompt),
    )?;
    let config = ShellConfig::from_cli(cli, password);

    let client = RestClient::new(&config.client)?;
    info!(root = %client.root(), "connecting to management API");

    let registry = EntityRegistry::new();
    registry
        .refresh(&client)
        .map_err(|e| anyhow!("cannot connect to cluster: {e}"))?;
    let executor = CommandExecutor::new(client, registry);

    match &config.mode {
        Mode::Interactive => repl::run_interactive(&executor),
        Mode::Script(path) => repl::run_script(&executor, path, config.continue_on_error),
        Mode::Single(words) => repl::run_single(&executor, words),
    }
}
