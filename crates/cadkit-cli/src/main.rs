//! `cadkit-cli` — the outer JSON-RPC surface over the `cadkit` core.
//!
//! Reads newline-delimited JSON-RPC 2.0 requests from stdin (or a file,
//! via `--script`), dispatches them through [`cadkit::dispatch::Dispatcher`],
//! and writes newline-delimited responses to stdout.

mod rpc;

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cadkit::config::CadkitConfig;
use cadkit::dispatch::Dispatcher;
use cadkit::store::Store;
use cadkit_kernel::AnalyticBackend;

/// Multi-agent CAD core: JSON-RPC request/response loop over `cadkit`.
#[derive(Parser)]
#[command(name = "cadkit")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace directory (defaults to `MULTI_AGENT_WORKSPACE_DIR` or `.cadkit`, §6).
    #[arg(long, env = "MULTI_AGENT_WORKSPACE_DIR")]
    workspace_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC requests over stdin/stdout, one object per line.
    Serve {
        /// Agent id attributed to requests that omit one. Defaults to "cli".
        #[arg(long, default_value = "cli")]
        agent_id: String,
    },

    /// Run a scripted sequence of JSON-RPC requests from a file
    /// (§4.6 `scenario.run`).
    Scenario {
        /// Path to a file of newline-delimited JSON-RPC requests.
        #[arg(long)]
        script: PathBuf,

        #[arg(long, default_value = "cli")]
        agent_id: String,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let workspace_dir = CadkitConfig::resolve_workspace_dir(cli.workspace_dir.as_deref());
    let config = CadkitConfig::load(&workspace_dir).context("loading cadkit configuration")?;

    let store = Arc::new(Store::new());
    let kernel: Arc<dyn cadkit_kernel::GeometryBackend> = Arc::new(AnalyticBackend);
    let dispatcher = Dispatcher::new(store, kernel, config);

    match cli.command {
        Commands::Serve { agent_id } => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            rpc::run_loop(&dispatcher, stdin.lock(), stdout.lock(), &agent_id)
                .context("serving JSON-RPC requests over stdio")
        }
        Commands::Scenario { script, agent_id } => {
            let file = std::fs::File::open(&script)
                .with_context(|| format!("opening scenario script {}", script.display()))?;
            let stdout = std::io::stdout();
            rpc::run_loop(&dispatcher, BufReader::new(file), stdout.lock(), &agent_id)
                .context("running scenario script")
        }
    }
}
