//! `gmsyncd` — the daemon binary. Wires cursor, id map, instrumentation,
//! dispatch, and the poll loop together with the control socket under one
//! shutdown signal.
//!
//! This binary is glue, not core: it owns no change-capture logic of its
//! own. The `demos/mediamonkey` binding (see `demos/mediamonkey.rs`) stands
//! in for the real media-player binding and remote client, both of which
//! §1 names as external collaborators outside this crate's scope.

#[path = "../../demos/mediamonkey.rs"]
mod mediamonkey;

use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gmsyncd::config::ConfDir;
use gmsyncd::control;
use gmsyncd::cursor::CursorStore;
use gmsyncd::idmap::IdMapStore;
use gmsyncd::poller::PollLoop;
use gmsyncd::remote::MockRemoteClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gmsyncd", about = "Local media-library sync daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// (Re)initialize the configuration for `confname`: writes config,
    /// resets the cursor, drops and recreates the Id Map, and attaches
    /// instrumentation to the watched database. Destroys prior mappings.
    InitConfig {
        confname: String,
        #[arg(long)]
        mp_db_path: PathBuf,
    },
    /// Run the poll loop and control socket until shutdown.
    Run {
        confname: String,
        #[arg(long, default_value_t = 7827)]
        port: u16,
    },
    /// Query whether a daemon is running on `port`.
    Status {
        #[arg(long, default_value_t = 7827)]
        port: u16,
    },
    /// Request a running daemon on `port` to shut down.
    Shutdown {
        #[arg(long, default_value_t = 7827)]
        port: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::InitConfig { confname, mp_db_path } => init_config(&confname, &mp_db_path),
        Command::Run { confname, port } => run(&confname, port),
        Command::Status { port } => {
            if control::is_running(port) {
                println!("running");
            } else {
                println!("not running");
            }
            Ok(())
        }
        Command::Shutdown { port } => control::request_shutdown(port).context("sending shutdown request"),
    }
}

fn init_config(confname: &str, mp_db_path: &std::path::Path) -> Result<()> {
    let binding = mediamonkey::binding();
    ConfDir::init(confname, binding.mp_type, mp_db_path, &binding).context("initializing configuration")?;
    info!(confname, "configuration initialized");
    Ok(())
}

fn run(confname: &str, port: u16) -> Result<()> {
    let conf_dir = ConfDir::resolve(confname)?;
    let config = conf_dir.load().context("loading configuration; run init-config first")?;
    let binding = mediamonkey::binding();
    if config.mp_type != binding.mp_type {
        anyhow::bail!("configured mp_type '{}' does not match the compiled-in binding '{}'", config.mp_type, binding.mp_type);
    }

    warn!("no production remote client is wired in; using an in-memory mock (the real cloud-service client is an external collaborator)");
    let remote = MockRemoteClient::new();

    let cursor = CursorStore::new(conf_dir.cursor_path());
    let id_map = IdMapStore::new(conf_dir.idmap_path());

    let listener = TcpListener::bind(("127.0.0.1", port)).with_context(|| format!("binding control socket on port {port}"))?;

    let (shutdown_handle, shutdown_listener) = gmsyncd::shutdown::channel();
    let (control_stop_tx, control_stop_rx) = crossbeam_channel::unbounded();

    let control_handle = std::thread::spawn(move || control::serve(listener, shutdown_handle, control_stop_rx));

    let poller = PollLoop::new(&config.mp_db_path, &binding, cursor, id_map, &remote, shutdown_listener);
    info!(confname, port, "gmsyncd running");
    let result = poller.run();

    let _ = control_stop_tx.send(());
    let _ = control_handle.join();

    result.context("poll loop exited")
}
