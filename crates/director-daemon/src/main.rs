#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use director_artifact::FileArtifactStore;
use director_capability::LeaseRegistry;
use director_config::{load_director_config, load_moods_config, load_verifiers_config};
use director_daemon::{build_app, AppState};
use director_eventlog::{EventLog, FileEventLog};
use director_projection::Projector;
use director_runtime::Director;
use director_sandbox::{LocalSandbox, Sandbox};
use director_verifier::{MemoryAttestationStore, VerifierRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "director-daemon", version, about = "Director control plane daemon")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8089")]
    bind: String,

    /// Directory holding director.toml, moods.toml, and verifiers.toml.
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Enable request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("director=debug")
    } else {
        EnvFilter::new("director=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let director_path = args.config_dir.join("director.toml");
    let moods_path = args.config_dir.join("moods.toml");
    let verifiers_path = args.config_dir.join("verifiers.toml");

    let config = load_director_config(director_path.is_file().then_some(director_path.as_path()))
        .context("load director.toml")?;
    let moods = load_moods_config(moods_path.is_file().then_some(moods_path.as_path())).context("load moods.toml")?;
    let verifiers = load_verifiers_config(&verifiers_path).context("load verifiers.toml")?;

    tokio::fs::create_dir_all(&config.storage.event_log_dir)
        .await
        .context("create event log dir")?;
    tokio::fs::create_dir_all(&config.storage.artifact_dir)
        .await
        .context("create artifact dir")?;
    tokio::fs::create_dir_all(&config.storage.receipts_dir)
        .await
        .context("create receipts dir")?;

    let log_path = PathBuf::from(&config.storage.event_log_dir).join("events.jsonl");
    let log: Arc<dyn EventLog> = Arc::new(FileEventLog::open(&log_path).await.context("open event log")?);
    let projector = Arc::new(Projector::new(log.clone()));
    projector.verify_rebuild_determinism().await.context("rebuild projection from log")?;

    let leases = Arc::new(LeaseRegistry::new());
    let artifacts: Arc<dyn director_artifact::ArtifactStore> =
        Arc::new(FileArtifactStore::new(&config.storage.artifact_dir));
    let sandbox: Arc<dyn Sandbox> = Arc::new(LocalSandbox::new(artifacts.clone()));
    let verifier = VerifierRunner::new(sandbox.clone(), artifacts, Arc::new(MemoryAttestationStore::default()));

    let profiles = moods.resolve();
    let allowlist_version = format!("{}-{}", config.namespace, verifiers.verifier.len());
    let allowlist = verifiers.into_allowlist();

    let director = Arc::new(Director::new(
        log.clone(),
        projector.clone(),
        leases,
        profiles,
        allowlist,
        allowlist_version,
        sandbox.clone(),
        verifier,
    ));

    let state = Arc::new(AppState { director, log, projector, sandbox });
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind).await.with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "director-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
