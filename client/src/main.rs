//! CrewSync Agent - runs the offline sync service against a remote store.
//!
//! Reads newline-delimited JSON commands from stdin (see
//! [`crewsync_client::agent`]) and writes one JSON response per line to
//! stdout. Logs go to stderr.

use std::sync::Arc;

use crewsync_client::agent::AgentCommand;
use crewsync_client::resources::default_schema;
use crewsync_client::{Config, FileStore, HttpRemoteStore, OfflineSync, ProbeConnectivity, RemoteStore};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewsync_client=debug,crewsync_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        remote = %config.remote_url,
        data_dir = %config.data_dir.display(),
        "Starting CrewSync agent"
    );

    let store = Arc::new(FileStore::open(&config.data_dir)?);
    let remote: Arc<dyn RemoteStore> = Arc::new(HttpRemoteStore::new(
        &config.remote_url,
        config.api_key.clone(),
        config.request_timeout,
    )?);
    let connectivity = ProbeConnectivity::spawn(remote.clone(), config.probe_interval);

    let mut sync = OfflineSync::with_options(
        default_schema(),
        store,
        remote,
        &connectivity,
        config.sync_options(),
    );
    sync.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match AgentCommand::parse(&line) {
            Ok(command) => command.execute(&sync).await,
            Err(e) => Err(e),
        };
        let response = response.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "command failed");
            json!({ "error": e.to_string() })
        });

        stdout.write_all(format!("{response}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    sync.stop().await;
    tracing::info!(pending = sync.pending_count().await, "CrewSync agent stopped");

    Ok(())
}
