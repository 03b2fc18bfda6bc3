use clap::Parser;
use log::{error, info, warn};
use server::network::NetworkServer;
use server::quiz_store::InMemoryQuizStore;
use server::service::{EngineConfig, GameService};
use server::snapshot;
use std::path::PathBuf;
use std::sync::Arc;

/// Session server for live drag-and-drop ordering quizzes.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// JSON file with quiz definitions (falls back to a built-in demo quiz)
    #[clap(long)]
    quizzes: Option<PathBuf>,
    /// Snapshot file: restored on boot if present, written on shutdown
    #[clap(long)]
    snapshot: Option<PathBuf>,
    /// Join code length
    #[clap(long, default_value = "6")]
    code_length: usize,
    /// Per-subscriber event queue depth
    #[clap(long, default_value = "64")]
    queue_depth: usize,
    /// Maximum participants per session
    #[clap(long, default_value = "64")]
    max_participants: usize,
    /// Refuse joins once a round is active
    #[clap(long)]
    freeze_late_join: bool,
    /// Remove kicked participants from leaderboards entirely
    #[clap(long)]
    drop_kicked_scores: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let store = match &args.quizzes {
        Some(path) => {
            let store = InMemoryQuizStore::from_json_file(path)?;
            info!("Loaded {} quiz(zes) from {}", store.len(), path.display());
            store
        }
        None => {
            info!("No quiz file given, serving the built-in demo quiz");
            InMemoryQuizStore::with_demo_quiz()
        }
    };

    let config = EngineConfig {
        code_length: args.code_length,
        allow_late_join: !args.freeze_late_join,
        retain_kicked_scores: !args.drop_kicked_scores,
        max_participants: args.max_participants,
        event_queue_depth: args.queue_depth,
        ..EngineConfig::default()
    };
    let service = Arc::new(GameService::new(Arc::new(store), config));

    if let Some(path) = &args.snapshot {
        match std::fs::read(path) {
            Ok(bytes) => {
                snapshot::restore(service.registry(), &bytes).await?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let address = format!("{}:{}", args.host, args.port);
    let server = NetworkServer::bind(&address, Arc::clone(&service)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server loop failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    if let Some(path) = &args.snapshot {
        match snapshot::snapshot(service.registry()).await {
            Ok(bytes) => {
                std::fs::write(path, bytes)?;
                info!("Wrote snapshot to {}", path.display());
            }
            Err(e) => warn!("Could not take shutdown snapshot: {}", e),
        }
    }

    Ok(())
}
