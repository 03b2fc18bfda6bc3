//! # Ordering-Quiz Session Server Library
//!
//! Engine for hosting live, multi-participant drag-and-drop ordering
//! quizzes: participants join a session with a short code, the host
//! starts the round, participants submit an ordering of items, and the
//! engine scores them and broadcasts a live leaderboard to every
//! connected client.
//!
//! ## Core Responsibilities
//!
//! ### Session lifecycle
//! Sessions move strictly forward through waiting -> active -> finished.
//! The state machine validates every action against the current state;
//! rejected actions never corrupt shared state.
//!
//! ### Consistency under concurrency
//! Many independent connections operate on the session map at once. The
//! registry map is atomic with respect to lookups, and each session is
//! its own unit of mutual exclusion, so operations on one session are
//! serialized while different sessions proceed fully in parallel. Each
//! participant is scored at most once, enforced inside the session's
//! critical section.
//!
//! ### Live fan-out
//! State changes are published to per-session channels. Every subscriber
//! has its own bounded queue; a slow or dead connection is pruned without
//! affecting anyone else, and events on one channel arrive in mutation
//! order.
//!
//! ## Module Organization
//!
//! - `registry` — join-code allocation and the process-wide session map
//! - `roster` — per-session participants, nickname uniqueness, reconnects
//! - `session` — the lifecycle state machine and leaderboard ranking
//! - `broadcast` — per-channel subscriber queues and pruning
//! - `service` — the external facade tying the above together
//! - `quiz_store` — read-only quiz definition lookup (external seam)
//! - `snapshot` — optional save/restore of all sessions across restarts
//! - `network` — UDP/bincode transport in front of the facade
//! - `error` — the engine's error taxonomy
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::quiz_store::InMemoryQuizStore;
//! use server::service::{EngineConfig, GameService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryQuizStore::with_demo_quiz());
//!     let service = GameService::new(store, EngineConfig::default());
//!
//!     let created = service.create_session(1).await?;
//!     let joined = service.join_session(&created.code, "Alice").await?;
//!     service.start_session(&created.code, &created.host_token).await?;
//!     let score = service
//!         .submit_answer(&created.code, joined.participant_id, &[1, 2, 3, 4])
//!         .await?;
//!     println!("Alice scored {}", score.total_score);
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod error;
pub mod network;
pub mod quiz_store;
pub mod registry;
pub mod roster;
pub mod service;
pub mod session;
pub mod snapshot;

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Generate an opaque random token (host and connection tokens)
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
