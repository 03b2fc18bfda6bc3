//! Optional session snapshot persistence
//!
//! Serializes every live session (participants, answers, scores, state)
//! to a bincode blob and restores them into a registry on boot. The
//! engine works identically without it; losing a snapshot only means
//! sessions do not survive a process restart. Live subscriptions are
//! never part of a snapshot; clients re-subscribe after a restart.

use crate::registry::SessionRegistry;
use crate::session::Session;
use log::info;
use serde::{Deserialize, Serialize};

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    taken_at: u64,
    sessions: Vec<Session>,
}

/// Serializes all sessions currently in the registry.
pub async fn snapshot(registry: &SessionRegistry) -> Result<Vec<u8>, bincode::Error> {
    let mut sessions = Vec::new();
    for handle in registry.all_sessions().await {
        sessions.push(handle.lock().await.clone());
    }

    let file = SnapshotFile {
        version: SNAPSHOT_FORMAT_VERSION,
        taken_at: crate::timestamp_ms(),
        sessions,
    };
    info!("Snapshotting {} session(s)", file.sessions.len());
    bincode::serialize(&file)
}

/// Restores snapshotted sessions into `registry`, keeping their original
/// codes. Returns how many sessions were restored.
pub async fn restore(
    registry: &SessionRegistry,
    bytes: &[u8],
) -> Result<usize, Box<dyn std::error::Error>> {
    let file: SnapshotFile = bincode::deserialize(bytes)?;
    if file.version != SNAPSHOT_FORMAT_VERSION {
        return Err(format!("unsupported snapshot version {}", file.version).into());
    }

    let count = file.sessions.len();
    for session in file.sessions {
        registry.insert_restored(session).await;
    }
    info!("Restored {} session(s) from snapshot", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Quiz, QuizItem};

    fn quiz() -> Quiz {
        Quiz {
            id: 1,
            title: "Snap".to_string(),
            description: String::new(),
            num_positions: 2,
            layout: "grid".to_string(),
            items: vec![
                QuizItem {
                    id: 1,
                    correct_position: 1,
                    image_url: String::new(),
                    label: None,
                },
                QuizItem {
                    id: 2,
                    correct_position: 2,
                    image_url: String::new(),
                    label: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_snapshot_restore_preserves_scores_and_state() {
        let registry = SessionRegistry::new(6, 32);
        let (code, handle) = registry
            .create(|code| Session::new(code, "host".to_string(), quiz(), 0, 16, true))
            .await
            .unwrap();

        let alice_id = {
            let mut session = handle.lock().await;
            let alice = session.join("Alice", 10, true).unwrap();
            session.start(20).unwrap();
            session.submit(alice.id, &[1, 2], 30).unwrap();
            alice.id
        };

        let bytes = snapshot(&registry).await.unwrap();

        let fresh = SessionRegistry::new(6, 32);
        let restored = restore(&fresh, &bytes).await.unwrap();
        assert_eq!(restored, 1);

        let handle = fresh.get(&code).await.unwrap();
        let mut session = handle.lock().await;
        assert_eq!(session.state.name(), "active");
        let board = session.leaderboard();
        assert_eq!(board[0].nickname, "Alice");
        assert_eq!(board[0].score, 200);

        // The restored session keeps enforcing at-most-one submission.
        let err = session.submit(alice_id, &[2, 1], 40).unwrap_err();
        assert_eq!(err, crate::error::GameError::DuplicateSubmission);
    }

    #[tokio::test]
    async fn test_restore_rejects_unknown_version() {
        let file = SnapshotFile {
            version: 99,
            taken_at: 0,
            sessions: vec![],
        };
        let bytes = bincode::serialize(&file).unwrap();

        let registry = SessionRegistry::new(6, 32);
        assert!(restore(&registry, &bytes).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_registry_snapshot_roundtrip() {
        let registry = SessionRegistry::new(6, 32);
        let bytes = snapshot(&registry).await.unwrap();

        let fresh = SessionRegistry::new(6, 32);
        assert_eq!(restore(&fresh, &bytes).await.unwrap(), 0);
        assert_eq!(fresh.len().await, 0);
    }
}
