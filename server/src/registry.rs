//! Join-code registry owning all live sessions
//!
//! The registry is the single process-wide map from join codes to
//! sessions. The map itself sits behind a `RwLock` so creation and
//! destruction are atomic with respect to lookups; each session value is
//! an `Arc<Mutex<Session>>`, making the session the unit of mutual
//! exclusion. Operations on different sessions never contend with each
//! other, and nothing ever takes two session locks at once.

use crate::error::GameError;
use crate::session::Session;
use log::{info, warn};
use rand::Rng;
use shared::CODE_ALPHABET;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    code_length: usize,
    max_code_attempts: u32,
}

impl SessionRegistry {
    pub fn new(code_length: usize, max_code_attempts: u32) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            code_length,
            max_code_attempts,
        }
    }

    /// Draws one candidate code uniformly from the code alphabet.
    fn random_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.code_length)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Allocates a fresh code and registers the session `build` produces
    /// for it. Code draw, uniqueness check, and insertion happen under
    /// one write lock, so no two sessions can ever hold the same code.
    /// Bounded retries keep a nearly saturated registry from looping
    /// forever; past the limit the caller gets `RegistryFull`.
    pub async fn create<F>(&self, build: F) -> Result<(String, Arc<Mutex<Session>>), GameError>
    where
        F: FnOnce(String) -> Session,
    {
        let mut sessions = self.sessions.write().await;

        for _ in 0..self.max_code_attempts {
            let code = self.random_code();
            if sessions.contains_key(&code) {
                continue;
            }

            let session = Arc::new(Mutex::new(build(code.clone())));
            sessions.insert(code.clone(), Arc::clone(&session));
            info!("Session {} created ({} active)", code, sessions.len());
            return Ok((code, session));
        }

        warn!(
            "Gave up allocating a join code after {} attempts",
            self.max_code_attempts
        );
        Err(GameError::RegistryFull)
    }

    /// Case-insensitive lookup; codes are stored uppercase.
    pub async fn get(&self, code: &str) -> Option<Arc<Mutex<Session>>> {
        let code = code.trim().to_ascii_uppercase();
        self.sessions.read().await.get(&code).cloned()
    }

    /// Removes a session and all its participant data. Idempotent:
    /// destroying an absent code is a no-op, not an error.
    pub async fn destroy(&self, code: &str) -> bool {
        let code = code.trim().to_ascii_uppercase();
        let removed = self.sessions.write().await.remove(&code).is_some();
        if removed {
            info!("Session {} destroyed", code);
        }
        removed
    }

    /// Re-registers a session restored from a snapshot under its
    /// original code, replacing any in-memory session with that code.
    pub async fn insert_restored(&self, session: Session) {
        let code = session.code.clone();
        self.sessions
            .write()
            .await
            .insert(code, Arc::new(Mutex::new(session)));
    }

    /// Handles to every live session, for snapshotting.
    pub async fn all_sessions(&self) -> Vec<Arc<Mutex<Session>>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
