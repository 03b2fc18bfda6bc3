//! External facade of the session engine
//!
//! One async method per operation of the public interface. Every
//! mutating method locks exactly one session, applies the state-machine
//! transition, and publishes the resulting event while still holding the
//! lock, which is what gives each session channel its per-channel FIFO
//! guarantee. The transport layer (or any embedding) calls these methods
//! directly; nothing here knows about sockets or wire formats.

use crate::broadcast::{EventBroadcaster, Subscription};
use crate::error::GameError;
use crate::quiz_store::QuizStore;
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionOverview};
use crate::{random_token, timestamp_ms};
use shared::{GameEvent, ItemId, LeaderboardEntry, ParticipantId, ScoreResult};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

const HOST_TOKEN_LEN: usize = 32;

/// Engine policy knobs. Defaults match the original game's behavior
/// where it had one (6-char codes, joins allowed mid-round).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub code_length: usize,
    pub max_code_attempts: u32,
    /// Whether participants may still join once the round is active.
    pub allow_late_join: bool,
    /// Whether a kicked participant's recorded score stays on the
    /// leaderboard.
    pub retain_kicked_scores: bool,
    pub max_participants: usize,
    /// Bounded per-subscriber event queue depth.
    pub event_queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            code_length: shared::DEFAULT_CODE_LENGTH,
            max_code_attempts: 32,
            allow_late_join: true,
            retain_kicked_scores: true,
            max_participants: 64,
            event_queue_depth: 64,
        }
    }
}

/// Returned by `create_session`; the host token authorizes start,
/// finish, kick, and destroy.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub code: String,
    pub host_token: String,
}

/// Returned by `join_session` and `reconnect`.
#[derive(Debug, Clone)]
pub struct JoinedParticipant {
    pub participant_id: ParticipantId,
    pub connection_token: String,
}

pub struct GameService {
    registry: SessionRegistry,
    broadcaster: EventBroadcaster,
    quizzes: Arc<dyn QuizStore>,
    config: EngineConfig,
}

impl GameService {
    pub fn new(quizzes: Arc<dyn QuizStore>, config: EngineConfig) -> Self {
        Self {
            registry: SessionRegistry::new(config.code_length, config.max_code_attempts),
            broadcaster: EventBroadcaster::new(config.event_queue_depth),
            quizzes,
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    async fn session(&self, code: &str) -> Result<Arc<Mutex<Session>>, GameError> {
        self.registry
            .get(code)
            .await
            .ok_or(GameError::SessionNotFound)
    }

    fn ensure_host(session: &Session, host_token: &str) -> Result<(), GameError> {
        if session.host_token != host_token {
            return Err(GameError::NotHost);
        }
        Ok(())
    }

    fn publish(&self, session: &MutexGuard<'_, Session>, event: GameEvent) {
        self.broadcaster.publish(&session.code, &event);
    }

    /// Creates a session for the referenced quiz, in `Waiting` state.
    pub async fn create_session(&self, quiz_ref: u32) -> Result<CreatedSession, GameError> {
        let quiz = self
            .quizzes
            .fetch(quiz_ref)
            .ok_or(GameError::QuizNotFound)?;

        let host_token = random_token(HOST_TOKEN_LEN);
        let now = timestamp_ms();
        let config = &self.config;
        let token_for_session = host_token.clone();
        let (code, _) = self
            .registry
            .create(move |code| {
                Session::new(
                    code,
                    token_for_session,
                    quiz,
                    now,
                    config.max_participants,
                    config.retain_kicked_scores,
                )
            })
            .await?;

        Ok(CreatedSession { code, host_token })
    }

    /// Admits a participant and broadcasts the updated roster.
    pub async fn join_session(
        &self,
        code: &str,
        nickname: &str,
    ) -> Result<JoinedParticipant, GameError> {
        let session = self.session(code).await?;
        let mut session = session.lock().await;

        let participant = session.join(nickname, timestamp_ms(), self.config.allow_late_join)?;
        self.publish(
            &session,
            GameEvent::ParticipantJoined {
                participant_id: participant.id,
                nickname: participant.nickname.clone(),
                roster: session.roster.active_nicknames(),
            },
        );

        Ok(JoinedParticipant {
            participant_id: participant.id,
            connection_token: participant.connection_token,
        })
    }

    /// Reissues a dropped participant's connection token. Deliberately
    /// does not re-broadcast the roster; subscribers get the lighter
    /// reconnected signal instead.
    pub async fn reconnect(
        &self,
        code: &str,
        participant_id: ParticipantId,
    ) -> Result<JoinedParticipant, GameError> {
        let session = self.session(code).await?;
        let mut session = session.lock().await;

        let participant = session.roster.reconnect(participant_id)?;
        self.publish(
            &session,
            GameEvent::ParticipantReconnected {
                participant_id: participant.id,
                nickname: participant.nickname.clone(),
            },
        );

        Ok(JoinedParticipant {
            participant_id: participant.id,
            connection_token: participant.connection_token,
        })
    }

    /// Starts the round and broadcasts the quiz payload (answer key
    /// stripped) to every subscriber.
    pub async fn start_session(&self, code: &str, host_token: &str) -> Result<(), GameError> {
        let session = self.session(code).await?;
        let mut session = session.lock().await;

        Self::ensure_host(&session, host_token)?;
        session.start(timestamp_ms())?;
        self.publish(
            &session,
            GameEvent::GameStarted {
                quiz: session.quiz.public_view(),
            },
        );
        Ok(())
    }

    /// Scores a submission and broadcasts the updated leaderboard.
    pub async fn submit_answer(
        &self,
        code: &str,
        participant_id: ParticipantId,
        order: &[ItemId],
    ) -> Result<ScoreResult, GameError> {
        let session = self.session(code).await?;
        let mut session = session.lock().await;

        let result = session.submit(participant_id, order, timestamp_ms())?;
        self.publish(
            &session,
            GameEvent::LeaderboardUpdate {
                entries: session.leaderboard(),
            },
        );
        Ok(result)
    }

    /// Ends the round and broadcasts the final leaderboard.
    pub async fn finish_session(
        &self,
        code: &str,
        host_token: &str,
    ) -> Result<Vec<LeaderboardEntry>, GameError> {
        let session = self.session(code).await?;
        let mut session = session.lock().await;

        Self::ensure_host(&session, host_token)?;
        session.finish(timestamp_ms())?;
        let leaderboard = session.leaderboard();
        self.publish(
            &session,
            GameEvent::GameFinished {
                leaderboard: leaderboard.clone(),
            },
        );
        Ok(leaderboard)
    }

    /// Kicks a participant and broadcasts the updated roster.
    pub async fn kick_participant(
        &self,
        code: &str,
        host_token: &str,
        participant_id: ParticipantId,
    ) -> Result<(), GameError> {
        let session = self.session(code).await?;
        let mut session = session.lock().await;

        Self::ensure_host(&session, host_token)?;
        let kicked = session.kick(participant_id)?;
        self.publish(
            &session,
            GameEvent::ParticipantKicked {
                participant_id: kicked.id,
                nickname: kicked.nickname,
                roster: session.roster.active_nicknames(),
            },
        );
        Ok(())
    }

    /// Registers a live connection on the session's event channel.
    pub async fn subscribe_events(&self, code: &str) -> Result<Subscription, GameError> {
        let session = self.session(code).await?;
        let canonical = session.lock().await.code.clone();
        Ok(self.broadcaster.subscribe(&canonical))
    }

    /// Idempotent unsubscribe; a dropped connection never removes
    /// submitted answers or scores.
    pub async fn unsubscribe_events(&self, code: &str, subscription_id: u64) {
        let code = code.trim().to_ascii_uppercase();
        self.broadcaster.unsubscribe(&code, subscription_id);
    }

    /// Removes the session and its channel. Idempotent for absent codes;
    /// an existing session requires the host token.
    pub async fn destroy_session(&self, code: &str, host_token: &str) -> Result<(), GameError> {
        let Some(session) = self.registry.get(code).await else {
            return Ok(());
        };

        let canonical = {
            let session = session.lock().await;
            Self::ensure_host(&session, host_token)?;
            session.code.clone()
        };

        self.registry.destroy(&canonical).await;
        self.broadcaster.close_channel(&canonical);
        Ok(())
    }

    /// Read-only host lobby view.
    pub async fn session_overview(&self, code: &str) -> Result<SessionOverview, GameError> {
        let session = self.session(code).await?;
        let session = session.lock().await;
        Ok(session.overview())
    }
}
