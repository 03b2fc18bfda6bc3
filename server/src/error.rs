//! Error taxonomy for the session engine
//!
//! Every error here is local to the operation that raised it: it never
//! alters shared session state and never propagates to other subscribers
//! of the session channel. There is no fatal error class in the engine;
//! lookup misses and rejected actions are ordinary user-facing outcomes.

use shared::ScoringError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("session not found")]
    SessionNotFound,
    #[error("quiz not found")]
    QuizNotFound,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("action not allowed while session is {state}")]
    InvalidState { state: &'static str },
    #[error("session has ended")]
    SessionClosed,
    #[error("session is full")]
    SessionFull,
    #[error("nickname is empty")]
    EmptyNickname,
    #[error("nickname already taken")]
    DuplicateNickname,
    #[error("answer already submitted")]
    DuplicateSubmission,
    #[error("invalid submission: {0}")]
    InvalidSubmission(#[from] ScoringError),
    #[error("no join codes available")]
    RegistryFull,
    #[error("host token does not match")]
    NotHost,
}

impl GameError {
    /// Stable machine-readable code carried in wire error packets.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound => "session_not_found",
            GameError::QuizNotFound => "quiz_not_found",
            GameError::ParticipantNotFound => "participant_not_found",
            GameError::InvalidState { .. } => "invalid_state",
            GameError::SessionClosed => "session_closed",
            GameError::SessionFull => "session_full",
            GameError::EmptyNickname => "empty_nickname",
            GameError::DuplicateNickname => "duplicate_nickname",
            GameError::DuplicateSubmission => "duplicate_submission",
            GameError::InvalidSubmission(_) => "invalid_submission",
            GameError::RegistryFull => "registry_full",
            GameError::NotHost => "not_host",
        }
    }
}
