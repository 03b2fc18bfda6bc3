//! Participant roster management for one quiz session
//!
//! This module handles the per-session set of joined participants, including:
//! - Join admission and case-insensitive nickname uniqueness
//! - Connection token issuance and reissue on reconnect
//! - Host-initiated kicks, which mark rather than delete so recorded
//!   scores can still be reported under the configured policy
//! - Capacity enforcement
//!
//! The roster never inspects session lifecycle state; the session state
//! machine decides whether a join or submit is currently legal and only
//! then consults the roster.

use crate::error::GameError;
use crate::random_token;
use log::info;
use serde::{Deserialize, Serialize};
use shared::{ItemId, ParticipantId, ScoreResult};
use std::collections::HashMap;

const CONNECTION_TOKEN_LEN: usize = 24;

/// A player who has joined a session.
///
/// `answer`, `score` and `submitted_at` are set together, exactly once,
/// on the first successfully scored submission and are immutable after
/// that. A kick flips `kicked` but touches nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Unique within the session, assigned in join order.
    pub id: ParticipantId,
    /// Display name, trimmed; uniqueness is case-insensitive.
    pub nickname: String,
    /// Opaque value correlating the participant to its live connection.
    /// Reassigned on reconnect; never used for scoring.
    pub connection_token: String,
    pub joined_at: u64,
    pub answer: Option<Vec<ItemId>>,
    pub score: Option<ScoreResult>,
    pub submitted_at: Option<u64>,
    pub kicked: bool,
}

impl Participant {
    fn new(id: ParticipantId, nickname: String, joined_at: u64) -> Self {
        Self {
            id,
            nickname,
            connection_token: random_token(CONNECTION_TOKEN_LEN),
            joined_at,
            answer: None,
            score: None,
            submitted_at: None,
            kicked: false,
        }
    }

    /// True once a scored answer is recorded for this participant.
    pub fn has_submitted(&self) -> bool {
        self.score.is_some()
    }
}

/// The set of participants of one session, keyed by participant id.
///
/// Ids are assigned sequentially starting from 1, so iterating in id
/// order is join order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    participants: HashMap<ParticipantId, Participant>,
    next_participant_id: ParticipantId,
    max_participants: usize,
}

impl Roster {
    pub fn new(max_participants: usize) -> Self {
        Self {
            participants: HashMap::new(),
            next_participant_id: 1,
            max_participants,
        }
    }

    /// Admits a new participant.
    ///
    /// The nickname is trimmed before any check. Rejects empty nicknames,
    /// a full roster, and nicknames already held (case-insensitively) by
    /// a non-kicked participant. Returns a clone of the new record so the
    /// caller can hand out the id and connection token.
    pub fn join(&mut self, nickname: &str, now: u64) -> Result<Participant, GameError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(GameError::EmptyNickname);
        }
        if self.active_count() >= self.max_participants {
            return Err(GameError::SessionFull);
        }
        if self
            .active()
            .any(|p| p.nickname.eq_ignore_ascii_case(nickname))
        {
            return Err(GameError::DuplicateNickname);
        }

        let id = self.next_participant_id;
        self.next_participant_id += 1;

        let participant = Participant::new(id, nickname.to_string(), now);
        info!("Participant {} ({}) joined", id, participant.nickname);
        self.participants.insert(id, participant.clone());

        Ok(participant)
    }

    /// Reissues the connection token of a dropped participant so the
    /// client can resume without losing answer or score state.
    pub fn reconnect(&mut self, id: ParticipantId) -> Result<Participant, GameError> {
        let participant = self
            .participants
            .get_mut(&id)
            .filter(|p| !p.kicked)
            .ok_or(GameError::ParticipantNotFound)?;

        participant.connection_token = random_token(CONNECTION_TOKEN_LEN);
        info!("Participant {} ({}) reconnected", id, participant.nickname);
        Ok(participant.clone())
    }

    /// Marks a participant as kicked. The record stays in place so an
    /// already-recorded score can still be surfaced if the session is
    /// configured to retain kicked scores.
    pub fn kick(&mut self, id: ParticipantId) -> Result<Participant, GameError> {
        let participant = self
            .participants
            .get_mut(&id)
            .filter(|p| !p.kicked)
            .ok_or(GameError::ParticipantNotFound)?;

        participant.kicked = true;
        info!("Participant {} ({}) kicked", id, participant.nickname);
        Ok(participant.clone())
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    /// All participants in join order, kicked ones included.
    pub fn all(&self) -> Vec<&Participant> {
        let mut everyone: Vec<&Participant> = self.participants.values().collect();
        everyone.sort_by_key(|p| p.id);
        everyone
    }

    /// Non-kicked participants in join order.
    pub fn active(&self) -> impl Iterator<Item = &Participant> {
        let mut live: Vec<&Participant> =
            self.participants.values().filter(|p| !p.kicked).collect();
        live.sort_by_key(|p| p.id);
        live.into_iter()
    }

    /// Nicknames of non-kicked participants in join order, as carried in
    /// roster-update events.
    pub fn active_nicknames(&self) -> Vec<String> {
        self.active().map(|p| p.nickname.clone()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.participants.values().filter(|p| !p.kicked).count()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
