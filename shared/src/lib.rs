use serde::{Deserialize, Serialize};

pub mod scoring;

pub use scoring::{score_submission, ScoreResult, ScoringError};

/// Alphabet join codes are drawn from: uppercase letters plus digits.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DEFAULT_CODE_LENGTH: usize = 6;
/// Points awarded for each item placed in its correct position.
pub const POINTS_PER_CORRECT: u32 = 100;
pub const PROTOCOL_VERSION: u32 = 1;

pub type QuizRef = u32;
pub type ItemId = u32;
pub type ParticipantId = u32;

/// One orderable item of a quiz, including the answer key position.
///
/// The engine treats this as immutable reference data: the authoring
/// system owns it, sessions only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: ItemId,
    /// Position 1..=num_positions this item belongs in.
    pub correct_position: u32,
    pub image_url: String,
    pub label: Option<String>,
}

/// A quiz definition as delivered by the quiz store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizRef,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub num_positions: u32,
    /// Layout hint for clients ("grid" or "mindmap"); opaque to the engine.
    #[serde(default = "default_layout")]
    pub layout: String,
    pub items: Vec<QuizItem>,
}

fn default_layout() -> String {
    "grid".to_string()
}

impl Quiz {
    /// Checks that the answer key is usable: one item per position and
    /// the correct positions form exactly 1..=num_positions.
    pub fn validate(&self) -> bool {
        let n = self.num_positions as usize;
        if n == 0 || self.items.len() != n {
            return false;
        }

        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_positions = vec![false; n];
        for item in &self.items {
            if !seen_ids.insert(item.id) {
                return false;
            }
            let p = item.correct_position as usize;
            if p < 1 || p > n || seen_positions[p - 1] {
                return false;
            }
            seen_positions[p - 1] = true;
        }
        true
    }

    /// The view of the quiz sent to participants when the round starts.
    /// Strips the answer key so clients cannot read correct positions.
    pub fn public_view(&self) -> QuizView {
        QuizView {
            title: self.title.clone(),
            description: self.description.clone(),
            num_positions: self.num_positions,
            layout: self.layout.clone(),
            items: self
                .items
                .iter()
                .map(|item| ItemView {
                    id: item.id,
                    image_url: item.image_url.clone(),
                    label: item.label.clone(),
                })
                .collect(),
        }
    }
}

/// Participant-facing quiz payload without correct positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizView {
    pub title: String,
    pub description: String,
    pub num_positions: u32,
    pub layout: String,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: ItemId,
    pub image_url: String,
    pub label: Option<String>,
}

/// One row of a leaderboard snapshot, ranked best-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub nickname: String,
    pub score: u32,
    /// Millisecond timestamp of the scored submission; None if the
    /// participant never submitted.
    pub submitted_at: Option<u64>,
}

/// State-change events fanned out to every connection subscribed to a
/// session channel. Per channel, subscribers observe these in the order
/// the session applied the underlying mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameEvent {
    ParticipantJoined {
        participant_id: ParticipantId,
        nickname: String,
        roster: Vec<String>,
    },
    ParticipantReconnected {
        participant_id: ParticipantId,
        nickname: String,
    },
    GameStarted {
        quiz: QuizView,
    },
    LeaderboardUpdate {
        entries: Vec<LeaderboardEntry>,
    },
    GameFinished {
        leaderboard: Vec<LeaderboardEntry>,
    },
    ParticipantKicked {
        participant_id: ParticipantId,
        nickname: String,
        roster: Vec<String>,
    },
}

/// Datagram protocol between clients and the session server. Every UDP
/// datagram carries exactly one bincode-encoded packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server requests
    CreateSession {
        quiz_ref: QuizRef,
    },
    Join {
        code: String,
        nickname: String,
    },
    Reconnect {
        code: String,
        participant_id: ParticipantId,
    },
    Start {
        code: String,
        host_token: String,
    },
    Submit {
        code: String,
        participant_id: ParticipantId,
        order: Vec<ItemId>,
    },
    Finish {
        code: String,
        host_token: String,
    },
    Kick {
        code: String,
        host_token: String,
        participant_id: ParticipantId,
    },
    Subscribe {
        code: String,
    },
    Unsubscribe {
        code: String,
    },
    Destroy {
        code: String,
        host_token: String,
    },

    // Server -> client responses
    SessionCreated {
        code: String,
        host_token: String,
    },
    Joined {
        participant_id: ParticipantId,
        connection_token: String,
    },
    Reconnected {
        connection_token: String,
    },
    Started,
    SubmitResult {
        total_score: u32,
        correct_count: u32,
    },
    Finished {
        leaderboard: Vec<LeaderboardEntry>,
    },
    KickAck,
    Subscribed,
    Unsubscribed,
    Destroyed,
    Event {
        event: GameEvent,
    },
    Error {
        code: String,
        message: String,
    },
}
