//! Session lifecycle state machine
//!
//! A session moves strictly forward through waiting -> active -> finished.
//! Every mutating operation validates the current state first and leaves
//! the session untouched when it rejects, so a failed call never corrupts
//! what other participants see. Callers serialize access per session (the
//! registry hands each session out behind its own mutex), which is what
//! makes the at-most-one-submission and monotonic-state checks here
//! race-free.

use crate::error::GameError;
use crate::roster::{Participant, Roster};
use log::info;
use serde::{Deserialize, Serialize};
use shared::{score_submission, ItemId, LeaderboardEntry, ParticipantId, Quiz, ScoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Waiting,
    Active,
    Finished,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Waiting => "waiting",
            SessionState::Active => "active",
            SessionState::Finished => "finished",
        }
    }
}

/// One live instance of a quiz being played.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Join code; immutable after creation, unique among active sessions.
    pub code: String,
    /// Secret issued to the creator; required for start/finish/kick/destroy.
    pub host_token: String,
    /// Answer key, captured at creation and immutable for the session's life.
    pub quiz: Quiz,
    pub state: SessionState,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub roster: Roster,
    /// Whether a kicked participant's recorded score still appears on
    /// leaderboards.
    retain_kicked_scores: bool,
}

impl Session {
    pub fn new(
        code: String,
        host_token: String,
        quiz: Quiz,
        now: u64,
        max_participants: usize,
        retain_kicked_scores: bool,
    ) -> Self {
        Self {
            code,
            host_token,
            quiz,
            state: SessionState::Waiting,
            created_at: now,
            started_at: None,
            ended_at: None,
            roster: Roster::new(max_participants),
            retain_kicked_scores,
        }
    }

    fn invalid_state(&self) -> GameError {
        GameError::InvalidState {
            state: self.state.name(),
        }
    }

    /// Admits a participant. Finished sessions reject joins outright;
    /// active sessions accept them only when late join is enabled.
    pub fn join(
        &mut self,
        nickname: &str,
        now: u64,
        allow_late_join: bool,
    ) -> Result<Participant, GameError> {
        match self.state {
            SessionState::Finished => return Err(GameError::SessionClosed),
            SessionState::Active if !allow_late_join => return Err(self.invalid_state()),
            _ => {}
        }
        self.roster.join(nickname, now)
    }

    /// Starts the round. Legal only from `Waiting`.
    pub fn start(&mut self, now: u64) -> Result<(), GameError> {
        if self.state != SessionState::Waiting {
            return Err(self.invalid_state());
        }
        self.state = SessionState::Active;
        self.started_at = Some(now);
        info!("Session {} started", self.code);
        Ok(())
    }

    /// Records and scores a participant's ordering.
    ///
    /// Legal only while `Active`. A participant with a recorded score is
    /// refused (`DuplicateSubmission`, first score stands). A structurally
    /// invalid ordering is refused with nothing recorded, so a retry with
    /// a well-formed ordering is still possible.
    pub fn submit(
        &mut self,
        participant_id: ParticipantId,
        order: &[ItemId],
        now: u64,
    ) -> Result<ScoreResult, GameError> {
        if self.state != SessionState::Active {
            return Err(self.invalid_state());
        }

        let quiz = &self.quiz;
        let participant = self
            .roster
            .get(participant_id)
            .filter(|p| !p.kicked)
            .ok_or(GameError::ParticipantNotFound)?;
        if participant.has_submitted() {
            return Err(GameError::DuplicateSubmission);
        }

        let result = score_submission(order, quiz)?;

        let participant = self
            .roster
            .get_mut(participant_id)
            .ok_or(GameError::ParticipantNotFound)?;
        participant.answer = Some(order.to_vec());
        participant.score = Some(result.clone());
        participant.submitted_at = Some(now);

        info!(
            "Session {}: participant {} scored {} ({} correct)",
            self.code, participant_id, result.total_score, result.correct_count
        );
        Ok(result)
    }

    /// Ends the round. Legal from `Active`, or from `Waiting` when the
    /// host cancels before starting. The session is immutable afterwards
    /// except for destruction.
    pub fn finish(&mut self, now: u64) -> Result<(), GameError> {
        if self.state == SessionState::Finished {
            return Err(self.invalid_state());
        }
        self.state = SessionState::Finished;
        self.ended_at = Some(now);
        info!("Session {} finished", self.code);
        Ok(())
    }

    /// Kicks a participant. Not legal once the session is finished; the
    /// final leaderboard is frozen at that point.
    pub fn kick(&mut self, participant_id: ParticipantId) -> Result<Participant, GameError> {
        if self.state == SessionState::Finished {
            return Err(self.invalid_state());
        }
        self.roster.kick(participant_id)
    }

    /// Current ranking: score descending, earlier submission first, then
    /// participant id as the final deterministic tie-break. Participants
    /// without a submission rank below every submitter. Kicked
    /// participants appear only under the retain-kicked-scores policy.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Participant> = self
            .roster
            .all()
            .into_iter()
            .filter(|p| !p.kicked || self.retain_kicked_scores)
            .collect();

        ranked.sort_by(|a, b| {
            let score_a = a.score.as_ref().map_or(0, |s| s.total_score);
            let score_b = b.score.as_ref().map_or(0, |s| s.total_score);
            score_b
                .cmp(&score_a)
                .then_with(|| {
                    // None sorts after any timestamp: non-submitters last.
                    let at_a = a.submitted_at.unwrap_or(u64::MAX);
                    let at_b = b.submitted_at.unwrap_or(u64::MAX);
                    at_a.cmp(&at_b)
                })
                .then_with(|| a.id.cmp(&b.id))
        });

        ranked
            .iter()
            .enumerate()
            .map(|(index, p)| LeaderboardEntry {
                rank: index as u32 + 1,
                participant_id: p.id,
                nickname: p.nickname.clone(),
                score: p.score.as_ref().map_or(0, |s| s.total_score),
                submitted_at: p.submitted_at,
            })
            .collect()
    }

    /// Host lobby view: state, roster, and how many answers are in.
    pub fn overview(&self) -> SessionOverview {
        SessionOverview {
            code: self.code.clone(),
            state: self.state.name().to_string(),
            participants: self.roster.active_nicknames(),
            submitted_count: self
                .roster
                .active()
                .filter(|p| p.has_submitted())
                .count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOverview {
    pub code: String,
    pub state: String,
    pub participants: Vec<String>,
    pub submitted_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::QuizItem;

    fn abcd_quiz() -> Quiz {
        Quiz {
            id: 1,
            title: "ABCD".to_string(),
            description: String::new(),
            num_positions: 4,
            layout: "grid".to_string(),
            items: (1..=4)
                .map(|i| QuizItem {
                    id: i,
                    correct_position: i,
                    image_url: String::new(),
                    label: None,
                })
                .collect(),
        }
    }

    fn waiting_session() -> Session {
        Session::new(
            "AB12CD".to_string(),
            "host-secret".to_string(),
            abcd_quiz(),
            1_000,
            16,
            true,
        )
    }

    #[test]
    fn test_new_session_is_waiting() {
        let session = waiting_session();
        assert_eq!(session.state, SessionState::Waiting);
        assert!(session.started_at.is_none());
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn test_start_only_from_waiting() {
        let mut session = waiting_session();

        session.start(2_000).unwrap();
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.started_at, Some(2_000));

        let err = session.start(3_000).unwrap_err();
        assert_eq!(err, GameError::InvalidState { state: "active" });
        // First start timestamp is immutable.
        assert_eq!(session.started_at, Some(2_000));
    }

    #[test]
    fn test_perfect_submission_scores_400() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();

        let result = session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap();

        assert_eq!(result.total_score, 400);
        assert_eq!(result.correct_count, 4);
    }

    #[test]
    fn test_submit_rejected_while_waiting() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();

        let err = session.submit(alice.id, &[1, 2, 3, 4], 1_200).unwrap_err();
        assert_eq!(err, GameError::InvalidState { state: "waiting" });
        assert!(!session.roster.get(alice.id).unwrap().has_submitted());
    }

    #[test]
    fn test_second_submission_rejected_first_score_stands() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();

        session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap();
        let err = session.submit(alice.id, &[4, 3, 2, 1], 2_600).unwrap_err();

        assert_eq!(err, GameError::DuplicateSubmission);
        let recorded = session.roster.get(alice.id).unwrap();
        assert_eq!(recorded.score.as_ref().unwrap().total_score, 400);
        assert_eq!(recorded.submitted_at, Some(2_500));
    }

    #[test]
    fn test_malformed_submission_records_nothing_and_allows_retry() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();

        let err = session.submit(alice.id, &[1, 2, 3], 2_500).unwrap_err();
        assert!(matches!(err, GameError::InvalidSubmission(_)));
        assert!(!session.roster.get(alice.id).unwrap().has_submitted());

        // A well-formed retry is accepted.
        let result = session.submit(alice.id, &[2, 1, 3, 4], 2_600).unwrap();
        assert_eq!(result.total_score, 200);
    }

    #[test]
    fn test_join_after_finish_rejected() {
        let mut session = waiting_session();
        session.finish(2_000).unwrap();

        let err = session.join("Late", 2_100, true).unwrap_err();
        assert_eq!(err, GameError::SessionClosed);
        assert!(session.roster.is_empty());
    }

    #[test]
    fn test_late_join_policy() {
        let mut session = waiting_session();
        session.start(2_000).unwrap();

        let err = session.join("Frozen", 2_100, false).unwrap_err();
        assert_eq!(err, GameError::InvalidState { state: "active" });

        session.join("Allowed", 2_200, true).unwrap();
    }

    #[test]
    fn test_finish_from_waiting_is_host_cancel() {
        let mut session = waiting_session();

        session.finish(2_000).unwrap();
        assert_eq!(session.state, SessionState::Finished);
        assert_eq!(session.ended_at, Some(2_000));
    }

    #[test]
    fn test_state_is_monotonic_after_finish() {
        let mut session = waiting_session();
        session.start(2_000).unwrap();
        session.finish(3_000).unwrap();

        assert_eq!(
            session.start(4_000).unwrap_err(),
            GameError::InvalidState { state: "finished" }
        );
        assert_eq!(
            session.finish(4_000).unwrap_err(),
            GameError::InvalidState { state: "finished" }
        );
        assert_eq!(session.state, SessionState::Finished);
        assert_eq!(session.ended_at, Some(3_000));
    }

    #[test]
    fn test_submit_racing_finish_loses() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();
        session.finish(3_000).unwrap();

        let err = session.submit(alice.id, &[1, 2, 3, 4], 3_001).unwrap_err();
        assert_eq!(err, GameError::InvalidState { state: "finished" });
    }

    #[test]
    fn test_leaderboard_orders_by_score_then_time() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        let bob = session.join("Bob", 1_200, true).unwrap();
        let carol = session.join("Carol", 1_300, true).unwrap();
        let dave = session.join("Dave", 1_400, true).unwrap();
        session.start(2_000).unwrap();

        // Bob and Carol tie on score; Bob submitted earlier.
        session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap();
        session.submit(bob.id, &[2, 1, 3, 4], 2_600).unwrap();
        session.submit(carol.id, &[1, 2, 4, 3], 2_700).unwrap();

        let board = session.leaderboard();
        let order: Vec<ParticipantId> = board.iter().map(|e| e.participant_id).collect();

        assert_eq!(order, vec![alice.id, bob.id, carol.id, dave.id]);
        assert_eq!(board[0].score, 400);
        assert_eq!(board[1].score, 200);
        assert_eq!(board[2].score, 200);
        // Dave never submitted and ranks last with zero.
        assert_eq!(board[3].score, 0);
        assert_eq!(board[3].submitted_at, None);
        assert_eq!(
            board.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_kicked_score_retained_under_policy() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();
        session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap();

        session.kick(alice.id).unwrap();

        let board = session.leaderboard();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].score, 400);
    }

    #[test]
    fn test_kicked_score_dropped_without_retention() {
        let mut session = Session::new(
            "AB12CD".to_string(),
            "host-secret".to_string(),
            abcd_quiz(),
            1_000,
            16,
            false,
        );
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();
        session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap();

        session.kick(alice.id).unwrap();

        assert!(session.leaderboard().is_empty());
    }

    #[test]
    fn test_kicked_participant_cannot_submit() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.start(2_000).unwrap();
        session.kick(alice.id).unwrap();

        let err = session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap_err();
        assert_eq!(err, GameError::ParticipantNotFound);
    }

    #[test]
    fn test_kick_after_finish_rejected() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.finish(2_000).unwrap();

        let err = session.kick(alice.id).unwrap_err();
        assert_eq!(err, GameError::InvalidState { state: "finished" });
    }

    #[test]
    fn test_overview_counts_submissions() {
        let mut session = waiting_session();
        let alice = session.join("Alice", 1_100, true).unwrap();
        session.join("Bob", 1_200, true).unwrap();
        session.start(2_000).unwrap();
        session.submit(alice.id, &[1, 2, 3, 4], 2_500).unwrap();

        let overview = session.overview();
        assert_eq!(overview.state, "active");
        assert_eq!(overview.participants, vec!["Alice", "Bob"]);
        assert_eq!(overview.submitted_count, 1);
    }
}
