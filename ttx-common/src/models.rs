//! Domain model for TTX exercises
//!
//! An exercise owns an ordered list of injects; each inject carries
//! narrative artifacts plus an ordered list of decision phases. Participants
//! are separate top-level entities that reference their exercise and own
//! their response history outright.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exercise lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

impl ExerciseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseStatus::Draft => "draft",
            ExerciseStatus::Active => "active",
            ExerciseStatus::Completed => "completed",
            ExerciseStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ExerciseStatus::Draft),
            "active" => Some(ExerciseStatus::Active),
            "completed" => Some(ExerciseStatus::Completed),
            "archived" => Some(ExerciseStatus::Archived),
            _ => None,
        }
    }

    /// Participants may only join while the exercise is being staged or run.
    pub fn joinable(&self) -> bool {
        matches!(self, ExerciseStatus::Draft | ExerciseStatus::Active)
    }
}

impl std::fmt::Display for ExerciseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant lifecycle status
///
/// `Left` is a liveness signal set on connection loss, not a terminal
/// state; reconnection restores `Active`. Only explicit facilitator
/// action removes a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Waiting,
    Active,
    Completed,
    Left,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Waiting => "waiting",
            ParticipantStatus::Active => "active",
            ParticipantStatus::Completed => "completed",
            ParticipantStatus::Left => "left",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(ParticipantStatus::Waiting),
            "active" => Some(ParticipantStatus::Active),
            "completed" => Some(ParticipantStatus::Completed),
            "left" => Some(ParticipantStatus::Left),
            _ => None,
        }
    }

    /// Statuses that count against the exercise capacity limit.
    pub fn counts_toward_capacity(&self) -> bool {
        matches!(self, ParticipantStatus::Waiting | ParticipantStatus::Active)
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Question type for a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Exactly one option id expected
    Single,
    /// A set of option ids expected
    Multiple,
    /// Free text, no correctness evaluation
    Text,
}

/// Closed 5-value ordinal effectiveness rating, least to most effective.
///
/// Declaration order is the ordinal order; the derived `Ord` reflects it.
/// Wire strings match the original exercise content format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    LeastEffective,
    SomewhatEffective,
    NotEffective,
    Effective,
    MostEffective,
}

impl Magnitude {
    /// Aggregate verdict for a multiple-choice answer, derived from the
    /// summed option points (fixed thresholds, not per-option magnitudes).
    pub fn from_points(points: i64) -> Self {
        if points >= 9 {
            Magnitude::MostEffective
        } else if points >= 7 {
            Magnitude::Effective
        } else if points >= 5 {
            Magnitude::NotEffective
        } else if points >= 2 {
            Magnitude::SomewhatEffective
        } else {
            Magnitude::LeastEffective
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Magnitude::LeastEffective => "least_effective",
            Magnitude::SomewhatEffective => "somewhat_effective",
            Magnitude::NotEffective => "not_effective",
            Magnitude::Effective => "effective",
            Magnitude::MostEffective => "most_effective",
        }
    }
}

impl std::fmt::Display for Magnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submitted answer payload
///
/// Single-choice and free-text answers arrive as a bare string, multiple
/// choice as an array of option ids. The question type decides how the
/// payload is interpreted; a mismatched shape scores zero rather than
/// erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    One(String),
    Many(Vec<String>),
}

/// Evidence blob category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Log,
    Alert,
    Network,
    Screenshot,
    Document,
    Other,
}

impl Default for ArtifactKind {
    fn default() -> Self {
        ArtifactKind::Log
    }
}

/// Opaque evidence attached to an inject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    #[serde(default)]
    pub kind: ArtifactKind,
    pub content: String,
    /// Free-form annotations (source, severity, event ids) — not
    /// interpreted by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One selectable option on a single/multiple choice phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default = "default_magnitude")]
    pub magnitude: Magnitude,
}

fn default_magnitude() -> Magnitude {
    Magnitude::LeastEffective
}

/// One decision question inside an inject
///
/// Phase numbers are dense 1..M within their inject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub phase_number: u32,
    pub phase_name: String,
    pub question: String,
    #[serde(default = "default_question_type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    /// Facilitator reveal only; never consulted by scoring.
    #[serde(default)]
    pub correct_answer: Vec<String>,
    /// Flat score for `text` phases (defaults to 5 when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_points: Option<i64>,
}

fn default_question_type() -> QuestionType {
    QuestionType::Single
}

/// A scripted scenario event released to participants
///
/// Inject numbers are dense 1..N within their exercise and are renumbered
/// on deletion to keep the range contiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inject {
    pub inject_number: u32,
    pub title: String,
    pub narrative: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub release_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub responses_open: bool,
    #[serde(default)]
    pub phase_progression_locked: bool,
}

impl Inject {
    /// Reset lifecycle flags back to the unreleased state.
    pub fn reset_state(&mut self) {
        self.is_active = false;
        self.release_time = None;
        self.responses_open = false;
        self.phase_progression_locked = false;
    }
}

/// Presentation-only wrap-up phase shown after the exercise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPhase {
    pub phase_number: u32,
    pub title: String,
    pub description: String,
}

/// A live tabletop exercise owned by one facilitator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub facilitator: Uuid,
    /// Short human-entered join token, stored uppercased.
    pub access_code: String,
    pub status: ExerciseStatus,
    pub max_participants: u32,
    #[serde(default)]
    pub injects: Vec<Inject>,
    #[serde(default)]
    pub summary: Vec<SummaryPhase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exercise {
    pub fn inject(&self, inject_number: u32) -> Option<&Inject> {
        self.injects.iter().find(|i| i.inject_number == inject_number)
    }

    pub fn inject_mut(&mut self, inject_number: u32) -> Option<&mut Inject> {
        self.injects.iter_mut().find(|i| i.inject_number == inject_number)
    }

    /// Next dense inject number for an append.
    pub fn next_inject_number(&self) -> u32 {
        self.injects.len() as u32 + 1
    }

    /// Restore the dense 1..N numbering after a removal, preserving the
    /// prior relative order.
    pub fn renumber_injects(&mut self) {
        for (index, inject) in self.injects.iter_mut().enumerate() {
            inject.inject_number = index as u32 + 1;
        }
    }
}

/// One recorded answer
///
/// At most one response exists per participant per
/// (inject_number, phase_number, question_index) triple; submissions are
/// immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub inject_number: u32,
    pub phase_number: u32,
    pub question_index: u32,
    pub answer: Answer,
    pub points_earned: i64,
    pub magnitude: Magnitude,
    pub submitted_at: DateTime<Utc>,
}

/// A joined participant, durable across reconnects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub participant_id: Uuid,
    pub name: String,
    pub team: String,
    pub exercise_id: Uuid,
    pub status: ParticipantStatus,
    pub current_inject: u32,
    pub current_phase: u32,
    #[serde(default)]
    pub responses: Vec<Response>,
    pub total_score: i64,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Participant {
    pub fn new(exercise_id: Uuid, name: String, team: String) -> Self {
        let now = Utc::now();
        Self {
            participant_id: Uuid::new_v4(),
            name,
            team,
            exercise_id,
            status: ParticipantStatus::Waiting,
            current_inject: 1,
            current_phase: 1,
            responses: Vec::new(),
            total_score: 0,
            joined_at: now,
            last_activity: now,
        }
    }

    pub fn response(
        &self,
        inject_number: u32,
        phase_number: u32,
        question_index: u32,
    ) -> Option<&Response> {
        self.responses.iter().find(|r| {
            r.inject_number == inject_number
                && r.phase_number == phase_number
                && r.question_index == question_index
        })
    }

    /// Full recomputation of the cumulative score from the recorded
    /// responses (used after partial resets, never a delta subtraction).
    pub fn recompute_total_score(&mut self) {
        self.total_score = self.responses.iter().map(|r| r.points_earned).sum();
    }

    /// Roster-facing projection used in broadcast events.
    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            participant_id: self.participant_id,
            name: self.name.clone(),
            team: self.team.clone(),
            status: self.status,
            current_inject: self.current_inject,
            total_score: self.total_score,
        }
    }
}

/// Compact participant view for roster events and leaderboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_id: Uuid,
    pub name: String,
    pub team: String,
    pub status: ParticipantStatus,
    pub current_inject: u32,
    pub total_score: i64,
}
