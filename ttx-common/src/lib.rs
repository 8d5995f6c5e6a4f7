//! # TTX Common Library
//!
//! Shared code for the TTX tabletop-exercise platform:
//! - Domain model (exercises, injects, phases, participants, responses)
//! - Event types (ExerciseEvent enum) broadcast to live sessions
//! - Scoring engine (pure, deterministic)

pub mod events;
pub mod models;
pub mod scoring;

pub use events::ExerciseEvent;
pub use models::{Answer, Magnitude, QuestionType};
pub use scoring::{score, ScoreOutcome};
