//! Scoring engine
//!
//! Pure, deterministic mapping from a phase definition plus a submitted
//! answer to earned points and an effectiveness magnitude. Never errors:
//! unknown option ids and mismatched answer shapes are valid zero-value
//! outcomes, not faults.

use std::collections::HashSet;

use crate::models::{Answer, Magnitude, Phase, QuestionType};

/// Flat score for free-text phases that do not declare `max_points`.
const DEFAULT_TEXT_POINTS: i64 = 5;

/// Result of scoring one submitted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub points: i64,
    pub magnitude: Magnitude,
}

impl Default for ScoreOutcome {
    fn default() -> Self {
        Self {
            points: 0,
            magnitude: Magnitude::LeastEffective,
        }
    }
}

/// Score a submitted answer against its phase definition.
///
/// - `single`: the matching option's points and magnitude; an unknown id
///   (or an array payload) scores `(0, least_effective)`.
/// - `multiple`: option ids are deduplicated, points summed across
///   matches (unmatched ids contribute zero), and the aggregate magnitude
///   derived from the sum via fixed thresholds.
/// - `text`: always `(max_points or 5, not_effective)` — free text is a
///   flat, low-confidence score pending facilitator discussion.
pub fn score(phase: &Phase, answer: &Answer) -> ScoreOutcome {
    match phase.question_type {
        QuestionType::Single => match answer {
            Answer::One(id) => phase
                .options
                .iter()
                .find(|option| option.id == *id)
                .map(|option| ScoreOutcome {
                    points: option.points,
                    magnitude: option.magnitude,
                })
                .unwrap_or_default(),
            Answer::Many(_) => ScoreOutcome::default(),
        },
        QuestionType::Multiple => match answer {
            Answer::Many(ids) => {
                let selected: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let points: i64 = phase
                    .options
                    .iter()
                    .filter(|option| selected.contains(option.id.as_str()))
                    .map(|option| option.points)
                    .sum();
                ScoreOutcome {
                    points,
                    magnitude: Magnitude::from_points(points),
                }
            }
            Answer::One(_) => ScoreOutcome::default(),
        },
        QuestionType::Text => ScoreOutcome {
            points: phase.max_points.unwrap_or(DEFAULT_TEXT_POINTS),
            magnitude: Magnitude::NotEffective,
        },
    }
}
