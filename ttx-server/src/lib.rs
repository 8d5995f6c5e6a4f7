//! # TTX Coordination Server (ttx-server)
//!
//! Real-time coordination service for live tabletop exercises.
//!
//! **Purpose:** Enforce the inject/phase progression state machine, score
//! participant submissions, and fan state changes out to every connected
//! session over HTTP/SSE.
//!
//! **Architecture:** axum HTTP surface over a per-exercise-serialized
//! progression engine, SQLite persistence via sqlx, and a topic-keyed
//! broadcast gateway for live updates.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod registry;

pub use error::{Error, Result};
