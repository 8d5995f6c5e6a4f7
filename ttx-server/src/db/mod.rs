//! Database access layer
//!
//! Persistence adapter over SQLite. Exercises embed their injects and
//! summary phases as JSON columns (they are owned outright and never
//! separately addressable); participants embed their response history the
//! same way. Bulk cursor updates are single conditional UPDATE statements
//! so they stay atomic without row-by-row rewrites.

pub mod exercises;
pub mod facilitators;
pub mod init;
pub mod participants;
