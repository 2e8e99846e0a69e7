//! Statistics store for deskbot
//!
//! SQLite-backed action log and user profiles with:
//! - Schema migrations
//! - Repository pattern for queries and rollups
//! - Insert-or-replace daily snapshots

pub mod repo;
pub mod schema;

pub use repo::{Database, DailyStatsSnapshot, PeriodStats, TopUser, UserStats};
