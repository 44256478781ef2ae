//! Courtline
//!
//! Momentum and rally/collapse engine for live basketball betting markets:
//! snapshots the total and spread of every game, measures how they move in
//! pre-game and live windows, projects scoring pace and flags value edges.

pub mod config;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod indicators;
pub mod pace;
pub mod patterns;
pub mod rally;
pub mod snapshot_store;
pub mod sportsbook;
pub mod trend;
pub mod types;
pub mod value;
pub mod window;

pub use config::Config;
pub use engine::{evaluate_all, evaluate_game, GameInput, GamePayload};
pub use snapshot_store::SnapshotStore;
pub use types::*;
