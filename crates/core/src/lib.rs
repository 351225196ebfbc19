//! Shared vocabulary for the x-hot batched MCTS engine.
//!
//! This crate holds the types that cross the boundary between the search
//! engine and its orchestrator:
//!
//! - [`Player`] - the side to move, covering play-with-bot and self-play modes
//! - [`ActionSpace`] - the multi-head ("x-hot") action layout and key codec
//! - [`SearchError`] - precondition violations surfaced by the engine

mod error;
mod types;

pub use error::{Result, SearchError};
pub use types::{players_from_batch, ActionSpace, Player};
