//! Parallel UCT search over a pluggable game state.
//!
//! Workers are sharded by `hash() % N`; every node has exactly one owning
//! worker, and all mutation happens on its job-processing loop. See
//! `search::Controller` for the entry point.

pub mod dispatcher;
pub mod fixtures;
pub mod game;
pub mod job;
pub mod mpsc;
pub mod node;
pub mod ring;
pub mod rng;
pub mod search;
pub mod shard;
pub mod worker;

pub use game::{GameMove, GameState, Opponent};
pub use node::SearchStyle;
pub use search::{Controller, Statistics};
