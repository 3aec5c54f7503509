//! The four message kinds that hop between worker queues.

use crate::game::GameState;
use crate::node::{HashActionPair, UCTNode};

pub enum Job<S: GameState> {
    /// Descend from `state` at depth `path.len()`.
    SelectJob { state: S, path: Vec<HashActionPair> },
    /// Apply `reward` to `path.last()`, pop, forward.
    BackPropJob {
        state: S,
        path: Vec<HashActionPair>,
        reward: f32,
        depth: u32,
    },
    /// Install a copied node into the recipient's shard.
    PutJob { node: UCTNode<S::Move> },
    /// Terminate the worker loop.
    StopJob,
}

impl<S: GameState> Job<S> {
    pub fn is_stop(&self) -> bool {
        matches!(self, Job::StopJob)
    }
}
