//! Contract the search core expects from the external game engine.
//!
//! The board, piece queue and evaluation heuristic for the falling-block
//! game itself live outside this crate; the search is written against this
//! trait so any engine that can answer these questions can be plugged in.

/// A single legal move identifier. Opaque to the search core.
///
/// `Default` supplies the sentinel `best_move` falls back to when the root
/// node has no actions at all (a terminal root, §8 scenario S3).
pub trait GameMove: Copy + Eq + Default + Send + 'static {}

impl<T: Copy + Eq + Default + Send + 'static> GameMove for T {}

/// Per-opponent counters consulted by the rollout formula (§4.4).
pub trait Opponent {
    fn garbage_height(&self) -> u32;
    fn deaths(&self) -> u32;
    fn is_dead(&self) -> bool;
}

/// One side's view of the match: board, piece queue, RNG, counters.
///
/// Implementations are value types: `Clone` must be cheap, since a copy
/// travels inside every `SelectJob` and `BackPropJob`.
pub trait GameState: Clone + Send + 'static {
    type Move: GameMove;
    type Opponent: Opponent;

    /// Identifies this state for shard ownership (`owner(id) = hash() % N`).
    fn hash(&self) -> u32;

    fn is_terminal(&self) -> bool;

    /// The evaluator oracle: legal moves paired with the static evaluation
    /// score used as both an MCTS prior and the rollout's `max_eval` term.
    fn evaluate(&self) -> Vec<(Self::Move, f32)>;

    fn apply(&mut self, mv: Self::Move);

    /// Resolves any chance element (e.g. drawing the next piece) after `apply`.
    fn resolve_chance(&mut self);

    /// True attack/points produced by the most recent move, used in rollouts.
    fn true_app(&self) -> f32;

    fn opponent(&self) -> &Self::Opponent;

    /// Re-seeds this state's own RNG; called each time a traversal completes
    /// and the root is about to be re-emitted as a fresh `SelectJob` (§9).
    fn reseed_rng(&mut self);

    /// Resets the opponent-facing RNG the same way, used alongside `reseed_rng`.
    fn reset_opponent_rng(&mut self);

    /// Zeroes the transient per-search counters (pieces placed, attack,
    /// lines, opponent state) so `continue_search` starts the new phase from
    /// a clean slate while keeping the preserved UCT tree (§4.7).
    fn reset_transient_counters(&mut self);
}
