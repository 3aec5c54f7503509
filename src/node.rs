//! UCT node/action statistics and selection (NANA vs CC search styles).

use crate::game::GameState;
use crate::rng::Rng;

/// Runtime-selected search style (§9 "NANA vs CC" — the reference engine
/// picked this at compile time; here it is one enum read once at
/// `start_search` since the branch is negligible next to a rollout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStyle {
    /// Sum-style reward accumulation, mean reported; selection via UCB.
    Nana,
    /// Max-style reward accumulation; selection via stochastic optimistic
    /// sampling weighted by `R`.
    Cc,
}

/// One legal move out of a node, with its running MCTS statistics.
#[derive(Debug, Clone)]
pub struct Action<M> {
    pub id: u16,
    pub mv: M,
    pub eval: f32,
    /// Visit count. Incremented as virtual loss on descent, never decremented.
    pub n: u32,
    /// Accumulated reward: sum (NANA) or running max (CC).
    pub r: f32,
    pub last_time: u32,
}

impl<M> Action<M> {
    pub fn mean_reward(&self) -> f32 {
        if self.n == 0 {
            0.0
        } else {
            self.r / self.n as f32
        }
    }
}

/// `(hash, action_id)`, the unit a traversal path is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashActionPair {
    pub hash: u32,
    pub action_id: u16,
}

const EXPLORATION_BASE: f32 = 1.4;
const DEPTH_DECAY: f32 = 0.02;
const EVAL_WEIGHT: f32 = 0.5;
const SOR_EPS: f32 = 1e-4;

/// Statistics and actions for one game state.
#[derive(Debug, Clone)]
pub struct UCTNode<M> {
    pub id: u32,
    pub actions: Vec<Action<M>>,
    pub n: u32,
    /// Deferred rewards stashed for an alternate back-prop policy (unused by
    /// the two shipped search styles but drained on every back-prop hop).
    pub r_buffer: f32,
}

impl<M> UCTNode<M> {
    /// Builds a fresh node from a state's evaluator output. Actions are kept
    /// sorted by id ascending so `select`'s tie-break ("lowest id wins") is a
    /// side effect of iteration order rather than a separate comparison.
    pub fn from_state<S>(state: &S) -> Self
    where
        S: GameState<Move = M>,
    {
        let mut actions: Vec<Action<M>> = state
            .evaluate()
            .into_iter()
            .enumerate()
            .map(|(idx, (mv, eval))| Action {
                id: idx as u16,
                mv,
                eval,
                n: 0,
                r: 0.0,
                last_time: 0,
            })
            .collect();
        actions.sort_by_key(|a| a.id);

        UCTNode {
            id: state.hash(),
            actions,
            n: 0,
            r_buffer: 0.0,
        }
    }

    pub fn max_eval(&self) -> f32 {
        self.actions.iter().map(|a| a.eval).fold(0.0, f32::max)
    }

    /// NANA-style selection: UCB1 blended with the evaluator's static score,
    /// with an exploration term that decays with depth (deeper nodes have
    /// already been explored more broadly higher up the tree). Ties broken
    /// by lowest `action.id` via the `>` comparison below (first max wins,
    /// and `actions` is kept sorted ascending by id).
    pub fn select(&self, depth: u32) -> usize {
        let log_n = (self.n.max(1) as f32).ln();
        let exploration_const = EXPLORATION_BASE / (1.0 + depth as f32 * DEPTH_DECAY);

        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, action) in self.actions.iter().enumerate() {
            let exploitation = action.mean_reward() + EVAL_WEIGHT * action.eval;
            let exploration = exploration_const * (log_n / (action.n as f32 + 1.0)).sqrt();
            let score = exploitation + exploration;

            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        best_idx
    }

    /// CC-style selection: stochastic optimistic sampling, weighted by `R`
    /// (falling back to the evaluator's prior for actions never backed up
    /// yet, so cold arms are not permanently starved).
    pub fn select_sor(&self, rng: &mut Rng) -> usize {
        let weights: Vec<f32> = self
            .actions
            .iter()
            .map(|a| if a.n == 0 { a.eval.max(SOR_EPS) } else { a.r.max(SOR_EPS) })
            .collect();

        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return 0;
        }

        let mut roll = rng.gen_f32() * total;
        for (idx, w) in weights.iter().enumerate() {
            if roll < *w {
                return idx;
            }
            roll -= w;
        }
        weights.len() - 1
    }

    /// Applies virtual loss for the action chosen by `select`/`select_sor`.
    pub fn apply_virtual_loss(&mut self, action_idx: usize, now: u32) {
        self.n += 1;
        self.actions[action_idx].n += 1;
        self.actions[action_idx].last_time = now;
    }

    /// Applies a back-propagated reward per the active search style.
    pub fn apply_reward(&mut self, action_idx: usize, reward: f32, style: SearchStyle) {
        match style {
            SearchStyle::Nana => self.actions[action_idx].r += reward,
            SearchStyle::Cc => {
                if reward > self.actions[action_idx].r {
                    self.actions[action_idx].r = reward;
                }
            }
        }
    }

    /// `best_move` policy (§4.7): greatest visit count, ties by reward, then
    /// by lowest id. `None` when this node has no actions at all (a
    /// terminal root, §8 scenario S3), since there is then nothing to pick.
    pub fn best_action_index(&self) -> Option<usize> {
        if self.actions.is_empty() {
            return None;
        }

        let mut best_idx = 0;
        for (idx, action) in self.actions.iter().enumerate().skip(1) {
            let best = &self.actions[best_idx];
            let better = action.n > best.n
                || (action.n == best.n && action.mean_reward() > best.mean_reward())
                || (action.n == best.n && action.mean_reward() == best.mean_reward() && action.id < best.id);
            if better {
                best_idx = idx;
            }
        }
        Some(best_idx)
    }

    pub fn action_index_by_id(&self, action_id: u16) -> usize {
        self.actions
            .iter()
            .position(|a| a.id == action_id)
            .expect("action id must exist in this node")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(evals: &[f32]) -> UCTNode<u8> {
        let actions = evals
            .iter()
            .enumerate()
            .map(|(idx, &eval)| Action {
                id: idx as u16,
                mv: idx as u8,
                eval,
                n: 0,
                r: 0.0,
                last_time: 0,
            })
            .collect();

        UCTNode { id: 0, actions, n: 0, r_buffer: 0.0 }
    }

    #[test]
    fn select_breaks_ties_toward_lowest_id() {
        let node = node_with(&[0.5, 0.5, 0.5]);
        assert_eq!(node.select(0), 0);
    }

    #[test]
    fn select_prefers_higher_eval_when_unvisited() {
        let node = node_with(&[0.1, 0.9, 0.2]);
        assert_eq!(node.select(0), 1);
    }

    #[test]
    fn virtual_loss_increments_node_and_action_counts() {
        let mut node = node_with(&[0.5, 0.5]);
        node.apply_virtual_loss(1, 10);
        assert_eq!(node.n, 1);
        assert_eq!(node.actions[1].n, 1);
        assert_eq!(node.actions[0].n, 0);
        assert_eq!(node.actions[1].last_time, 10);
    }

    #[test]
    fn nana_reward_accumulates() {
        let mut node = node_with(&[0.5, 0.5]);
        node.apply_reward(0, 0.3, SearchStyle::Nana);
        node.apply_reward(0, 0.4, SearchStyle::Nana);
        assert!((node.actions[0].r - 0.7).abs() < 1e-6);
    }

    #[test]
    fn cc_reward_takes_max() {
        let mut node = node_with(&[0.5, 0.5]);
        node.apply_reward(0, 0.3, SearchStyle::Cc);
        node.apply_reward(0, 0.1, SearchStyle::Cc);
        assert!((node.actions[0].r - 0.3).abs() < 1e-6);
    }

    #[test]
    fn best_action_prefers_visit_count_then_reward_then_id() {
        let mut node = node_with(&[0.0, 0.0, 0.0]);
        node.actions[0].n = 5;
        node.actions[0].r = 1.0;
        node.actions[1].n = 10;
        node.actions[1].r = 2.0;
        node.actions[2].n = 10;
        node.actions[2].r = 2.0;

        // action 1 and 2 tie on N and mean reward; lowest id (1) wins.
        assert_eq!(node.best_action_index(), Some(1));
    }

    #[test]
    fn best_action_index_is_none_for_an_actionless_node() {
        let node = node_with(&[]);
        assert_eq!(node.best_action_index(), None);
    }

    #[test]
    fn select_sor_only_returns_valid_indices() {
        let node = node_with(&[0.2, 0.4, 0.1]);
        let mut rng = Rng::new(1);
        for _ in 0..50 {
            let idx = node.select_sor(&mut rng);
            assert!(idx < node.actions.len());
        }
    }
}
