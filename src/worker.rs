//! Worker loop: pulls jobs, performs selection / rollout / backprop, emits
//! new jobs (§4.6).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::dispatcher::{maybe_insert, maybe_steal, route_backprop};
use crate::game::{GameState, Opponent};
use crate::job::Job;
use crate::mpsc::Mpsc;
use crate::node::{HashActionPair, SearchStyle, UCTNode};
use crate::rng::Rng;
use crate::shard::{owner, ShardTable};

/// Monotonic per-worker counters, aggregated by the controller (§3).
#[derive(Default)]
pub struct WorkerStatistics {
    pub nodes: AtomicU64,
    pub backprop_messages: AtomicU64,
    pub deepest_node: AtomicU64,
}

impl WorkerStatistics {
    pub fn bump_deepest(&self, depth: u64) {
        self.deepest_node.fetch_max(depth, Ordering::Relaxed);
    }
}

pub struct Worker<S: GameState> {
    worker_id: usize,
    n: usize,
    style: SearchStyle,
    shard: ShardTable<S::Move>,
    mpscs: Arc<Vec<Mpsc<Job<S>>>>,
    stop: Arc<AtomicBool>,
    stats: Arc<WorkerStatistics>,
    clock: Arc<Instant>,
    sor_rng: Rng,
    /// This worker's own private copy of the root state, reseeded and
    /// re-enqueued whenever one of its traversals' paths empties (§5, §9).
    root_state: S,
}

impl<S: GameState> Worker<S> {
    /// Takes ownership of an existing `ShardTable` rather than building one,
    /// so `continue_search` can hand a worker its preserved subtree back
    /// (§4.7 "tree-preserving").
    pub fn new(
        worker_id: usize,
        n: usize,
        style: SearchStyle,
        mpscs: Arc<Vec<Mpsc<Job<S>>>>,
        stop: Arc<AtomicBool>,
        stats: Arc<WorkerStatistics>,
        clock: Arc<Instant>,
        root_state: S,
        shard: ShardTable<S::Move>,
    ) -> Self {
        Worker {
            worker_id,
            n,
            style,
            shard,
            mpscs,
            stop,
            stats,
            clock,
            sor_rng: Rng::new(0x9E3779B97F4A7C15 ^ (worker_id as u64 + 1)),
            root_state,
        }
    }

    fn now_ms(&self) -> u32 {
        self.clock.elapsed().as_millis() as u32
    }

    fn mpsc(&self) -> &Mpsc<Job<S>> {
        &self.mpscs[self.worker_id]
    }

    pub fn node_count(&self) -> usize {
        self.shard.node_count()
    }

    pub fn into_shard(self) -> ShardTable<S::Move> {
        self.shard
    }

    pub fn shard(&self) -> &ShardTable<S::Move> {
        &self.shard
    }

    pub fn shard_mut(&mut self) -> &mut ShardTable<S::Move> {
        &mut self.shard
    }

    /// Runs until a `StopJob` is dequeued or the shared stop token trips.
    pub fn run(&mut self) {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return;
            }

            let job = self.mpsc().dequeue();

            if job.is_stop() {
                return;
            }

            self.process(job);
        }
    }

    fn process(&mut self, job: Job<S>) {
        match job {
            Job::PutJob { node } => self.shard.insert_from_put_job(node),
            Job::SelectJob { state, path } => self.handle_select(state, path),
            Job::BackPropJob { state, path, reward, depth } => self.handle_backprop(state, path, reward, depth),
            Job::StopJob => {}
        }
    }

    fn handle_select(&mut self, mut state: S, mut path: Vec<HashActionPair>) {
        self.stats.nodes.fetch_add(1, Ordering::Relaxed);

        if state.is_terminal() {
            let depth = path.len() as u32;
            let reward = self.rollout(&state);

            if path.is_empty() {
                // root is a leaf; no learning possible (§7).
                return;
            }

            let parent_hash = path.last().expect("checked non-empty").hash;
            let parent_owner = owner(parent_hash, self.n);

            let job = Job::BackPropJob { state, path, reward, depth };
            route_backprop(&self.mpscs, self.worker_id, parent_owner, job);
            return;
        }

        let hash = state.hash();

        if self.shard.contains(hash) {
            let now = self.now_ms();
            let depth = path.len() as u32;

            let node = self.shard.get_node_mut(hash);
            let action_idx = match self.style {
                SearchStyle::Nana => node.select(depth),
                SearchStyle::Cc => node.select_sor(&mut self.sor_rng),
            };
            node.apply_virtual_loss(action_idx, now);
            let action_id = node.actions[action_idx].id;
            let mv = node.actions[action_idx].mv;

            state.apply(mv);
            state.resolve_chance();

            path.push(HashActionPair { hash, action_id });
            self.stats.bump_deepest(path.len() as u64);

            let new_owner = owner(state.hash(), self.n);
            maybe_steal(&self.mpscs, self.worker_id, new_owner, state, path);
        } else {
            let depth = path.len() as u32;
            let reward = self.rollout(&state);

            let parent_hash = path.last().expect("unexpanded non-root state must have a path").hash;
            let parent_owner = owner(parent_hash, self.n);

            let job = Job::BackPropJob { state, path, reward, depth };
            route_backprop(&self.mpscs, self.worker_id, parent_owner, job);
        }
    }

    fn handle_backprop(&mut self, state: S, mut path: Vec<HashActionPair>, mut reward: f32, depth: u32) {
        self.stats.backprop_messages.fetch_add(1, Ordering::Relaxed);

        let tail = *path.last().expect("BackPropJob must carry a non-empty path");
        let node = self.shard.get_node_mut(tail.hash);
        let action_idx = node.action_index_by_id(tail.action_id);
        node.apply_reward(action_idx, reward, self.style);

        path.pop();

        if path.is_empty() {
            self.root_state.reset_opponent_rng();
            self.root_state.reseed_rng();

            let select_job = Job::SelectJob { state: self.root_state.clone(), path: vec![] };
            self.mpsc().enqueue(select_job, self.worker_id);
            return;
        }

        reward += node.r_buffer;
        node.r_buffer = 0.0;

        let new_tail = path.last().expect("checked non-empty").hash;
        let parent_owner = owner(new_tail, self.n);

        let job = Job::BackPropJob { state, path, reward, depth };
        route_backprop(&self.mpscs, self.worker_id, parent_owner, job);
    }

    /// Leaf evaluation (§4.4).
    fn rollout(&mut self, state: &S) -> f32 {
        if state.is_terminal() {
            return 0.0;
        }

        let node = UCTNode::from_state(state);
        let max_eval = node.max_eval();

        maybe_insert(&mut self.shard, &self.mpscs, self.worker_id, self.n, node);

        let mut reward = state.true_app() / 3.0 + max_eval / 2.0;

        let opponent = state.opponent();
        if opponent.garbage_height() > 15 {
            reward += opponent.garbage_height() as f32 / 20.0;
        }
        reward += opponent.deaths() as f32 / 3.0;

        if opponent.is_dead() {
            reward = 1.0;
        }

        reward.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Clone)]
    struct CountingOpponent {
        garbage: u32,
        deaths: u32,
        dead: bool,
    }
    impl Opponent for CountingOpponent {
        fn garbage_height(&self) -> u32 {
            self.garbage
        }
        fn deaths(&self) -> u32 {
            self.deaths
        }
        fn is_dead(&self) -> bool {
            self.dead
        }
    }

    #[derive(Clone)]
    struct LinearState {
        depth: u32,
        max_depth: u32,
        opponent: CountingOpponent,
    }

    impl GameState for LinearState {
        type Move = u8;
        type Opponent = CountingOpponent;

        fn hash(&self) -> u32 {
            self.depth
        }
        fn is_terminal(&self) -> bool {
            self.depth >= self.max_depth
        }
        fn evaluate(&self) -> Vec<(u8, f32)> {
            vec![(0, 0.3), (1, 0.6)]
        }
        fn apply(&mut self, _mv: u8) {
            self.depth += 1;
        }
        fn resolve_chance(&mut self) {}
        fn true_app(&self) -> f32 {
            0.3
        }
        fn opponent(&self) -> &CountingOpponent {
            &self.opponent
        }
        fn reseed_rng(&mut self) {}
        fn reset_opponent_rng(&mut self) {}
        fn reset_transient_counters(&mut self) {
            self.depth = 0;
        }
    }

    fn single_worker(style: SearchStyle) -> Worker<LinearState> {
        let mpscs = Arc::new(vec![Mpsc::new(2)]);
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(WorkerStatistics::default());
        let clock = Arc::new(Instant::now());
        let root = LinearState {
            depth: 0,
            max_depth: 3,
            opponent: CountingOpponent { garbage: 0, deaths: 0, dead: false },
        };
        Worker::new(0, 1, style, mpscs, stop, stats, clock, root, ShardTable::new(0, 1))
    }

    #[test]
    fn single_core_select_job_expands_root_and_reroutes_to_self() {
        let mut worker = single_worker(SearchStyle::Nana);
        // `start_search` pre-populates the root node before seeding jobs (§4.7).
        worker.shard.insert_owned(UCTNode::from_state(&worker.root_state.clone()));

        worker.mpsc().enqueue(Job::SelectJob { state: worker.root_state.clone(), path: vec![] }, 0);

        let job = worker.mpsc().dequeue();
        worker.process(job);

        assert_eq!(worker.node_count(), 1, "root node stays the only node after one descent + virtual loss");
        worker.mpsc().flush();
        assert!(!worker.mpsc().flushed().is_empty(), "a follow-up job must have been enqueued to self");
    }

    #[test]
    fn rollout_clamps_reward_to_one_when_opponent_is_dead() {
        let mut worker = single_worker(SearchStyle::Nana);
        let mut state = worker.root_state.clone();
        state.opponent.dead = true;

        let reward = worker.rollout(&state);
        assert_eq!(reward, 1.0);
    }

    #[test]
    fn rollout_returns_zero_for_terminal_state() {
        let mut worker = single_worker(SearchStyle::Nana);
        let mut state = worker.root_state.clone();
        state.depth = state.max_depth;

        assert_eq!(worker.rollout(&state), 0.0);
    }

    #[test]
    fn backprop_with_empty_path_reseeds_root_and_requeues_to_self() {
        let mut worker = single_worker(SearchStyle::Nana);

        // materialize the root node so a BackProp targeting it is legal.
        let node = UCTNode::from_state(&worker.root_state.clone());
        worker.shard.insert_owned(node);

        let path = vec![HashActionPair { hash: 0, action_id: 0 }];
        worker.handle_backprop(worker.root_state.clone(), path, 0.5, 0);

        worker.mpsc().flush();
        let job = worker.mpsc().flushed().first().expect("reseed must requeue a SelectJob");
        assert!(matches!(job, Job::SelectJob { path, .. } if path.is_empty()));
    }
}
