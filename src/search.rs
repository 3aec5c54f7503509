//! The Search Controller (§4.7): owns the persisted shard tables across
//! phases and drives `start_search` / `continue_search` / `end_search`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::game::GameState;
use crate::job::Job;
use crate::mpsc::Mpsc;
use crate::node::{SearchStyle, UCTNode};
use crate::shard::{owner, ShardTable};
use crate::worker::{Worker, WorkerStatistics};

/// SelectJobs seeded per worker at the start of each phase.
const LOAD_FACTOR: usize = 6;

/// Node-count threshold above which `end_search` runs a GC pass (§4.7).
const GC_THRESHOLD: usize = 200_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub nodes: u64,
    pub nodes_per_sec: f64,
    pub backprops_per_sec: f64,
    pub max_depth: u64,
}

struct RunningSearch<S: GameState> {
    threads: Vec<JoinHandle<Worker<S>>>,
    mpscs: Arc<Vec<Mpsc<Job<S>>>>,
    stop: Arc<AtomicBool>,
}

/// Owns the persisted UCT tree (one shard per worker) across search phases,
/// and coordinates spawning/joining the worker threads for each phase.
pub struct Controller<S: GameState> {
    cores: usize,
    style: SearchStyle,
    /// Present (possibly empty-of-nodes, but `Vec::len() == cores`) whenever
    /// no phase is running; moved out into the workers for the duration of a
    /// phase, so the tree is only ever touched by one side at a time.
    shards: Vec<ShardTable<S::Move>>,
    root_hash: u32,
    running: Option<RunningSearch<S>>,
    stats: Vec<Arc<WorkerStatistics>>,
    phase_start: Instant,
    /// Frozen at `end_search`; read by `statistics()` once idle.
    phase_elapsed: Duration,
}

impl<S: GameState> Controller<S> {
    pub fn new(style: SearchStyle) -> Self {
        Controller {
            cores: 0,
            style,
            shards: Vec::new(),
            root_hash: 0,
            running: None,
            stats: Vec::new(),
            phase_start: Instant::now(),
            phase_elapsed: Duration::ZERO,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Fresh tree. `cores` fixes the shard count for the lifetime of this
    /// controller — `continue_search` reuses it and takes no `cores` arg.
    pub fn start_search(&mut self, root_state: S, cores: usize) {
        assert!(self.running.is_none(), "start_search called while a search is already running");
        assert!(cores > 0, "start_search requires at least one core");

        log::info!("start_search: cores={cores}");
        self.cores = cores;
        self.shards = (0..cores).map(|w| ShardTable::new(w, cores)).collect();
        self.spawn_phase(root_state);
    }

    /// Tree-preserving: spawns a fresh phase of worker threads against the
    /// shard tables left behind by the previous `end_search`.
    pub fn continue_search(&mut self, mut root_state: S) {
        assert!(self.running.is_none(), "continue_search called while a search is already running");
        assert!(!self.shards.is_empty(), "continue_search requires a prior start_search");
        log::info!("continue_search: preserved nodes={}", self.shards.iter().map(ShardTable::node_count).sum::<usize>());

        // transient per-search counters (pieces/attack/lines/opponent) reset
        // for the new phase; the UCT tree itself is left untouched (§4.7).
        root_state.reset_transient_counters();
        self.spawn_phase(root_state);
    }

    fn spawn_phase(&mut self, mut root_state: S) {
        let cores = self.cores;

        let mpscs = Arc::new((0..cores).map(|_| Mpsc::new(cores + 1)).collect::<Vec<_>>());
        let stop = Arc::new(AtomicBool::new(false));
        let stats: Vec<Arc<WorkerStatistics>> = (0..cores).map(|_| Arc::new(WorkerStatistics::default())).collect();
        let clock = Arc::new(Instant::now());

        let root_hash = root_state.hash();
        let root_owner = owner(root_hash, cores);
        self.root_hash = root_hash;

        if self.shards[root_owner].get(root_hash).is_none() {
            self.shards[root_owner].insert_owned(UCTNode::from_state(&root_state));
        }

        // The controller is producer slot `cores` in every worker's inbox.
        for _ in 0..LOAD_FACTOR * cores {
            root_state.reseed_rng();
            root_state.reset_opponent_rng();
            mpscs[root_owner].enqueue(Job::SelectJob { state: root_state.clone(), path: Vec::new() }, cores);
        }

        let shards = std::mem::take(&mut self.shards);
        let mut threads = Vec::with_capacity(cores);

        for (w, shard) in shards.into_iter().enumerate() {
            let mpscs = Arc::clone(&mpscs);
            let stop = Arc::clone(&stop);
            let stat = Arc::clone(&stats[w]);
            let clock = Arc::clone(&clock);
            let style = self.style;
            let private_root = root_state.clone();

            threads.push(std::thread::spawn(move || {
                log::debug!("worker {w} starting");
                let mut worker = Worker::new(w, cores, style, mpscs, stop, stat, clock, private_root, shard);
                worker.run();
                log::debug!("worker {w} stopped, owns {} nodes", worker.node_count());
                worker
            }));
        }

        self.stats = stats;
        self.phase_start = Instant::now();
        self.running = Some(RunningSearch { threads, mpscs, stop });
    }

    /// Stops all workers, reclaims their shards, and runs GC if the tree has
    /// grown past `GC_THRESHOLD` nodes.
    pub fn end_search(&mut self) {
        let running = self.running.take().expect("end_search called without an active search");

        running.stop.store(true, Ordering::Release);
        for w in 0..self.cores {
            running.mpscs[w].enqueue(Job::StopJob, self.cores);
        }

        let mut shards = Vec::with_capacity(self.cores);
        for handle in running.threads {
            let worker = handle.join().expect("worker thread panicked");
            shards.push(worker.into_shard());
        }

        self.phase_elapsed = self.phase_start.elapsed();

        let total_nodes: usize = shards.iter().map(ShardTable::node_count).sum();
        log::info!("end_search: {total_nodes} nodes across {} shards in {:?}", self.cores, self.phase_elapsed);

        if total_nodes > GC_THRESHOLD {
            // Untouched-this-epoch is approximated as "not touched in the
            // second half of the phase" — the engine has no wall-clock
            // concept of epoch boundaries finer than a search phase.
            let cutoff = (self.phase_elapsed.as_millis() / 2) as u32;
            log::debug!("gc pass: {total_nodes} nodes exceed threshold {GC_THRESHOLD}, cutoff={cutoff}ms");
            for shard in &mut shards {
                shard.collect_stale(cutoff);
            }
        }

        self.shards = shards;
    }

    /// Aggregates `WorkerStatistics` against the current (if running) or most
    /// recently completed phase's wall-clock duration.
    pub fn statistics(&self) -> Statistics {
        let elapsed = if self.running.is_some() {
            self.phase_start.elapsed()
        } else {
            self.phase_elapsed
        };

        let nodes: u64 = self.stats.iter().map(|s| s.nodes.load(Ordering::Relaxed)).sum();
        let backprops: u64 = self.stats.iter().map(|s| s.backprop_messages.load(Ordering::Relaxed)).sum();
        let max_depth = self.stats.iter().map(|s| s.deepest_node.load(Ordering::Relaxed)).max().unwrap_or(0);

        let secs = elapsed.as_secs_f64().max(1e-9);
        Statistics {
            nodes,
            nodes_per_sec: nodes as f64 / secs,
            backprops_per_sec: backprops as f64 / secs,
            max_depth,
        }
    }

    /// Greatest visit count at the root, ties by reward then lowest id.
    /// Requires the search to have ended: the shard tables live inside the
    /// worker threads while a phase is running. Falls back to `S::Move`'s
    /// `Default` sentinel when the root has no actions at all (a terminal
    /// root, §8 scenario S3 — "returns any legal move (or a sentinel)").
    pub fn best_move(&self) -> S::Move {
        assert!(self.running.is_none(), "best_move requires an ended search");
        let owner_idx = owner(self.root_hash, self.cores);
        let node = self.shards[owner_idx].get(self.root_hash).expect("root node must exist after a search");
        match node.best_action_index() {
            Some(idx) => node.actions[idx].mv,
            None => Default::default(),
        }
    }

    /// Mean reward of the best action, used by the CLI's `print_strength`.
    /// `0.0` when the root has no actions (terminal root).
    pub fn best_reward(&self) -> f32 {
        assert!(self.running.is_none(), "best_reward requires an ended search");
        let owner_idx = owner(self.root_hash, self.cores);
        let node = self.shards[owner_idx].get(self.root_hash).expect("root node must exist after a search");
        match node.best_action_index() {
            Some(idx) => node.actions[idx].mean_reward(),
            None => 0.0,
        }
    }
}
