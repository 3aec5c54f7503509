//! Routes jobs to owner workers, with local-steal fallback for `SelectJob`s.

use crate::game::GameState;
use crate::job::Job;
use crate::mpsc::Mpsc;
use crate::node::UCTNode;
use crate::shard::{owner, ShardTable};

/// If `owner(node.id) == self`, install directly; else enqueue a `PutJob` to
/// the owner.
pub fn maybe_insert<S: GameState>(
    shard: &mut ShardTable<S::Move>,
    mpscs: &[Mpsc<Job<S>>],
    worker_id: usize,
    n: usize,
    node: UCTNode<S::Move>,
) {
    let target = owner(node.id, n);
    if target == worker_id {
        shard.insert_owned(node);
    } else {
        mpscs[target].enqueue(Job::PutJob { node }, worker_id);
    }
}

/// Work-stealing-by-donation (§4.5, §9): if this worker's own flushed queue
/// holds nothing but `StopJob`s, keep the job for itself instead of sending
/// it to `target`. Restricted to `SelectJob`s — see `route_backprop` for why
/// `BackPropJob`s never self-donate.
pub fn maybe_steal<S: GameState>(mpscs: &[Mpsc<Job<S>>], worker_id: usize, target: usize, state: S, path: Vec<crate::node::HashActionPair>) {
    let job = Job::SelectJob { state, path };

    let self_queue_is_idle = mpscs[worker_id].flushed().iter().all(Job::is_stop);

    if self_queue_is_idle {
        mpscs[worker_id].enqueue(job, worker_id);
    } else {
        mpscs[target].enqueue(job, worker_id);
    }
}

/// `BackPropJob`s always route straight to the true owner of the path's new
/// tail. A stolen back-prop would need the stealer to materialize the node
/// locally before it may legally mutate it, which breaks the single-mutator
/// invariant (§4.5, §9 "Work-stealing by donation" open question — this
/// engine takes the safer of the two variants the reference code mixed).
pub fn route_backprop<S: GameState>(mpscs: &[Mpsc<Job<S>>], worker_id: usize, target: usize, job: Job<S>) {
    debug_assert!(matches!(job, Job::BackPropJob { .. }));
    mpscs[target].enqueue(job, worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Action;

    #[derive(Clone)]
    struct DummyOpponent;
    impl crate::game::Opponent for DummyOpponent {
        fn garbage_height(&self) -> u32 {
            0
        }
        fn deaths(&self) -> u32 {
            0
        }
        fn is_dead(&self) -> bool {
            false
        }
    }

    #[derive(Clone)]
    struct DummyState {
        h: u32,
    }
    impl GameState for DummyState {
        type Move = u8;
        type Opponent = DummyOpponent;
        fn hash(&self) -> u32 {
            self.h
        }
        fn is_terminal(&self) -> bool {
            false
        }
        fn evaluate(&self) -> Vec<(u8, f32)> {
            vec![(0, 0.1)]
        }
        fn apply(&mut self, _mv: u8) {}
        fn resolve_chance(&mut self) {}
        fn true_app(&self) -> f32 {
            0.0
        }
        fn opponent(&self) -> &DummyOpponent {
            &DummyOpponent
        }
        fn reseed_rng(&mut self) {}
        fn reset_opponent_rng(&mut self) {}
        fn reset_transient_counters(&mut self) {}
    }

    fn node(id: u32) -> UCTNode<u8> {
        UCTNode {
            id,
            actions: vec![Action { id: 0, mv: 0u8, eval: 0.5, n: 0, r: 0.0, last_time: 0 }],
            n: 0,
            r_buffer: 0.0,
        }
    }

    #[test]
    fn maybe_insert_routes_foreign_node_as_put_job() {
        let mpscs: Vec<Mpsc<Job<DummyState>>> = vec![Mpsc::new(3), Mpsc::new(3)];
        let mut shard: ShardTable<u8> = ShardTable::new(0, 2);

        maybe_insert(&mut shard, &mpscs, 0, 2, node(5)); // 5 % 2 == 1, not owner 0

        assert_eq!(shard.node_count(), 0);
        mpscs[1].flush();
        assert!(matches!(mpscs[1].flushed().first(), Some(Job::PutJob { .. })));
    }

    #[test]
    fn maybe_insert_lands_directly_when_self_owns_it() {
        let mpscs: Vec<Mpsc<Job<DummyState>>> = vec![Mpsc::new(3)];
        let mut shard: ShardTable<u8> = ShardTable::new(0, 1);

        maybe_insert(&mut shard, &mpscs, 0, 1, node(5));

        assert_eq!(shard.node_count(), 1);
    }

    #[test]
    fn maybe_steal_donates_to_self_when_own_queue_only_has_stops() {
        let mpscs: Vec<Mpsc<Job<DummyState>>> = vec![Mpsc::new(3), Mpsc::new(3)];
        mpscs[0].enqueue(Job::StopJob, 0);
        mpscs[0].flush();

        maybe_steal(&mpscs, 0, 1, DummyState { h: 3 }, vec![]);

        mpscs[0].flush();
        let stole_to_self = mpscs[0].flushed().iter().any(|j| matches!(j, Job::SelectJob { .. }));
        assert!(stole_to_self);

        mpscs[1].flush();
        assert!(mpscs[1].flushed().is_empty());
    }

    #[test]
    fn maybe_steal_routes_to_target_when_own_queue_is_busy() {
        let mpscs: Vec<Mpsc<Job<DummyState>>> = vec![Mpsc::new(3), Mpsc::new(3)];
        mpscs[0].enqueue(Job::SelectJob { state: DummyState { h: 1 }, path: vec![] }, 0);
        mpscs[0].flush();

        maybe_steal(&mpscs, 0, 1, DummyState { h: 3 }, vec![]);

        mpscs[1].flush();
        assert_eq!(mpscs[1].flushed().len(), 1);
    }
}
