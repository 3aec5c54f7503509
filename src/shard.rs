//! Per-worker shard table: the authoritative `owned` map and a read-only
//! `cache` replica of nodes owned by other workers.

use std::collections::HashMap;

use crate::node::UCTNode;

/// `owner(id) = id mod n`.
pub fn owner(id: u32, n: usize) -> usize {
    (id as usize) % n
}

pub struct ShardTable<M> {
    worker_id: usize,
    n: usize,
    owned: HashMap<u32, UCTNode<M>>,
    cache: HashMap<u32, UCTNode<M>>,
}

impl<M: Clone> ShardTable<M> {
    pub fn new(worker_id: usize, n: usize) -> Self {
        ShardTable {
            worker_id,
            n,
            owned: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    pub fn owns(&self, id: u32) -> bool {
        owner(id, self.n) == self.worker_id
    }

    pub fn contains(&self, id: u32) -> bool {
        self.owned.contains_key(&id) || self.cache.contains_key(&id)
    }

    /// Direct insert into this worker's own shard. Caller must already know
    /// `owns(node.id)` holds (see `dispatcher::maybe_insert`).
    pub fn insert_owned(&mut self, node: UCTNode<M>) {
        debug_assert!(self.owns(node.id), "insert_owned called for a node this worker does not own");
        self.owned.insert(node.id, node);
    }

    /// PutJob handling (§4.6): land in `owned` if we are the owner, else in
    /// the advisory `cache`.
    pub fn insert_from_put_job(&mut self, node: UCTNode<M>) {
        if self.owns(node.id) {
            self.owned.insert(node.id, node);
        } else {
            self.cache.insert(node.id, node);
        }
    }

    /// Returns a mutable reference to the owned node for `id`, materializing
    /// it out of `cache` first if necessary. Panics if this worker is not
    /// the owner and the node is not already present in `owned` — mutating
    /// a node this worker does not own is a programmer error (§7).
    pub fn get_node_mut(&mut self, id: u32) -> &mut UCTNode<M> {
        if !self.owned.contains_key(&id) {
            assert!(
                self.owns(id),
                "worker {} attempted to materialize node {} which it does not own",
                self.worker_id,
                id
            );
            let cached = self
                .cache
                .remove(&id)
                .expect("get_node_mut called for a node absent from both owned and cache");
            self.owned.insert(id, cached);
        }

        self.owned.get_mut(&id).expect("just inserted or already present")
    }

    pub fn node_count(&self) -> usize {
        self.owned.len()
    }

    /// Garbage-collects nodes whose every action was last touched before
    /// `epoch_cutoff_ms`, invoked by the controller at quiescence once the
    /// shard grows past the size threshold (§4.7).
    pub fn collect_stale(&mut self, epoch_cutoff_ms: u32) {
        self.owned.retain(|_, node| {
            node.actions.iter().any(|a| a.last_time >= epoch_cutoff_ms) || node.actions.is_empty()
        });
        self.cache.clear();
    }

    pub fn get(&self, id: u32) -> Option<&UCTNode<M>> {
        self.owned.get(&id).or_else(|| self.cache.get(&id))
    }
}
