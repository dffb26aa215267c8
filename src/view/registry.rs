//! Per-cgroup state cache.
//!
//! A fixed array of hash buckets, each owning the nodes whose cgroup path
//! hashes into it. Readers scan under the bucket read-lock; inserts and
//! pruning serialize on the write-lock. Each node carries its own mutex,
//! held across an entire read-reconcile-render cycle.
//!
//! Lock order: bucket lock before node mutex, never the reverse, and never
//! two node mutexes at once.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::model::CpuUsage;

/// Number of hash buckets. Fixed by wire compatibility.
pub const CPUVIEW_HASH_SIZE: usize = 100;

/// Minimum wall-clock distance between prunes of the same bucket.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(10);

/// Mutable per-cgroup accounting, guarded by the node mutex.
#[derive(Debug)]
pub struct NodeState {
    /// Reconciled "real" per-CPU accumulator.
    pub usage: Vec<CpuUsage>,
    /// Per-virtual-CPU accumulator rendered to readers.
    pub view: Vec<CpuUsage>,
}

impl NodeState {
    pub(crate) fn new(sample: &[CpuUsage]) -> Self {
        let mut state = Self {
            usage: vec![CpuUsage::default(); sample.len()],
            view: vec![CpuUsage::default(); sample.len()],
        };
        state.rebase(sample);
        state
    }

    /// Current array length; grows on hotplug, never shrinks.
    pub fn cpu_count(&self) -> usize {
        self.usage.len()
    }

    /// Grows both accumulators to `nprocs`, zero-filling the tail.
    pub fn ensure_cpus(&mut self, nprocs: usize) {
        if self.cpu_count() < nprocs {
            self.usage.resize(nprocs, CpuUsage::default());
            self.view.resize(nprocs, CpuUsage::default());
        }
    }

    /// Rebases onto a fresh sample: usage time fields zeroed (so the next
    /// delta is the sample's full accumulated time), online flags taken
    /// from the sample, view zeroed. Used at node creation and when the
    /// cgroup's counters regress.
    pub fn rebase(&mut self, sample: &[CpuUsage]) {
        for (i, slot) in self.usage.iter_mut().enumerate() {
            *slot = CpuUsage {
                online: sample.get(i).is_some_and(|s| s.online),
                ..CpuUsage::default()
            };
        }
        for slot in self.view.iter_mut() {
            *slot = CpuUsage::default();
        }
    }
}

/// One cgroup's entry in the registry.
#[derive(Debug)]
pub struct CgroupNode {
    cg: String,
    state: Mutex<NodeState>,
}

impl CgroupNode {
    fn new(cg: &str, sample: &[CpuUsage]) -> Self {
        Self {
            cg: cg.to_owned(),
            state: Mutex::new(NodeState::new(sample)),
        }
    }

    /// The cgroup path this node belongs to.
    pub fn cg(&self) -> &str {
        &self.cg
    }

    /// Locks the node for a read-reconcile-render cycle. A reader that
    /// panicked mid-cycle must not wedge every later read, so poisoning is
    /// recovered; state mutations keep the vectors consistent at every
    /// intermediate point.
    pub fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct BucketInner {
    nodes: Vec<Arc<CgroupNode>>,
    last_prune: Instant,
}

/// Process-wide cache of per-cgroup nodes.
pub struct StatRegistry {
    buckets: Vec<RwLock<BucketInner>>,
}

impl StatRegistry {
    /// Allocates the bucket array with fresh prune clocks.
    pub fn new() -> Self {
        let now = Instant::now();
        let buckets = (0..CPUVIEW_HASH_SIZE)
            .map(|_| {
                RwLock::new(BucketInner {
                    nodes: Vec::new(),
                    last_prune: now,
                })
            })
            .collect();
        Self { buckets }
    }

    fn bucket(&self, cg: &str) -> &RwLock<BucketInner> {
        let hash = xxh3_64(cg.as_bytes());
        &self.buckets[(hash % CPUVIEW_HASH_SIZE as u64) as usize]
    }

    /// Looks up the node for `cg`, creating it from `sample` on first
    /// sight. On a hit the bucket is opportunistically pruned (rate
    /// limited), with `cgroup_exists` probing whether a chained cgroup is
    /// still alive.
    ///
    /// The returned node is unlocked; callers take the node mutex next
    /// (bucket locks are no longer held at that point) and must re-check
    /// the CPU count under it.
    pub fn find_or_create(
        &self,
        cg: &str,
        sample: &[CpuUsage],
        cgroup_exists: &dyn Fn(&str) -> bool,
    ) -> Arc<CgroupNode> {
        let bucket = self.bucket(cg);

        let found = {
            let inner = bucket.read().unwrap_or_else(|e| e.into_inner());
            inner.nodes.iter().find(|n| n.cg() == cg).cloned()
        };

        if let Some(node) = found {
            self.prune_bucket(bucket, cgroup_exists);
            return node;
        }

        let node = Arc::new(CgroupNode::new(cg, sample));

        let mut inner = bucket.write().unwrap_or_else(|e| e.into_inner());
        // Another reader may have inserted the same cgroup between the
        // read and write locks.
        if let Some(existing) = inner.nodes.iter().find(|n| n.cg() == cg) {
            return Arc::clone(existing);
        }
        debug!(cg, cpu_count = sample.len(), "new stat node");
        inner.nodes.push(Arc::clone(&node));
        node
    }

    fn prune_bucket(&self, bucket: &RwLock<BucketInner>, cgroup_exists: &dyn Fn(&str) -> bool) {
        {
            let inner = bucket.read().unwrap_or_else(|e| e.into_inner());
            if inner.last_prune.elapsed() < PRUNE_INTERVAL {
                return;
            }
        }

        let mut inner = bucket.write().unwrap_or_else(|e| e.into_inner());
        if inner.last_prune.elapsed() < PRUNE_INTERVAL {
            return;
        }

        inner.nodes.retain(|node| {
            let alive = cgroup_exists(node.cg());
            if !alive {
                debug!(cg = node.cg(), "pruning stat node for removed cgroup");
            }
            alive
        });
        inner.last_prune = Instant::now();
    }

    /// Total number of cached nodes, for diagnostics and tests.
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|b| b.read().unwrap_or_else(|e| e.into_inner()).nodes.len())
            .sum()
    }

    /// True when no cgroup has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
