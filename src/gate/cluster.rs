//! In-process cluster of wall members joined by a blocking all-reduce.
//!
//! Each member is meant to run on its own thread, standing in for one wall
//! process. Used to run multi-screen walls inside one binary and to test the
//! agreement protocol.

use std::sync::{Arc, Barrier, Mutex, PoisonError};

use tracing::trace;

use super::{FrameVersionGate, ReduceOp};

/// Accumulator for one reduction round, tagged with the round it belongs to.
#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    round: u64,
    value: Option<u64>,
}

#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    // Alternating slots: round r uses slots[r % 2]. A member can only start
    // round r + 2 after everyone has finished reading round r.
    slots: Mutex<[Slot; 2]>,
}

/// Factory for the members of an in-process cluster.
pub struct ThreadCluster;

impl ThreadCluster {
    /// Create `size` connected members. `size` is clamped to at least one.
    pub fn new(size: usize) -> Vec<ClusterGate> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            barrier: Barrier::new(size),
            slots: Mutex::new([Slot::default(); 2]),
        });
        (0..size)
            .map(|rank| ClusterGate { rank, size, round: 0, shared: Arc::clone(&shared) })
            .collect()
    }
}

/// One member of a [`ThreadCluster`].
///
/// Every member has to take part in every reduction; dropping a member while
/// the others keep reducing blocks them forever.
#[derive(Debug)]
pub struct ClusterGate {
    rank: usize,
    size: usize,
    round: u64,
    shared: Arc<Shared>,
}

impl ClusterGate {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of reductions this member has completed.
    pub fn rounds(&self) -> u64 {
        self.round
    }
}

impl FrameVersionGate for ClusterGate {
    fn all_reduce(&mut self, local: u64, op: ReduceOp) -> u64 {
        let round = self.round;
        let index = (round % 2) as usize;

        {
            let mut slots = self.shared.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = &mut slots[index];
            if slot.round != round || slot.value.is_none() {
                *slot = Slot { round, value: Some(local) };
            } else {
                slot.value = slot.value.map(|acc| op.apply(acc, local));
            }
        }

        self.shared.barrier.wait();

        let result = {
            let slots = self.shared.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots[index].value.unwrap_or(local)
        };

        trace!(rank = self.rank, round, ?op, local, result, "all-reduce complete");
        self.round += 1;
        result
    }
}
