//! Cluster-wide frame agreement.
//!
//! Every wall process renders a disjoint part of the same stream window, so
//! all of them must swap to a new frame in the same render cycle. The
//! [`FrameVersionGate`] is the only point where processes talk to each
//! other: a blocking all-reduce that every process calls the same number of
//! times, in the same order, once per stream per cycle.
//!
//! Calling a gate method conditionally on process-local state breaks that
//! invariant and deadlocks (or miscounts) the whole wall.

mod cluster;
mod local;

pub use cluster::{ClusterGate, ThreadCluster};
pub use local::SingleProcessGate;

/// Reduction applied across all processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            ReduceOp::Sum => a.saturating_add(b),
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Wall-to-wall agreement primitive.
///
/// Implementors provide the collective [`all_reduce`](Self::all_reduce); the
/// frame-level questions are answered on top of it.
pub trait FrameVersionGate {
    /// Blocking reduction of `local` over every process in the wall.
    fn all_reduce(&mut self, local: u64, op: ReduceOp) -> u64;

    /// Cluster-wide number of segments still decoding for one stream.
    fn global_active_decode_count(&mut self, local: usize) -> usize {
        self.all_reduce(local as u64, ReduceOp::Sum) as usize
    }

    /// True when every process holds exactly `version` as its latest frame.
    ///
    /// Both reductions always run so the collective call count does not
    /// depend on the outcome of the first one.
    fn check_version(&mut self, version: u64) -> bool {
        let lowest = self.all_reduce(version, ReduceOp::Min);
        let highest = self.all_reduce(version, ReduceOp::Max);
        lowest == version && highest == version
    }
}

impl<G: FrameVersionGate + ?Sized> FrameVersionGate for &mut G {
    fn all_reduce(&mut self, local: u64, op: ReduceOp) -> u64 {
        (**self).all_reduce(local, op)
    }
}
