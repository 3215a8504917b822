//! Gate for a wall driven by a single process

use super::{FrameVersionGate, ReduceOp};

/// Identity reduction: the local value is the cluster value.
///
/// Counts collective calls so callers can check they stay balanced.
#[derive(Debug, Default)]
pub struct SingleProcessGate {
    calls: u64,
}

impl SingleProcessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collective operations performed so far.
    pub fn collective_calls(&self) -> u64 {
        self.calls
    }
}

impl FrameVersionGate for SingleProcessGate {
    fn all_reduce(&mut self, local: u64, _op: ReduceOp) -> u64 {
        self.calls += 1;
        local
    }
}
