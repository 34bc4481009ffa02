//! This module contains `MarkingSession`, the per-participant token for one
//! cross-reference marking cycle.
//!
//! A session is handed out by the cycle's first rendezvous and threaded
//! through the later checkpoints, so the legal call order
//! (start → concurrent finished → remark → done) is carried by a value
//! instead of a debug-only thread-local.  An out-of-order call is a contract
//! violation and aborts.

/// Where a participant stands within the current cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SessionPhase {
    /// Marking concurrently with the mutators.
    Concurrent,
    /// This participant finished its concurrent marking.
    ConcurrentFinished,
    /// Re-marking under the host mutator lock.
    Remark,
}

/// One participant's token for one marking cycle.
///
/// Created by
/// [`HostVmInterface::start_marking_barrier`](crate::vm::HostVmInterface::start_marking_barrier)
/// and consumed by
/// [`HostVmInterface::wait_remark`](crate::vm::HostVmInterface::wait_remark).
/// Not `Clone`: a participant arrives at each checkpoint exactly once.
#[derive(Debug)]
pub struct MarkingSession {
    phase: SessionPhase,
}

impl MarkingSession {
    pub(crate) fn begin() -> Self {
        Self {
            phase: SessionPhase::Concurrent,
        }
    }

    pub(crate) fn finish_concurrent(&mut self) {
        self.expect(SessionPhase::Concurrent, "wait_concurrent_mark");
        self.phase = SessionPhase::ConcurrentFinished;
    }

    pub(crate) fn enter_remark(&mut self) {
        self.expect(SessionPhase::ConcurrentFinished, "remark_barrier");
        self.phase = SessionPhase::Remark;
    }

    pub(crate) fn end(self) {
        self.expect(SessionPhase::Remark, "wait_remark");
    }

    fn expect(&self, expected: SessionPhase, op: &str) {
        assert!(
            self.phase == expected,
            "out-of-order {} call: session is in phase {:?}, expected {:?}",
            op,
            self.phase,
            expected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::MarkingSession;

    #[test]
    fn legal_order_runs_through() {
        let mut session = MarkingSession::begin();
        session.finish_concurrent();
        session.enter_remark();
        session.end();
    }

    #[test]
    #[should_panic(expected = "out-of-order remark_barrier")]
    fn skipping_concurrent_finish_aborts() {
        let mut session = MarkingSession::begin();
        session.enter_remark();
    }

    #[test]
    #[should_panic(expected = "out-of-order wait_remark")]
    fn ending_early_aborts() {
        let session = MarkingSession::begin();
        session.end();
    }
}
