//! The remembered set feeding the remark pass.
//!
//! While the concurrent window is open, the host VM's write barrier records
//! every store of a shared reference into a mutable field here.  The
//! coordinator drains the set during remark, under the host mutator lock,
//! and re-marks each recorded object.  Outside a cycle the set is inert so
//! the barrier fast path stays a single load.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;

use crate::vm::ObjectHandle;

pub struct RememberedSet {
    /// Multi-producer feed from mutator threads.
    records: SegQueue<ObjectHandle>,
    /// Recording is enabled only between cycle start and remark.
    enabled: AtomicBool,
}

impl RememberedSet {
    pub fn new() -> Self {
        Self {
            records: SegQueue::new(),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    /// Record a mutated shared reference.  No-op outside a cycle.
    pub fn record(&self, object: ObjectHandle) {
        if self.is_enabled() {
            self.records.push(object);
        }
    }

    /// Drain every record into `remark`.  Entries recorded concurrently with
    /// the drain are picked up too; the queue is empty when this returns.
    pub(crate) fn drain(&self, remark: &mut dyn FnMut(ObjectHandle)) {
        while let Some(object) = self.records.pop() {
            remark(object);
        }
    }

    /// Throw away stale records from an interrupted cycle.
    pub(crate) fn clear(&self) {
        while self.records.pop().is_some() {}
    }
}

impl Default for RememberedSet {
    fn default() -> Self {
        Self::new()
    }
}
