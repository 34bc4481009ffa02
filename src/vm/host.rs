//! Host-VM side of the binding: the capability trait the host runtime
//! implements for the coordinator, the `GCListener` callback contract the
//! coordinator consumes from the host collector, and the cross-VM contract
//! the foreign engine drives into.

use std::sync::Arc;

use crate::session::MarkingSession;
use crate::vm::{ForeignVmAdaptor, JsEnv, ObjectHandle};

/// Collection phases of the host collector that the coordinator listens to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum GcPhase {
    /// Root scanning before the concurrent window opens.
    InitialMark,
    /// The concurrent marking window.
    Mark,
    /// The synchronized re-marking pass under the mutator lock.
    Remark,
}

/// Why a host collection was scheduled.  The coordinator tags the tasks it
/// posts with [`GcTaskCause::CrossReference`] so schedulers and logs can tell
/// them apart from ordinary heap collections.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum GcTaskCause {
    /// Allocation pressure inside the host heap.
    Allocation,
    /// An explicit collection request from application code.
    Explicit,
    /// A cross-reference collection posted by the coordinator.
    CrossReference,
}

/// Callbacks the host collector delivers to registered listeners.  The
/// coordinator has no scheduler of its own and is driven entirely through
/// this contract.
pub trait GCListener: Send + Sync {
    /// A host collection started.
    fn gc_started(&self, cause: GcTaskCause, heap_size_before: usize);
    /// A host collection finished.
    fn gc_finished(&self, cause: GcTaskCause, heap_size_before: usize, heap_size_after: usize);
    /// The host collector entered `phase`.
    fn gc_phase_started(&self, phase: GcPhase);
    /// The host collector left `phase`.
    fn gc_phase_finished(&self, phase: GcPhase);
}

/// The capability set the host runtime exposes to the coordinator.
///
/// This is the host-side counterpart of a foreign adaptor: everything the
/// coordinator needs from the host VM goes through here, so the coordinator
/// itself stays free of any runtime internals.
pub trait HostVm: Send + Sync + 'static {
    /// Whether the runtime is up.  Coordinator construction fails while the
    /// runtime is not running.
    fn is_running(&self) -> bool;

    /// Register a listener with the host collector.  The coordinator
    /// registers itself here during construction.
    fn register_gc_listener(&self, listener: Arc<dyn GCListener>);

    /// Schedule a host collection with the given cause.  Returns `false` if
    /// the collector refused to take the task.
    fn post_gc_task(&self, cause: GcTaskCause) -> bool;

    /// Visit the host objects directly reachable from `object` that carry a
    /// shared reference.  Purely intra-VM edges are the host tracer's
    /// business and must not be reported here.
    fn visit_shared_fields(&self, object: ObjectHandle, visitor: &mut dyn FnMut(ObjectHandle));
}

/// The contract the foreign engine (and the coordinator's own phase
/// callbacks) drive into.  One marking participant holds one
/// [`MarkingSession`] per cycle; the session value enforces the legal call
/// order, so an out-of-order call fails loudly instead of corrupting the
/// rendezvous.
pub trait HostVmInterface: Send + Sync {
    /// Mark the shared reference for `object` and the transitive closure
    /// reachable from it through shared references only.  Safe to call from
    /// several foreign threads at once during the marking phases.
    fn mark_from_object(&self, object: ObjectHandle);

    /// An interop boundary context was created.  Registers its adaptor and
    /// makes it a marking participant from the next cycle on.
    fn on_vm_attach(&self, adaptor: Arc<dyn ForeignVmAdaptor>);

    /// The interop boundary context for `env` is going away.  Blocks until
    /// any running cycle finishes, so a detach never races live marking.
    fn on_vm_detach(&self, env: JsEnv);

    /// The cycle's first rendezvous.  Freezes this cycle's arrival target and
    /// waits for all participants.  Returns `None` if `no_work` reported
    /// nothing to do, in which case the caller skips its marking for this
    /// cycle.
    fn start_marking_barrier(&self, no_work: &dyn Fn() -> bool) -> Option<MarkingSession>;

    /// Rendezvous after the concurrent window.  Returns `false` if `no_work`
    /// cut the wait short.
    fn wait_concurrent_mark(&self, session: &mut MarkingSession, no_work: &dyn Fn() -> bool)
        -> bool;

    /// Unconditional rendezvous entering the remark pass.  The host calls
    /// this under its mutator lock.
    fn remark_barrier(&self, session: &mut MarkingSession);

    /// Rendezvous after remark; consumes the session, ending this
    /// participant's cycle.  Returns `false` if `no_work` cut the wait short.
    fn wait_remark(&self, session: MarkingSession, no_work: &dyn Fn() -> bool) -> bool;

    /// The cycle's last rendezvous, after sweeping.
    fn finish_barrier(&self);

    /// Wake every thread blocked at a barrier checkpoint so it re-evaluates
    /// its predicate.  Does not count as an arrival.
    fn notify_waiters(&self);
}
