//! The cross-reference collection coordinator.
//!
//! `Xgc` owns the trigger policy and the five-phase cycle (unmark, concurrent
//! mark, remark, sweep, finish) over the shared-reference storage.  It spawns
//! no threads: the host collector drives it through [`GCListener`] callbacks,
//! and the foreign engine drives into it through [`HostVmInterface`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::barrier::VmBarrier;
use crate::remset::RememberedSet;
use crate::session::MarkingSession;
use crate::storage::SharedReferenceStorage;
use crate::trigger::XgcTrigger;
use crate::util::options::Options;
use crate::vm::{
    ForeignVmAdaptor, GCListener, GcPhase, GcTaskCause, HostVm, HostVmInterface, JsEnv,
    ObjectHandle,
};

/// Why coordinator construction failed.
#[derive(Debug, Eq, PartialEq)]
pub enum XgcBuildError {
    /// The host runtime is not running.
    HostVmNotRunning,
}

impl fmt::Display for XgcBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XgcBuildError::HostVmNotRunning => {
                write!(f, "cannot create the coordinator: host VM is not running")
            }
        }
    }
}

impl std::error::Error for XgcBuildError {}

/// The coordinator.  One per host VM, owned by the embedder through the host
/// VM's runtime context; its lifetime is tied to the VM's.
pub struct Xgc<VM: HostVm> {
    vm: Arc<VM>,
    storage: Arc<dyn SharedReferenceStorage>,
    /// The rendezvous barrier binding both collectors.  The host VM is the
    /// permanent participant; attached interop contexts add themselves.
    barrier: VmBarrier,
    /// Adaptors for the attached foreign-engine instances.
    adaptors: Mutex<Vec<Arc<dyn ForeignVmAdaptor>>>,
    remset: RememberedSet,
    trigger: XgcTrigger,
    /// Set for the duration of a cycle.  Mirrored by `cycle_running` for
    /// blocking waiters.
    gc_in_progress: AtomicBool,
    /// Set once the remark rendezvous completed; sweeping without it would
    /// reclaim references the mutators can still reach.
    remark_finished: AtomicBool,
    /// Cleared when any foreign engine refused to start its concurrent
    /// trace; the host then skips the concurrent checkpoint.
    concurrent_ok: AtomicBool,
    /// The host side's own session for the running cycle.
    host_session: Mutex<Option<MarkingSession>>,
    /// Guards `wait_for_finish`.
    cycle_running: Mutex<bool>,
    cycle_done: Condvar,
}

impl<VM: HostVm> Xgc<VM> {
    /// Create the coordinator and register it as a listener on the host
    /// collector.  Fails if the host runtime is not running.
    pub fn new(
        vm: Arc<VM>,
        storage: Arc<dyn SharedReferenceStorage>,
        options: Options,
    ) -> Result<Arc<Self>, XgcBuildError> {
        crate::util::logger::try_init().ok();
        if !vm.is_running() {
            return Err(XgcBuildError::HostVmNotRunning);
        }
        let xgc = Arc::new(Self {
            vm: vm.clone(),
            storage,
            barrier: VmBarrier::new(1),
            adaptors: Mutex::new(Vec::new()),
            remset: RememberedSet::new(),
            trigger: XgcTrigger::new(&options),
            gc_in_progress: AtomicBool::new(false),
            remark_finished: AtomicBool::new(false),
            concurrent_ok: AtomicBool::new(true),
            host_session: Mutex::new(None),
            cycle_running: Mutex::new(false),
            cycle_done: Condvar::new(),
        });
        vm.register_gc_listener(xgc.clone());
        debug!(
            "XGC created (policy {}, threshold {})",
            xgc.trigger.policy(),
            xgc.trigger.threshold()
        );
        Ok(xgc)
    }

    /// Tear the coordinator down.  Aborts if a cycle is running; destroying
    /// a live cycle would leave the other VM blocked at a barrier forever.
    pub fn destroy(&self) {
        assert!(
            !self.is_in_progress(),
            "XGC destroyed while a cross-reference cycle is in progress"
        );
        self.adaptors.lock().unwrap().clear();
        debug!("XGC destroyed");
    }

    /// Is a cross-reference cycle running?
    pub fn is_in_progress(&self) -> bool {
        self.gc_in_progress.load(Ordering::SeqCst)
    }

    /// Block until the running cycle (if any) finishes.
    pub fn wait_for_finish(&self) {
        let mut running = self.cycle_running.lock().unwrap();
        while *running {
            running = self.cycle_done.wait(running).unwrap();
        }
    }

    /// Evaluate the trigger policy against the current storage size and run
    /// [`Xgc::trigger`] if a cycle is due.  Called by the host VM when it is
    /// about to collect.
    pub fn trigger_gc_if_needed(&self) -> bool {
        let size = self.storage.size();
        if !self.trigger.is_gc_required(size) {
            return false;
        }
        info!(
            "[POLL] cross-reference storage at {} (threshold {}): triggering collection",
            size,
            self.trigger.threshold()
        );
        self.trigger()
    }

    /// Start a cross-reference cycle: post an XGC-tagged collection task to
    /// the host collector, clear the mark bits, and rendezvous with the
    /// attached VMs.  Returns `false` if nothing was started (runtime down,
    /// cycle already running, or no shared references to collect).
    pub fn trigger(&self) -> bool {
        if !self.vm.is_running() {
            return false;
        }
        if self.gc_in_progress.swap(true, Ordering::SeqCst) {
            debug!("XGC trigger ignored: cycle already in progress");
            return false;
        }
        if self.storage.size() == 0 {
            self.gc_in_progress.store(false, Ordering::SeqCst);
            debug!("XGC trigger skipped: no shared references");
            return false;
        }

        *self.cycle_running.lock().unwrap() = true;
        self.remark_finished.store(false, Ordering::SeqCst);
        self.concurrent_ok.store(true, Ordering::SeqCst);

        // Unmark before the rendezvous so every mark a participant sets
        // afterwards is ordered after the clear.
        self.unmark_all();
        self.remset.enable();

        if !self.vm.post_gc_task(GcTaskCause::CrossReference) {
            warn!("XGC trigger aborted: host collector refused the task");
            self.end_cycle();
            return false;
        }

        // Kick every attached engine's concurrent trace into the shared
        // graph; each tracer's first step is to arrive at the initial
        // rendezvous below.  A refusal is not an error channel, just a bool:
        // the participant will never arrive, so the host withdraws from the
        // cycle instead of waiting for it.
        let adaptors = self.adaptors.lock().unwrap().clone();
        for adaptor in &adaptors {
            if !adaptor.start_xref_marking() {
                warn!("a foreign VM could not start cross-reference marking");
                self.concurrent_ok.store(false, Ordering::SeqCst);
            }
        }
        if !self.concurrent_ok.load(Ordering::SeqCst) {
            for adaptor in &adaptors {
                adaptor.notify_interruption();
            }
            self.notify_waiters();
        }

        let no_work = || self.storage.size() == 0 || !self.concurrent_ok.load(Ordering::SeqCst);
        match self.start_marking_barrier(&no_work) {
            Some(session) => {
                *self.host_session.lock().unwrap() = Some(session);
                true
            }
            None => {
                // Storage drained between the size check and the rendezvous,
                // or a foreign tracer could not start.
                debug!("XGC cycle skipped at the initial rendezvous: no work");
                self.end_cycle();
                false
            }
        }
    }

    /// Record a store of a shared reference into a mutable field.  The host
    /// VM's write barrier calls this; outside a cycle it is a no-op.
    pub fn record_shared_store(&self, object: ObjectHandle) {
        self.remset.record(object);
    }

    /// The trigger policy and threshold state.
    pub fn trigger_state(&self) -> &XgcTrigger {
        &self.trigger
    }

    fn unmark_all(&self) {
        self.storage.visit_roots(&mut |xref| xref.unmark());
        self.remset.clear();
    }

    /// Remove every unmarked reference from storage and release its
    /// engine-side handle.  Runs on the host GC thread only, after remark.
    fn sweep(&self) {
        debug_assert!(self.remark_finished.load(Ordering::SeqCst));
        let adaptors = self.adaptors.lock().unwrap().clone();
        let swept = self.storage.sweep_unmarked(&mut |xref| {
            if let Some(adaptor) = route_adaptor(&adaptors, xref.js_env()) {
                adaptor.release_handle(xref.js_ref());
            }
        });
        info!(
            "XGC sweep: removed {} shared references, {} remain",
            swept,
            self.storage.size()
        );
    }

    fn end_cycle(&self) {
        self.remset.disable();
        self.host_session.lock().unwrap().take();
        self.gc_in_progress.store(false, Ordering::SeqCst);
        let mut running = self.cycle_running.lock().unwrap();
        *running = false;
        self.cycle_done.notify_all();
    }

    fn adaptor_for_env(&self, env: JsEnv) -> Option<Arc<dyn ForeignVmAdaptor>> {
        route_adaptor(&self.adaptors.lock().unwrap(), env)
    }

    fn take_host_session(&self) -> MarkingSession {
        self.host_session
            .lock()
            .unwrap()
            .take()
            .expect("cross-reference cycle has no live host session")
    }

    fn with_host_session(&self, f: impl FnOnce(&mut MarkingSession)) {
        let mut guard = self.host_session.lock().unwrap();
        let session = guard
            .as_mut()
            .expect("cross-reference cycle has no live host session");
        f(session);
    }
}

/// Route to the adaptor wrapping the engine instance `env`, falling back to
/// a sole attached adaptor.
fn route_adaptor(
    adaptors: &[Arc<dyn ForeignVmAdaptor>],
    env: JsEnv,
) -> Option<Arc<dyn ForeignVmAdaptor>> {
    adaptors
        .iter()
        .find(|a| a.matches_env(env))
        .or_else(|| match adaptors {
            [sole] => Some(sole),
            _ => None,
        })
        .cloned()
}

impl<VM: HostVm> HostVmInterface for Xgc<VM> {
    fn mark_from_object(&self, object: ObjectHandle) {
        let mut worklist = vec![object];
        while let Some(object) = worklist.pop() {
            let Some(xref) = self.storage.get_reference(object) else {
                // No cross-VM edge here; purely intra-VM reachability is the
                // host tracer's business.
                continue;
            };
            if xref.is_marked() {
                continue;
            }
            xref.mark();
            trace!("XGC marked shared reference for {:?}", object);
            if xref.has_ets_flag() {
                if let Some(adaptor) = self.adaptor_for_env(xref.js_env()) {
                    adaptor.mark_from_object(xref.js_ref());
                }
            }
            self.vm
                .visit_shared_fields(object, &mut |next| worklist.push(next));
        }
    }

    fn on_vm_attach(&self, adaptor: Arc<dyn ForeignVmAdaptor>) {
        debug!("XGC: {:?} adaptor attached", adaptor.vm_kind());
        self.adaptors.lock().unwrap().push(adaptor);
        self.barrier.increment();
    }

    fn on_vm_detach(&self, env: JsEnv) {
        self.wait_for_finish();
        let mut adaptors = self.adaptors.lock().unwrap();
        let before = adaptors.len();
        adaptors.retain(|a| !a.matches_env(env));
        assert!(
            adaptors.len() < before,
            "detach for an environment that was never attached"
        );
        drop(adaptors);
        self.barrier.decrement();
    }

    fn start_marking_barrier(&self, no_work: &dyn Fn() -> bool) -> Option<MarkingSession> {
        if self.barrier.initial_wait(no_work) {
            Some(MarkingSession::begin())
        } else {
            None
        }
    }

    fn wait_concurrent_mark(
        &self,
        session: &mut MarkingSession,
        no_work: &dyn Fn() -> bool,
    ) -> bool {
        session.finish_concurrent();
        self.barrier.wait(no_work)
    }

    fn remark_barrier(&self, session: &mut MarkingSession) {
        session.enter_remark();
        self.barrier.wait(&|| false);
    }

    fn wait_remark(&self, session: MarkingSession, no_work: &dyn Fn() -> bool) -> bool {
        session.end();
        self.barrier.wait(no_work)
    }

    fn finish_barrier(&self) {
        self.barrier.wait(&|| false);
    }

    fn notify_waiters(&self) {
        self.barrier.signal();
    }
}

impl<VM: HostVm> GCListener for Xgc<VM> {
    fn gc_started(&self, cause: GcTaskCause, heap_size_before: usize) {
        if !self.is_in_progress() {
            return;
        }
        debug!(
            "XGC: host collection started (cause {}, heap {} bytes)",
            cause, heap_size_before
        );
    }

    fn gc_finished(&self, cause: GcTaskCause, heap_size_before: usize, heap_size_after: usize) {
        if !self.is_in_progress() {
            return;
        }
        debug!(
            "XGC: host collection finished (cause {}, heap {} -> {} bytes)",
            cause, heap_size_before, heap_size_after
        );
        if self.remark_finished.load(Ordering::SeqCst) {
            self.sweep();
            self.finish_barrier();
            self.trigger.on_cycle_end(self.storage.size());
        } else {
            // The host collection ended before remark completed.  Sweeping
            // now would be unsafe; wake everyone and abandon the cycle.
            warn!("XGC cycle interrupted before remark; skipping sweep");
            for adaptor in self.adaptors.lock().unwrap().iter() {
                adaptor.notify_interruption();
            }
            self.notify_waiters();
        }
        self.end_cycle();
    }

    fn gc_phase_started(&self, phase: GcPhase) {
        if !self.is_in_progress() {
            return;
        }
        debug!("XGC: phase {} started", phase);
        match phase {
            // Mark bits were already cleared by `trigger`, before the initial
            // rendezvous; clearing again here would clobber marks the foreign
            // tracer set in the meantime.
            GcPhase::InitialMark => {}
            GcPhase::Mark => {}
            GcPhase::Remark => {
                // Entered under the host mutator lock.
                self.with_host_session(|session| self.remark_barrier(session));
            }
        }
    }

    fn gc_phase_finished(&self, phase: GcPhase) {
        if !self.is_in_progress() {
            return;
        }
        debug!("XGC: phase {} finished", phase);
        match phase {
            GcPhase::InitialMark => {}
            GcPhase::Mark => {
                let concurrent_skipped = !self.concurrent_ok.load(Ordering::SeqCst);
                self.with_host_session(|session| {
                    self.wait_concurrent_mark(session, &|| concurrent_skipped);
                });
            }
            GcPhase::Remark => {
                // Still under the mutator lock: re-mark everything the
                // mutators touched during the concurrent window.
                self.remset.disable();
                self.remset.drain(&mut |object| self.mark_from_object(object));
                let session = self.take_host_session();
                self.wait_remark(session, &|| false);
                self.remark_finished.store(true, Ordering::SeqCst);
            }
        }
    }
}
