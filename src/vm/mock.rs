//! Mock host VM, foreign engine, and storage used by the coordinator tests.
//! The mock host drives the listener callbacks in the order the real
//! collector would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::storage::{SharedReference, SharedReferenceStorage};
use crate::vm::{
    ForeignVmAdaptor, GCListener, GcPhase, GcTaskCause, HostVm, JsEnv, JsRefHandle, ObjectHandle,
};

#[derive(Default)]
pub struct MockHostVm {
    running: AtomicBool,
    listener: Mutex<Option<Arc<dyn GCListener>>>,
    posted: Mutex<Vec<GcTaskCause>>,
    /// Shared-reference edges between host objects, as the real runtime's
    /// object scanner would report them.
    edges: Mutex<HashMap<ObjectHandle, Vec<ObjectHandle>>>,
}

impl MockHostVm {
    pub fn running() -> Arc<Self> {
        let vm = Self::default();
        vm.running.store(true, Ordering::SeqCst);
        Arc::new(vm)
    }

    pub fn stopped() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_edge(&self, from: ObjectHandle, to: ObjectHandle) {
        self.edges.lock().unwrap().entry(from).or_default().push(to);
    }

    pub fn posted_causes(&self) -> Vec<GcTaskCause> {
        self.posted.lock().unwrap().clone()
    }

    pub fn listener(&self) -> Arc<dyn GCListener> {
        self.listener
            .lock()
            .unwrap()
            .clone()
            .expect("no GC listener registered")
    }

    /// Fire the callbacks of one host collection in collector order.
    pub fn run_host_gc(&self, cause: GcTaskCause) {
        let listener = self.listener();
        listener.gc_started(cause, 0);
        for phase in [GcPhase::InitialMark, GcPhase::Mark, GcPhase::Remark] {
            listener.gc_phase_started(phase);
            listener.gc_phase_finished(phase);
        }
        listener.gc_finished(cause, 0, 0);
    }
}

impl HostVm for MockHostVm {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn register_gc_listener(&self, listener: Arc<dyn GCListener>) {
        *self.listener.lock().unwrap() = Some(listener);
    }

    fn post_gc_task(&self, cause: GcTaskCause) -> bool {
        self.posted.lock().unwrap().push(cause);
        true
    }

    fn visit_shared_fields(&self, object: ObjectHandle, visitor: &mut dyn FnMut(ObjectHandle)) {
        if let Some(targets) = self.edges.lock().unwrap().get(&object) {
            for target in targets {
                visitor(*target);
            }
        }
    }
}

#[derive(Default)]
pub struct MockStorage {
    refs: Mutex<HashMap<ObjectHandle, Arc<SharedReference>>>,
}

impl MockStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, object: ObjectHandle, xref: SharedReference) {
        self.refs.lock().unwrap().insert(object, Arc::new(xref));
    }

    pub fn contains(&self, object: ObjectHandle) -> bool {
        self.refs.lock().unwrap().contains_key(&object)
    }
}

impl SharedReferenceStorage for MockStorage {
    fn size(&self) -> usize {
        self.refs.lock().unwrap().len()
    }

    fn visit_roots(&self, visitor: &mut dyn FnMut(&SharedReference)) {
        for xref in self.refs.lock().unwrap().values() {
            visitor(xref);
        }
    }

    fn get_reference(&self, object: ObjectHandle) -> Option<Arc<SharedReference>> {
        self.refs.lock().unwrap().get(&object).cloned()
    }

    fn sweep_unmarked(&self, released: &mut dyn FnMut(&SharedReference)) -> usize {
        let mut refs = self.refs.lock().unwrap();
        let dead: Vec<ObjectHandle> = refs
            .iter()
            .filter(|(_, xref)| !xref.is_marked())
            .map(|(object, _)| *object)
            .collect();
        for object in &dead {
            let xref = refs.remove(object).unwrap();
            released(&xref);
        }
        dead.len()
    }
}

pub struct MockForeignVm {
    env: JsEnv,
    start_ok: AtomicBool,
    starts: AtomicUsize,
    interruptions: AtomicUsize,
    marked: Mutex<Vec<JsRefHandle>>,
    released: Mutex<Vec<JsRefHandle>>,
}

impl MockForeignVm {
    pub fn new(env: JsEnv) -> Arc<Self> {
        Arc::new(Self {
            env,
            start_ok: AtomicBool::new(true),
            starts: AtomicUsize::new(0),
            interruptions: AtomicUsize::new(0),
            marked: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        })
    }

    pub fn refuse_marking(&self) {
        self.start_ok.store(false, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn interruptions(&self) -> usize {
        self.interruptions.load(Ordering::SeqCst)
    }

    pub fn marked(&self) -> Vec<JsRefHandle> {
        self.marked.lock().unwrap().clone()
    }

    pub fn released(&self) -> Vec<JsRefHandle> {
        self.released.lock().unwrap().clone()
    }
}

impl ForeignVmAdaptor for MockForeignVm {
    fn matches_env(&self, env: JsEnv) -> bool {
        self.env == env
    }

    fn notify_interruption(&self) {
        self.interruptions.fetch_add(1, Ordering::SeqCst);
    }

    fn start_xref_marking(&self) -> bool {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.start_ok.load(Ordering::SeqCst)
    }

    fn mark_from_object(&self, handle: JsRefHandle) {
        self.marked.lock().unwrap().push(handle);
    }

    fn release_handle(&self, handle: JsRefHandle) {
        self.released.lock().unwrap().push(handle);
    }
}
