//! Shared-reference storage: the surface the coordinator consumes from the
//! table of cross-VM edges, and the per-entry `SharedReference` type.
//!
//! The storage itself is an external collaborator owned by the interop
//! layer; structural operations (insert, erase, iteration) are guarded by
//! its own internal lock.  The coordinator only reads its size, visits its
//! entries as roots, looks entries up by host object, and asks it to drop
//! unmarked entries during sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::vm::{JsEnv, JsRefHandle, ObjectHandle};

/// Direction flag: the host VM holds a reference into the foreign engine.
pub const HAS_ETS_FLAG: u8 = 1 << 0;
/// Direction flag: the foreign engine holds a reference into the host VM.
pub const HAS_JS_FLAG: u8 = 1 << 1;

/// One cross-VM edge ("xref").
///
/// Created when application code crosses the language boundary and retains a
/// value; reclaimed only during sweep, once unreachable from both VMs'
/// roots.  The mark bit is the only field mutated from two call paths (host
/// and foreign tracer); writes are set-only between unmark-all passes, so an
/// idempotent atomic store suffices.
pub struct SharedReference {
    /// Set-only while a cycle is in a marking phase; cleared by unmark-all.
    mark: AtomicBool,
    /// Direction flags.  At least one is always set.
    flags: u8,
    /// The engine-side value this edge retains.
    js_ref: JsRefHandle,
    /// The engine instance `js_ref` belongs to, for adaptor routing.
    js_env: JsEnv,
}

impl SharedReference {
    /// Create an edge.  Aborts if `flags` carries no direction: an edge that
    /// points in neither direction cannot exist.
    pub fn new(js_ref: JsRefHandle, js_env: JsEnv, flags: u8) -> Self {
        assert!(
            flags & (HAS_ETS_FLAG | HAS_JS_FLAG) != 0,
            "shared reference created without a direction flag"
        );
        Self {
            mark: AtomicBool::new(false),
            flags,
            js_ref,
            js_env,
        }
    }

    /// Has this edge been reached in the current cycle?
    pub fn is_marked(&self) -> bool {
        self.mark.load(Ordering::SeqCst)
    }

    /// Mark this edge.  Idempotent; safe from any marking thread.
    pub fn mark(&self) {
        self.mark.store(true, Ordering::SeqCst);
    }

    /// Clear the mark bit.  Only the coordinator's unmark-all pass does this.
    pub(crate) fn unmark(&self) {
        self.mark.store(false, Ordering::SeqCst);
    }

    /// Does the host VM hold this edge into the foreign engine?
    pub fn has_ets_flag(&self) -> bool {
        self.flags & HAS_ETS_FLAG != 0
    }

    /// Does the foreign engine hold this edge into the host VM?
    pub fn has_js_flag(&self) -> bool {
        self.flags & HAS_JS_FLAG != 0
    }

    /// The engine-side handle this edge retains.
    pub fn js_ref(&self) -> JsRefHandle {
        self.js_ref
    }

    /// The engine instance the retained value lives in.
    pub fn js_env(&self) -> JsEnv {
        self.js_env
    }
}

/// The storage surface the coordinator consumes.
///
/// Implemented by the interop layer over its cross-reference table.
pub trait SharedReferenceStorage: Send + Sync + 'static {
    /// Number of live edges.
    fn size(&self) -> usize;

    /// Visit every edge.  Each edge is a root into the other VM, so this is
    /// the root set of the cross-reference graph.
    fn visit_roots(&self, visitor: &mut dyn FnMut(&SharedReference));

    /// Look up the edge keyed by a host object, if any.
    fn get_reference(&self, object: ObjectHandle) -> Option<Arc<SharedReference>>;

    /// Remove every unmarked edge, handing each removed entry to `released`
    /// so its engine-side handle can be dropped.  Returns the number of
    /// removed edges.  Runs only on the host GC thread, never concurrently
    /// with marking.
    fn sweep_unmarked(&self, released: &mut dyn FnMut(&SharedReference)) -> usize;
}
