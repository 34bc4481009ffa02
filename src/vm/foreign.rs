//! Foreign-VM side of the binding: the adaptor trait an embedder implements
//! over a JS engine's embedding API, and the opaque handle type for values
//! retained on the engine side.

use crate::vm::{JsEnv, VmKind};

/// An opaque handle to a value retained inside the foreign engine.
///
/// The coordinator never dereferences it.  A handle is valid from the moment
/// its shared reference is inserted into storage until that reference is
/// swept, at which point the coordinator hands the handle back through
/// [`ForeignVmAdaptor::release_handle`] exactly once.  Holding a handle past
/// that window is a use-after-free on the engine side.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct JsRefHandle(usize);

impl JsRefHandle {
    /// Wrap a raw reference value handed out by the foreign engine.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw value. Only the foreign engine may interpret it.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// The capability set the coordinator needs from a foreign engine.
///
/// One adaptor wraps one engine instance.  All methods may be called from
/// the host collector's threads; the adaptor is responsible for getting onto
/// the right engine thread if the embedding API requires it.
pub trait ForeignVmAdaptor: Send + Sync + 'static {
    /// The engine kind behind this adaptor.
    fn vm_kind(&self) -> VmKind {
        VmKind::JsEngine
    }

    /// Does this adaptor wrap the engine instance identified by `env`?
    /// Used to route calls when several instances coexist.
    fn matches_env(&self, env: JsEnv) -> bool;

    /// Tell the engine that a running cross-reference cycle is being
    /// interrupted and it should stop feeding marking work.
    fn notify_interruption(&self);

    /// Begin the engine's own concurrent trace into the shared graph.
    /// Returns `false` if the engine cannot proceed; the coordinator then
    /// skips the concurrent phase for this participant.  No error channel
    /// crosses the VM boundary.
    fn start_xref_marking(&self) -> bool;

    /// Mark the engine-side value behind `handle` and let the engine trace
    /// onward from it.  The engine reports any foreign-to-host edges it finds
    /// by calling back into
    /// [`HostVmInterface::mark_from_object`](crate::vm::HostVmInterface::mark_from_object)
    /// with the host object handle.
    fn mark_from_object(&self, handle: JsRefHandle);

    /// Drop the engine-side retention behind `handle`.  Called exactly once
    /// per handle, during sweep, after its shared reference became
    /// unreachable from both VMs.
    fn release_handle(&self, handle: JsRefHandle);
}
