//! Binding traits and opaque value types for the two runtimes the
//! coordinator bridges.  The host VM side lives in [`host`], the foreign
//! JS-engine side in [`foreign`].

pub mod foreign;
pub mod host;

#[cfg(test)]
pub(crate) mod mock;

pub use foreign::{ForeignVmAdaptor, JsRefHandle};
pub use host::{GCListener, GcPhase, GcTaskCause, HostVm, HostVmInterface};

/// Identifies the concrete VM kind behind an opaque value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VmKind {
    /// The managed host runtime.  It drives the coordinator's state machine.
    Host,
    /// An embedded JS engine, reached through a [`ForeignVmAdaptor`].
    JsEngine,
}

/// An opaque handle to an object in the host VM's heap.
///
/// The coordinator never dereferences it; it is only used as a key into the
/// shared-reference storage and as an argument passed back to the host
/// binding.  Valid from the moment the host hands it out until the shared
/// reference keyed by it is swept.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObjectHandle(usize);

impl ObjectHandle {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Wrap a raw index or pointer value handed out by the host VM.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw value. Only the host VM may interpret it.
    pub fn as_raw(self) -> usize {
        self.0
    }

    /// Is this the null handle?
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// An opaque identifier for one foreign-engine instance (its environment).
/// Used only for routing calls when several engine instances coexist in the
/// process.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct JsEnv(usize);

impl JsEnv {
    /// An environment value that matches no adaptor.
    pub const NONE: Self = Self(0);

    /// Wrap a raw environment value handed out by the foreign engine.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw value. Only the foreign engine may interpret it.
    pub fn as_raw(self) -> usize {
        self.0
    }
}
