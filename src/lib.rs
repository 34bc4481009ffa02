//! Cross-reference garbage collection for a host VM embedding a JS engine.
//!
//! Two independently garbage-collected runtimes in one process share object
//! references across the language boundary.  Without coordination those
//! references either leak (each VM keeps the other's garbage alive) or get
//! collected mid-trace (a dangling cross-VM handle).  This crate is the
//! coordination layer: it interleaves the two tracing collectors through a
//! rendezvous protocol with dynamic membership, marks the transitive closure
//! reachable through shared references, and sweeps the edges neither VM can
//! reach.
//!
//! The crate owns no heap and spawns no threads.  The host collector drives
//! the [`Xgc`] coordinator through the [`vm::GCListener`] callback contract;
//! the foreign engine drives into it through [`vm::HostVmInterface`]; the
//! embedder implements [`vm::HostVm`] and [`vm::ForeignVmAdaptor`] over the
//! two runtimes and [`SharedReferenceStorage`] over its cross-reference
//! table.

#[macro_use]
extern crate log;

mod barrier;
mod remset;
mod session;
mod storage;
mod trigger;
mod xgc;

pub mod util;
pub mod vm;

pub use crate::barrier::VmBarrier;
pub use crate::remset::RememberedSet;
pub use crate::session::MarkingSession;
pub use crate::storage::{SharedReference, SharedReferenceStorage, HAS_ETS_FLAG, HAS_JS_FLAG};
pub use crate::trigger::{TriggerPolicy, XgcTrigger};
pub use crate::xgc::{Xgc, XgcBuildError};
