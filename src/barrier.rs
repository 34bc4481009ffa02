//! This module contains `VmBarrier`, the rendezvous primitive that keeps the
//! two collectors in step.  Its purposes include:
//!
//! -   letting a dynamic set of VM participants rendezvous at the checkpoints
//!     of a cross-reference marking cycle,
//! -   letting any waiter bail out of a checkpoint early when its "no work
//!     remains" predicate holds, and
//! -   letting outside threads poke waiters so they re-evaluate the predicate.

use std::sync::{Condvar, Mutex, MutexGuard};

/// A multi-party rendezvous barrier with dynamic membership.
///
/// There is one instance per coordinator.  The registered participant count
/// can change between cycles via [`VmBarrier::increment`] and
/// [`VmBarrier::decrement`], but the arrival target of a running cycle is
/// frozen when the cycle's first checkpoint ([`VmBarrier::initial_wait`])
/// snapshots it.  Attach and detach while a cycle runs therefore only affect
/// the next cycle.
pub struct VmBarrier {
    /// The synchronized part.
    sync: Mutex<BarrierSync>,
    /// Waiters block on this.  Notified when the epoch advances, when the
    /// membership shrinks, and on [`VmBarrier::signal`].
    rendezvous: Condvar,
}

/// The synchronized part of `VmBarrier`.
struct BarrierSync {
    /// Registered participant count.  Always at least 1 (the host VM).
    registered: usize,
    /// Arrival target of the current cycle, snapshotted from `registered` by
    /// `initial_wait`.
    cycle_target: usize,
    /// Number of waiters that arrived at the current checkpoint.
    arrived: usize,
    /// Incremented once per completed rendezvous round.
    epoch: u64,
    /// Incremented on every wakeup that is *not* an epoch advance.  Waiters
    /// use it to tell "the barrier advanced" apart from "re-check your
    /// predicate" without losing wakeups.
    weak_wakeups: u64,
}

impl VmBarrier {
    /// Create a barrier for `participants` initial members.
    pub fn new(participants: usize) -> Self {
        assert!(participants >= 1, "VmBarrier needs at least one participant");
        Self {
            sync: Mutex::new(BarrierSync {
                registered: participants,
                cycle_target: participants,
                arrived: 0,
                epoch: 0,
                weak_wakeups: 0,
            }),
            rendezvous: Default::default(),
        }
    }

    /// Register one more participant.  Takes effect at the next
    /// `initial_wait` snapshot.
    pub fn increment(&self) {
        let mut sync = self.sync.lock().unwrap();
        sync.registered += 1;
        trace!("VmBarrier: participant registered, now {}", sync.registered);
    }

    /// Unregister a participant and wake waiters so they re-check their
    /// predicates.  Aborts the process if the count would drop below 1: a
    /// barrier without its host participant cannot be safely continued.
    pub fn decrement(&self) {
        let mut sync = self.sync.lock().unwrap();
        assert!(
            sync.registered > 1,
            "VmBarrier participant count underflow: the host participant must remain registered"
        );
        sync.registered -= 1;
        trace!("VmBarrier: participant unregistered, now {}", sync.registered);
        self.wake_for_recheck(&mut sync);
    }

    /// The first checkpoint of a cycle.  Snapshots the committed participant
    /// count as this cycle's arrival target, then behaves like
    /// [`VmBarrier::wait`].
    pub fn initial_wait(&self, no_work: &dyn Fn() -> bool) -> bool {
        let mut sync = self.sync.lock().unwrap();
        sync.cycle_target = sync.registered;
        trace!("VmBarrier: cycle target frozen at {}", sync.cycle_target);
        self.wait_with(sync, no_work)
    }

    /// Rendezvous at a checkpoint of the current cycle.
    ///
    /// Returns `true` if this waiter was counted as an arrival and the
    /// rendezvous completed (the epoch advanced).  Returns `false` if
    /// `no_work` reported that nothing remains to be done; in that case this
    /// call was not counted as an arrival and only the current checkpoint is
    /// abandoned, not the cycle.  The predicate is evaluated before blocking
    /// and after every wakeup.
    pub fn wait(&self, no_work: &dyn Fn() -> bool) -> bool {
        let sync = self.sync.lock().unwrap();
        self.wait_with(sync, no_work)
    }

    /// Wake every waiter without counting as an arrival, so they re-evaluate
    /// their predicates.
    pub fn signal(&self) {
        let mut sync = self.sync.lock().unwrap();
        self.wake_for_recheck(&mut sync);
    }

    /// The epoch counter.  Advances once per completed rendezvous round.
    pub fn epoch(&self) -> u64 {
        self.sync.lock().unwrap().epoch
    }

    /// The arrival target of the current cycle.
    pub(crate) fn cycle_target(&self) -> usize {
        self.sync.lock().unwrap().cycle_target
    }

    fn wake_for_recheck(&self, sync: &mut BarrierSync) {
        sync.weak_wakeups += 1;
        self.rendezvous.notify_all();
    }

    fn wait_with(
        &self,
        mut sync: MutexGuard<'_, BarrierSync>,
        no_work: &dyn Fn() -> bool,
    ) -> bool {
        if no_work() {
            trace!("VmBarrier: no work at checkpoint entry, skipping");
            return false;
        }

        sync.arrived += 1;
        trace!(
            "VmBarrier: arrived {}/{} (epoch {})",
            sync.arrived,
            sync.cycle_target,
            sync.epoch
        );
        assert!(
            sync.arrived <= sync.cycle_target,
            "VmBarrier: more arrivals ({}) than the frozen cycle target ({})",
            sync.arrived,
            sync.cycle_target
        );

        if sync.arrived == sync.cycle_target {
            // Last arrival of this round: advance the epoch and release
            // everyone blocked at this checkpoint.
            sync.arrived = 0;
            sync.epoch += 1;
            trace!("VmBarrier: rendezvous complete, epoch now {}", sync.epoch);
            self.rendezvous.notify_all();
            return true;
        }

        loop {
            let entry_epoch = sync.epoch;
            let seen_weak = sync.weak_wakeups;
            // The two counters let us tell a completed rendezvous apart from
            // a weak wakeup (signal/detach) and from a spurious one.
            while sync.epoch == entry_epoch && sync.weak_wakeups == seen_weak {
                sync = self.rendezvous.wait(sync).unwrap();
            }
            if sync.epoch != entry_epoch {
                return true;
            }
            if no_work() {
                // Abandon this checkpoint: our arrival must not be counted,
                // or a later round would complete short.
                debug_assert!(sync.arrived > 0);
                sync.arrived -= 1;
                trace!("VmBarrier: no work after wakeup, withdrawing arrival");
                return false;
            }
        }
    }
}
