//! TriggerPolicy decides whether a host collection should also run a
//! cross-reference cycle.  All decisions about the storage-size threshold
//! live here.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::util::options::Options;

/// The triggering policy.
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TriggerPolicy {
    /// Trigger when the storage size passes the adaptive threshold.
    Default,
    /// Trigger on every host collection.  For stress testing.
    Force,
    /// Never trigger.
    Never,
}

/// Size-threshold heuristic for the [`TriggerPolicy::Default`] policy.
///
/// The threshold is recomputed at the end of every cycle from the post-sweep
/// storage size, grown by a fixed percentage, and never drops below the
/// minimal threshold.  Below the minimal threshold a cycle is never worth
/// its rendezvous cost regardless of growth.
pub struct XgcTrigger {
    policy: TriggerPolicy,
    minimal_threshold: usize,
    growth_percent: usize,
    /// Storage size at which the next cycle triggers.
    threshold: AtomicUsize,
}

impl XgcTrigger {
    pub fn new(options: &Options) -> Self {
        Self {
            policy: options.trigger_policy,
            minimal_threshold: options.minimal_threshold,
            growth_percent: options.growth_percent,
            threshold: AtomicUsize::new(options.minimal_threshold),
        }
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// Should a cross-reference cycle run, given the current storage size?
    pub fn is_gc_required(&self, storage_size: usize) -> bool {
        match self.policy {
            TriggerPolicy::Never => false,
            TriggerPolicy::Force => true,
            TriggerPolicy::Default => {
                if storage_size < self.minimal_threshold {
                    return false;
                }
                storage_size >= self.threshold.load(Ordering::Relaxed)
            }
        }
    }

    /// Recompute the next cycle's threshold from the post-sweep storage
    /// size.
    pub fn on_cycle_end(&self, post_sweep_size: usize) {
        let grown = post_sweep_size + post_sweep_size * self.growth_percent / 100;
        let new_threshold = grown.max(self.minimal_threshold);
        debug!(
            "XgcTrigger: new threshold = {} (post-sweep size {}, growth {}%, floor {})",
            new_threshold, post_sweep_size, self.growth_percent, self.minimal_threshold
        );
        self.threshold.store(new_threshold, Ordering::Relaxed);
    }

    pub fn threshold(&self) -> usize {
        self.threshold.load(Ordering::Relaxed)
    }
}
