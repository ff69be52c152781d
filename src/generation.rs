//! Generation tagging for concurrent resolution chains.
//!
//! Every chain (startup, `refetch`, provider event, logout) takes a
//! [`Generation`] before its first suspension point. A result is committed
//! only if its generation is not older than the last committed one, so the
//! most recently started chain that commits wins no matter which network call
//! returned first.

use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::Display;

/// Monotonic tag of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Issues strictly increasing generations.
#[derive(Debug, Default)]
pub(crate) struct GenerationCounter {
    last: AtomicU64,
}

impl GenerationCounter {
    pub(crate) fn next(&self) -> Generation {
        Generation(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Tracks the newest committed generation.
///
/// Callers hold this under the same lock as the state they mutate, so
/// admission and mutation happen as one step.
#[derive(Debug, Default)]
pub(crate) struct CommitGate {
    committed: Generation,
}

impl CommitGate {
    /// Admit `generation` unless a newer one has already committed.
    /// The same generation may commit more than once (e.g. startup commits
    /// `Unauthenticated` and later the bridged identity).
    pub(crate) fn admit(&mut self, generation: Generation) -> bool {
        if generation < self.committed {
            return false;
        }
        self.committed = generation;
        true
    }

    pub(crate) fn committed(&self) -> Generation {
        self.committed
    }
}
