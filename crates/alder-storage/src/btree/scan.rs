//! Range scan operators and the scan state machine.

use alder_buffer::PinnedPage;

/// Comparison operators accepted by `start_scan`.
///
/// The lower bound takes `Gt`/`Gte`, the upper bound `Lt`/`Lte`. Equality
/// scans are expressed as `Gte`/`Lte` with equal bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl Operator {
    /// Returns true if this operator is legal as a scan lower bound.
    pub(crate) fn is_lower_bound(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    /// Returns true if this operator is legal as a scan upper bound.
    pub(crate) fn is_upper_bound(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }
}

/// State of the engine's range scan.
///
/// `Positioned` owns the pin on the current leaf; it is the only pin the
/// engine holds between public calls. `Exhausted` keeps the scan active
/// (so `end_scan` succeeds and `scan_next` keeps reporting completion)
/// but holds no pin.
pub(crate) enum ScanState<K> {
    /// No scan in progress.
    Idle,
    /// Scan positioned on a leaf entry.
    Positioned {
        /// The pinned current leaf.
        leaf: PinnedPage,
        /// Slot of the next entry to emit.
        slot: usize,
        /// Upper bound key.
        high: K,
        /// True when the upper bound operator is LTE.
        high_inclusive: bool,
    },
    /// Scan ran off the end of the leaf chain.
    Exhausted,
}

impl<K> ScanState<K> {
    /// Returns true unless the state is `Idle`.
    pub fn is_active(&self) -> bool {
        !matches!(self, ScanState::Idle)
    }
}
