//! Active fault and warning tracking for one device.

use std::collections::BTreeSet;

use tracing::debug;

use crate::types::Condition;

/// Set of currently active faults and warnings.
///
/// Membership is idempotent: every add/clear reports whether it changed the
/// set, so callers can tell a first-time add from a repeat.
#[derive(Debug, Clone)]
pub struct FaultWarningAggregator<F, W> {
    faults: BTreeSet<F>,
    warnings: BTreeSet<W>,
}

impl<F: Condition, W: Condition> FaultWarningAggregator<F, W> {
    pub fn new() -> Self {
        Self {
            faults: BTreeSet::new(),
            warnings: BTreeSet::new(),
        }
    }

    /// Returns `true` if `fault` was not already active.
    pub fn add_fault(&mut self, fault: F) -> bool {
        let added = self.faults.insert(fault);
        if !added {
            debug!("Fault {} already active", fault);
        }
        added
    }

    /// Returns `true` if `fault` was active and has been removed.
    pub fn clear_fault(&mut self, fault: F) -> bool {
        let removed = self.faults.remove(&fault);
        if !removed {
            debug!("Fault {} was not active", fault);
        }
        removed
    }

    pub fn add_warning(&mut self, warning: W) -> bool {
        let added = self.warnings.insert(warning);
        if !added {
            debug!("Warning {} already active", warning);
        }
        added
    }

    pub fn clear_warning(&mut self, warning: W) -> bool {
        let removed = self.warnings.remove(&warning);
        if !removed {
            debug!("Warning {} was not active", warning);
        }
        removed
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn faults(&self) -> &BTreeSet<F> {
        &self.faults
    }

    pub fn warnings(&self) -> &BTreeSet<W> {
        &self.warnings
    }

    /// Forget everything. Used on reconnect, when the hardware re-reports.
    pub fn clear(&mut self) {
        self.faults.clear();
        self.warnings.clear();
    }
}

impl<F: Condition, W: Condition> Default for FaultWarningAggregator<F, W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    enum Tag {
        A,
        B,
        C,
    }

    impl fmt::Display for Tag {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    type Aggregator = FaultWarningAggregator<Tag, Tag>;

    #[test]
    fn test_add_fault_twice() {
        let mut aggregator = Aggregator::new();
        assert!(aggregator.add_fault(Tag::A));
        assert!(!aggregator.add_fault(Tag::A));
        assert_eq!(aggregator.faults().len(), 1);
    }

    #[test]
    fn test_clear_absent_fault() {
        let mut aggregator = Aggregator::new();
        assert!(!aggregator.clear_fault(Tag::B));

        aggregator.add_fault(Tag::B);
        assert!(aggregator.clear_fault(Tag::B));
        assert!(!aggregator.clear_fault(Tag::B));
        assert!(!aggregator.has_faults());
    }

    #[test]
    fn test_warnings_are_independent() {
        let mut aggregator = Aggregator::new();
        assert!(aggregator.add_warning(Tag::A));
        assert!(!aggregator.has_faults());
        assert!(aggregator.add_fault(Tag::A));
        assert!(aggregator.clear_warning(Tag::A));
        assert!(aggregator.has_faults());
    }

    #[test]
    fn test_clear_all() {
        let mut aggregator = Aggregator::new();
        aggregator.add_fault(Tag::A);
        aggregator.add_warning(Tag::C);
        aggregator.clear();
        assert!(aggregator.faults().is_empty());
        assert!(aggregator.warnings().is_empty());
    }

    fn any_tag() -> impl Strategy<Value = Tag> {
        prop_oneof![Just(Tag::A), Just(Tag::B), Just(Tag::C)]
    }

    proptest! {
        #[test]
        fn prop_add_reports_first_insert_only(ops in proptest::collection::vec((any_tag(), any::<bool>()), 0..64)) {
            let mut aggregator = Aggregator::new();
            let mut model = BTreeSet::new();
            for (tag, add) in ops {
                if add {
                    prop_assert_eq!(aggregator.add_fault(tag), model.insert(tag));
                } else {
                    prop_assert_eq!(aggregator.clear_fault(tag), model.remove(&tag));
                }
                prop_assert_eq!(aggregator.faults(), &model);
            }
        }
    }
}
