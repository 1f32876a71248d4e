//! Outcomes of engine passes.

use std::collections::BTreeMap;

/// Why a branch of a search was dropped. These are normal outcomes of a
/// graph with cycles and several sources, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Abandon {
    /// An identical sibling circuit already exists.
    Duplicate,
    /// The candidate revisits a node contact/pole already on the path.
    Cycle,
    /// The cable loops back into the contact it came from.
    SelfLoop,
    /// Recursion went past the configured depth.
    DepthLimit,
    /// The dangling contact already carries voltage.
    AlreadyPowered,
    /// Entering a contact through which a circuit already leaves.
    Backfeed,
    /// Reached a different power source.
    ForeignSource,
    /// Returned to the own source on the pole it left from.
    SamePoleReturn,
}

/// Summary of what one public operation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub created: usize,
    pub extended: usize,
    pub closed: usize,
    pub split: usize,
    pub truncated: usize,
    pub deleted: usize,
    pub abandoned: BTreeMap<Abandon, usize>,
}

impl PassReport {
    pub(crate) fn abandon(&mut self, why: Abandon) {
        *self.abandoned.entry(why).or_insert(0) += 1;
    }

    pub fn abandoned(&self, why: Abandon) -> usize {
        self.abandoned.get(&why).copied().unwrap_or(0)
    }

    /// True if the pass changed no circuit.
    pub fn is_quiet(&self) -> bool {
        self.created == 0
            && self.extended == 0
            && self.closed == 0
            && self.split == 0
            && self.truncated == 0
            && self.deleted == 0
    }

    pub fn merge(&mut self, other: PassReport) {
        self.created += other.created;
        self.extended += other.extended;
        self.closed += other.closed;
        self.split += other.split;
        self.truncated += other.truncated;
        self.deleted += other.deleted;
        for (why, n) in other.abandoned {
            *self.abandoned.entry(why).or_insert(0) += n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_counts() {
        let mut a = PassReport::default();
        a.created = 1;
        a.abandon(Abandon::Cycle);
        let mut b = PassReport::default();
        b.abandon(Abandon::Cycle);
        b.abandon(Abandon::DepthLimit);
        a.merge(b);
        assert_eq!(a.abandoned(Abandon::Cycle), 2);
        assert_eq!(a.abandoned(Abandon::DepthLimit), 1);
        assert_eq!(a.abandoned(Abandon::Backfeed), 0);
        assert!(!a.is_quiet());
    }
}
