use tracing::{debug, warn};

use crate::dom_snapshot::{DomElement, DomSnapshot};

/// One heuristic in a finder chain.
#[derive(Clone, Copy)]
pub struct FinderStrategy {
    pub name: &'static str,
    /// Positional or otherwise layout-dependent; logged when it is the one that
    /// matched.
    pub brittle: bool,
    pub locate: fn(&DomSnapshot) -> Option<&DomElement>,
}

impl std::fmt::Debug for FinderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderStrategy")
            .field("name", &self.name)
            .field("brittle", &self.brittle)
            .finish()
    }
}

/// An ordered fallback chain locating one control. The first strategy that
/// returns an element wins; no match is "not ready yet", never an error.
#[derive(Debug, Clone, Copy)]
pub struct ElementFinder {
    pub name: &'static str,
    /// CSS selector for the candidate elements the snapshot must capture.
    pub snapshot_selector: &'static str,
    pub strategies: &'static [FinderStrategy],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinderMatch<'a> {
    pub element: &'a DomElement,
    pub strategy: &'static str,
    pub brittle: bool,
}

impl ElementFinder {
    pub fn find<'a>(&self, snapshot: &'a DomSnapshot) -> Option<FinderMatch<'a>> {
        for strategy in self.strategies {
            if let Some(element) = (strategy.locate)(snapshot) {
                if strategy.brittle {
                    warn!(
                        finder = self.name,
                        strategy = strategy.name,
                        "matched through positional fallback"
                    );
                } else {
                    debug!(finder = self.name, strategy = strategy.name, "element located");
                }
                return Some(FinderMatch {
                    element,
                    strategy: strategy.name,
                    brittle: strategy.brittle,
                });
            }
        }
        None
    }

    /// Runs the chain per document, in order, returning the first hit.
    pub fn find_in<'a>(&self, snapshots: &'a [DomSnapshot]) -> Option<FinderMatch<'a>> {
        snapshots.iter().find_map(|snapshot| self.find(snapshot))
    }
}
