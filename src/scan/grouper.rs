//! Connection grouping.
//!
//! Partitions a directory snapshot by physical endpoint so each controller is
//! connected to once per cycle, and builds the `(endpoint, tag)` index the
//! result mapper resolves responses through.

use std::collections::HashMap;

use crate::core::signal::{Endpoint, SignalEntry, SignalId};

/// All signals sharing one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionGroup {
    pub endpoint: Endpoint,
    /// Member signals, in directory order.
    pub signals: Vec<SignalId>,
    /// Distinct tags to read, in first-appearance order.
    pub tags: Vec<String>,
}

/// Lookup from `(endpoint, tag)` to the signals bound to it.
///
/// Built once per cycle. More than one signal maps to a tag only when
/// distinct devices behind the same endpoint name the same controller tag.
#[derive(Debug, Clone, Default)]
pub struct SignalIndex {
    by_endpoint: HashMap<Endpoint, HashMap<String, Vec<SignalId>>>,
}

impl SignalIndex {
    fn insert(&mut self, endpoint: &Endpoint, tag: &str, signal_id: SignalId) -> bool {
        let tags = self.by_endpoint.entry(endpoint.clone()).or_default();
        match tags.get_mut(tag) {
            Some(ids) => {
                ids.push(signal_id);
                false
            }
            None => {
                tags.insert(tag.to_string(), vec![signal_id]);
                true
            }
        }
    }

    /// Signals bound to `tag` on `endpoint`.
    pub fn lookup(&self, endpoint: &Endpoint, tag: &str) -> Option<&[SignalId]> {
        self.by_endpoint
            .get(endpoint)
            .and_then(|tags| tags.get(tag))
            .map(Vec::as_slice)
    }

    /// Number of indexed `(endpoint, tag)` pairs.
    pub fn len(&self) -> usize {
        self.by_endpoint.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_endpoint.is_empty()
    }
}

/// Output of [`group_signals`].
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// Groups in order of their endpoint's first appearance.
    pub groups: Vec<ConnectionGroup>,
    pub index: SignalIndex,
    /// Signals dropped for lacking an endpoint or a tag.
    pub excluded: usize,
}

impl Grouping {
    /// True if nothing can be scanned.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of grouped signals.
    pub fn signal_count(&self) -> usize {
        self.groups.iter().map(|g| g.signals.len()).sum()
    }

    /// Number of tag reads the cycle will request.
    pub fn tag_count(&self) -> usize {
        self.groups.iter().map(|g| g.tags.len()).sum()
    }
}

/// Partition `signals` by endpoint.
///
/// Every scannable signal lands in exactly one group, keyed by its
/// `(host, sub_unit)`. Input order only affects iteration order.
pub fn group_signals(signals: &[SignalEntry]) -> Grouping {
    let mut grouping = Grouping::default();
    let mut positions: HashMap<Endpoint, usize> = HashMap::new();

    for signal in signals {
        let endpoint = match &signal.endpoint {
            Some(ep) => ep,
            None => {
                grouping.excluded += 1;
                continue;
            }
        };
        let tag = signal.tag.trim();
        if tag.is_empty() {
            grouping.excluded += 1;
            continue;
        }

        let pos = *positions.entry(endpoint.clone()).or_insert_with(|| {
            grouping.groups.push(ConnectionGroup {
                endpoint: endpoint.clone(),
                signals: Vec::new(),
                tags: Vec::new(),
            });
            grouping.groups.len() - 1
        });

        let group = &mut grouping.groups[pos];
        group.signals.push(signal.signal_id);
        if grouping.index.insert(endpoint, tag, signal.signal_id) {
            group.tags.push(tag.to_string());
        }
    }

    grouping
}
