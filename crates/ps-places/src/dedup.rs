use std::collections::HashSet;

use crate::{cleaner::canonical_id, place::RawPlaceRecord};

/// Remembers which places have been seen so far, keyed by the id the cleaner
/// will give them.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a place is offered. Records without an id are
    /// always admitted; the cleaner rejects them later.
    pub fn admit(&mut self, record: &RawPlaceRecord) -> bool {
        match record.place_id().map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self.seen.insert(canonical_id(id)),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Keep the first record for every place id, in first-seen order.
pub fn dedup_by_place_id(records: Vec<RawPlaceRecord>) -> Vec<RawPlaceRecord> {
    let mut dedup = Deduplicator::new();
    records
        .into_iter()
        .filter(|record| dedup.admit(record))
        .collect()
}
