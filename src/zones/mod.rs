pub mod deserialise;

use crate::protocol::types::{DomainName, ResourceRecord};

/// The record set served authoritatively: the records from the zone
/// file, in insertion order, matched by exact name.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Zone {
    records: Vec<ResourceRecord>,
}

impl Zone {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn insert(&mut self, rr: ResourceRecord) {
        self.records.push(rr);
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The index of the next record whose name is exactly `name`,
    /// scanning forwards from just after `after` (or from the start).
    /// Iterate every match for a name by feeding each result back in.
    pub fn find_next_match(&self, name: &DomainName, after: Option<usize>) -> Option<usize> {
        let start = after.map_or(0, |i| i + 1);
        if start >= self.records.len() {
            return None;
        }

        self.records[start..]
            .iter()
            .position(|rr| rr.name == *name)
            .map(|offset| start + offset)
    }
}
