use std::cmp::Ordering;

use crate::record::CountRecord;

/// The current head record of one run being merged.
///
/// Comparison is flipped so that [std::collections::BinaryHeap], a max heap, pops the smallest
/// token first. Equal tokens pop in ascending source order.
#[derive(Debug)]
pub(crate) struct HeapEntry {
    record: CountRecord,
    source: usize,
}

impl HeapEntry {
    pub(crate) fn new(record: CountRecord, source: usize) -> HeapEntry {
        HeapEntry {
            record,
            source,
        }
    }

    pub(crate) fn token(&self) -> &str {
        self.record.token()
    }

    pub(crate) fn source(&self) -> usize {
        self.source
    }

    pub(crate) fn into_record(self) -> CountRecord {
        self.record
    }
}

impl Eq for HeapEntry {}

impl PartialEq<Self> for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.token() == other.token() && self.source == other.source
    }
}

impl PartialOrd<Self> for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.token()
            .cmp(self.token())
            .then_with(|| other.source.cmp(&self.source))
    }
}
