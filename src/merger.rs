use std::collections::BinaryHeap;

use crate::frequency_table::FrequencyTable;
use crate::heap_entry::HeapEntry;
use crate::run_store::{RunCursor, RunHandle, RunStore, RunWriter};

/// Statistics of one k-way merge.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MergeSummary {
    pub runs: usize,
    pub records_read: usize,
    pub records_written: usize,
    pub flushes: usize,
    pub peak_buffer: usize,
}

/// Merges sorted runs into a single sorted run, summing the counts of equal tokens.
///
/// Merged records are collected in a [FrequencyTable] of at most `buffer_capacity` distinct
/// tokens which is flushed to the output run whenever a new token would not fit.
pub struct KWayMerger<'a, S: RunStore> {
    store: &'a S,
    buffer_capacity: usize,
}

impl<'a, S: RunStore> KWayMerger<'a, S> {
    pub fn new(store: &'a S, buffer_capacity: usize) -> KWayMerger<'a, S> {
        KWayMerger {
            store,
            buffer_capacity,
        }
    }

    /// Merge `runs` into a new run. The input runs are left in the store.
    pub fn merge(&self, runs: &[RunHandle]) -> Result<(RunHandle, MergeSummary), anyhow::Error> {
        let mut summary = MergeSummary {
            runs: runs.len(),
            ..MergeSummary::default()
        };

        let mut cursors = Vec::with_capacity(runs.len());
        let mut heap = BinaryHeap::with_capacity(runs.len());
        for (source, handle) in runs.iter().enumerate() {
            let mut cursor = self.store.open(*handle)?;
            if let Some(record) = cursor.next_record()? {
                summary.records_read += 1;
                heap.push(HeapEntry::new(record, source));
            }
            cursors.push(cursor);
        }

        let (merged, mut writer) = self.store.create()?;
        let mut buffer = FrequencyTable::new(self.buffer_capacity);

        while let Some(entry) = heap.pop() {
            // the heap yields tokens in ascending order, so every buffered token is complete
            if buffer.would_overflow(entry.token()) {
                summary.records_written += Self::flush(&mut buffer, &mut writer)?;
                summary.flushes += 1;
            }
            let source = entry.source();
            let (token, count) = entry.into_record().into_parts();
            buffer.add_owned(token, count)?;

            if let Some(record) = cursors[source].next_record()? {
                summary.records_read += 1;
                heap.push(HeapEntry::new(record, source));
            }
        }

        if !buffer.is_empty() {
            summary.records_written += Self::flush(&mut buffer, &mut writer)?;
            summary.flushes += 1;
        }
        writer.finish()?;
        summary.peak_buffer = buffer.peak();

        log::debug!(
            "Merged {} runs into {}, read: {}, written: {}, flushes: {}",
            summary.runs,
            merged,
            summary.records_read,
            summary.records_written,
            summary.flushes
        );
        Ok((merged, summary))
    }

    fn flush(buffer: &mut FrequencyTable, writer: &mut S::Writer) -> Result<usize, anyhow::Error> {
        let records = buffer.take_sorted();
        for record in &records {
            writer.write(record)?;
        }
        Ok(records.len())
    }
}
