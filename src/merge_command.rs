use std::sync::{Arc, Mutex};

use command_executor::command::Command;

use crate::merger::{KWayMerger, MergeSummary};
use crate::run_store::{RunHandle, RunStore};

pub(crate) type MergeResult = Result<(RunHandle, MergeSummary), anyhow::Error>;
pub(crate) type MergeResults = Arc<Mutex<Vec<Option<MergeResult>>>>;

/// Merge a batch of runs and delete the batch once the merged run is complete.
pub(crate) fn merge_batch<S: RunStore>(store: &S, batch: &[RunHandle], buffer_capacity: usize) -> MergeResult {
    let merger = KWayMerger::new(store, buffer_capacity);
    let (merged, summary) = merger.merge(batch)?;
    for handle in batch {
        store.delete(*handle)?;
    }
    Ok((merged, summary))
}

/// One batch of a concurrent merge round.
///
/// The outcome is stored in `results[slot]` so that the round can be collected in batch order.
pub(crate) struct MergeCommand<S: RunStore + 'static> {
    store: Arc<S>,
    batch: Vec<RunHandle>,
    buffer_capacity: usize,
    slot: usize,
    results: MergeResults,
}

impl<S: RunStore + 'static> MergeCommand<S> {
    pub(crate) fn new(store: Arc<S>, batch: Vec<RunHandle>, buffer_capacity: usize, slot: usize, results: MergeResults) -> MergeCommand<S> {
        MergeCommand {
            store,
            batch,
            buffer_capacity,
            slot,
            results,
        }
    }
}

impl<S: RunStore + 'static> Command for MergeCommand<S> {
    fn execute(&self) -> Result<(), anyhow::Error> {
        let result = merge_batch(self.store.as_ref(), &self.batch, self.buffer_capacity);
        if let Err(e) = &result {
            log::error!("Failed to merge batch {}: {:#}", self.slot, e);
        }
        // failures are reported through the result slot and fail the whole round
        let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results[self.slot] = Some(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use command_executor::command::Command;

    use crate::memory_run_store::MemoryRunStore;
    use crate::merge_command::{merge_batch, MergeCommand};
    use crate::record::CountRecord;
    use crate::run_store::RunStore;

    #[test]
    fn test_merge_batch_deletes_inputs() -> Result<(), anyhow::Error> {
        let store = MemoryRunStore::new();
        let first = store.write_run(&[CountRecord::new("a".to_string(), 1)])?;
        let second = store.write_run(&[CountRecord::new("a".to_string(), 2)])?;
        let (merged, _summary) = merge_batch(&store, &[first, second], 8)?;
        assert_eq!(store.live_runs(), 1);
        assert_eq!(store.records(merged).unwrap(), vec![CountRecord::new("a".to_string(), 3)]);
        Ok(())
    }

    #[test]
    fn test_execute_fills_slot() -> Result<(), anyhow::Error> {
        let store = Arc::new(MemoryRunStore::new());
        let run = store.write_run(&[CountRecord::new("z".to_string(), 4)])?;
        let results = Arc::new(Mutex::new(vec![None, None]));

        MergeCommand::new(store.clone(), vec![run], 8, 1, results.clone()).execute()?;
        // the run is gone, merging it again fails
        MergeCommand::new(store.clone(), vec![run], 8, 0, results.clone()).execute()?;

        let mut results = results.lock().unwrap();
        assert!(matches!(results[0].take(), Some(Err(_))));
        let (merged, summary) = results[1].take().unwrap()?;
        assert_eq!(summary.records_written, 1);
        assert_eq!(store.records(merged).unwrap(), vec![CountRecord::new("z".to_string(), 4)]);
        Ok(())
    }
}
