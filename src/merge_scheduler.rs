use std::cmp::{max, min};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool_builder::ThreadPoolBuilder;

use crate::merge_command::{merge_batch, MergeCommand, MergeResult, MergeResults};
use crate::merger::MergeSummary;
use crate::run_store::{RunHandle, RunStore};

/// Statistics of a complete multi round merge.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScheduleSummary {
    pub rounds: usize,
    pub merges: usize,
    pub peak_buffer: usize,
}

/// Reduces a list of runs to a single run in rounds of batch merges.
///
/// Each round splits the runs into consecutive batches of at most `fan_in` runs, merges every
/// batch and deletes its inputs. With more than one task the batches of a round are merged on a
/// thread pool; the round completes only when every batch has been merged.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use text_file_count::memory_run_store::MemoryRunStore;
/// use text_file_count::merge_scheduler::MergeScheduler;
/// use text_file_count::record::CountRecord;
/// use text_file_count::run_store::RunStore;
///
/// let store = Arc::new(MemoryRunStore::new());
/// let runs = vec![
///     store.write_run(&[CountRecord::new("a".to_string(), 1)]).unwrap(),
///     store.write_run(&[CountRecord::new("a".to_string(), 2)]).unwrap(),
///     store.write_run(&[CountRecord::new("b".to_string(), 1)]).unwrap(),
/// ];
/// let scheduler = MergeScheduler::new(store.clone(), 2, 2);
/// let (merged, summary) = scheduler.merge(runs).unwrap();
/// let records = store.records(merged.unwrap()).unwrap();
/// assert_eq!(records, vec![CountRecord::new("a".to_string(), 3), CountRecord::new("b".to_string(), 1)]);
/// assert_eq!(summary.rounds, 2);
/// ```
pub struct MergeScheduler<S: RunStore + 'static> {
    store: Arc<S>,
    fan_in: usize,
    buffer_capacity: usize,
    tasks: usize,
    queue_size: usize,
}

impl<S: RunStore + 'static> MergeScheduler<S> {
    /// A sequential scheduler. A `fan_in` below 2 is raised to 2.
    pub fn new(store: Arc<S>, fan_in: usize, buffer_capacity: usize) -> MergeScheduler<S> {
        MergeScheduler {
            store,
            fan_in: max(fan_in, 2),
            buffer_capacity,
            tasks: 1,
            queue_size: 4096,
        }
    }

    /// Merge the batches of a round on up to `tasks` threads.
    pub fn with_tasks(mut self, tasks: usize) -> MergeScheduler<S> {
        self.tasks = max(tasks, 1);
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> MergeScheduler<S> {
        self.queue_size = max(queue_size, 1);
        self
    }

    /// Merge `runs` until one run is left and return it. No runs yield `None`.
    pub fn merge(&self, runs: Vec<RunHandle>) -> Result<(Option<RunHandle>, ScheduleSummary), anyhow::Error> {
        let mut summary = ScheduleSummary::default();
        let mut runs = runs;
        while runs.len() > 1 {
            summary.rounds += 1;
            let batches: Vec<Vec<RunHandle>> = runs
                .chunks(self.fan_in)
                .map(|batch| batch.to_vec())
                .collect();
            log::info!(
                "Merge round {}: {} runs in {} batches, fan-in: {}",
                summary.rounds,
                runs.len(),
                batches.len(),
                self.fan_in
            );

            let results = if self.tasks > 1 && batches.len() > 1 {
                self.merge_concurrently(batches)?
            } else {
                self.merge_sequentially(batches)?
            };

            runs = Vec::with_capacity(results.len());
            for (merged, merge_summary) in results {
                summary.merges += 1;
                summary.peak_buffer = max(summary.peak_buffer, merge_summary.peak_buffer);
                runs.push(merged);
            }
        }
        log::info!("Finished merging in {} rounds, {} merges", summary.rounds, summary.merges);
        Ok((runs.pop(), summary))
    }

    fn merge_sequentially(&self, batches: Vec<Vec<RunHandle>>) -> Result<Vec<(RunHandle, MergeSummary)>, anyhow::Error> {
        batches.iter()
            .map(|batch| merge_batch(self.store.as_ref(), batch, self.buffer_capacity))
            .collect()
    }

    fn merge_concurrently(&self, batches: Vec<Vec<RunHandle>>) -> Result<Vec<(RunHandle, MergeSummary)>, anyhow::Error> {
        let results: MergeResults = Arc::new(Mutex::new((0..batches.len()).map(|_| None).collect()));
        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let mut merging_pool = thread_pool_builder
            .with_name("merging".to_string())
            .with_tasks(min(self.tasks, batches.len()))
            .with_queue_size(self.queue_size)
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()
            .map_err(|e| anyhow!("Failed to build merging pool: {:?}", e))?;

        for (slot, batch) in batches.into_iter().enumerate() {
            let merge_command = Box::new(
                MergeCommand::new(self.store.clone(), batch, self.buffer_capacity, slot, results.clone())
            );
            merging_pool.submit(merge_command);
        }
        merging_pool.shutdown();
        merging_pool.join()?;

        let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *results)
            .into_iter()
            .enumerate()
            .map(|(slot, result): (usize, Option<MergeResult>)| {
                result.unwrap_or_else(|| Err(anyhow!("Batch {} was not merged", slot)))
            })
            .collect()
    }
}
