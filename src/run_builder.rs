use crate::frequency_table::FrequencyTable;
use crate::run_store::{RunHandle, RunStore};

/// Aggregates a token stream into sorted, duplicate free runs.
///
/// Tokens are counted in a [FrequencyTable] of `capacity` distinct tokens. As soon as the table
/// is full it is written to the store as a new run and cleared.
///
/// # Examples
/// ```
/// use text_file_count::memory_run_store::MemoryRunStore;
/// use text_file_count::run_builder::RunBuilder;
///
/// let store = MemoryRunStore::new();
/// let mut builder = RunBuilder::new(&store, 2);
/// for token in ["a", "b", "a", "c"] {
///     builder.add(token).unwrap();
/// }
/// let runs = builder.finish().unwrap();
/// assert_eq!(runs.len(), 2);
/// ```
pub struct RunBuilder<'a, S: RunStore> {
    store: &'a S,
    table: FrequencyTable,
    runs: Vec<RunHandle>,
    tokens: u64,
}

impl<'a, S: RunStore> RunBuilder<'a, S> {
    pub fn new(store: &'a S, capacity: usize) -> RunBuilder<'a, S> {
        RunBuilder {
            store,
            table: FrequencyTable::new(capacity),
            runs: Vec::new(),
            tokens: 0,
        }
    }

    /// Count one occurrence of `token`. Blank tokens are ignored.
    pub fn add(&mut self, token: &str) -> Result<(), anyhow::Error> {
        if token.trim().is_empty() {
            return Ok(());
        }
        self.table.add(token, 1)?;
        self.tokens += 1;
        if self.table.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    /// Count every token of `tokens`, stopping at the first error.
    pub fn add_all<I, T>(&mut self, tokens: I) -> Result<(), anyhow::Error>
        where
            I: IntoIterator<Item=Result<T, anyhow::Error>>,
            T: AsRef<str>,
    {
        for token in tokens {
            self.add(token?.as_ref())?;
        }
        Ok(())
    }

    /// Write the table as a new run and clear it. Does nothing for an empty table.
    pub fn flush(&mut self) -> Result<(), anyhow::Error> {
        if self.table.is_empty() {
            return Ok(());
        }
        let records = self.table.take_sorted();
        let handle = self.store.write_run(&records)?;
        log::debug!("Flushed {} distinct tokens to {}", records.len(), handle);
        self.runs.push(handle);
        Ok(())
    }

    /// Number of non blank tokens counted so far.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Largest number of distinct tokens held in memory so far.
    pub fn peak_distinct(&self) -> usize {
        self.table.peak()
    }

    /// Flush what is left and return the runs in creation order.
    pub fn finish(mut self) -> Result<Vec<RunHandle>, anyhow::Error> {
        self.flush()?;
        log::info!("Built {} runs from {} tokens", self.runs.len(), self.tokens);
        Ok(self.runs)
    }
}
