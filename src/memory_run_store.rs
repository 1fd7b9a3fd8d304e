use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::record::CountRecord;
use crate::run_store::{RunCursor, RunHandle, RunStore, RunWriter};

#[derive(Default)]
struct Arena {
    next: usize,
    runs: HashMap<RunHandle, Arc<Vec<CountRecord>>>,
    created: usize,
    deleted: usize,
}

/// A [RunStore] keeping runs in memory.
///
/// Writers reject records that are not strictly ascending, which makes this store useful for
/// verifying that run building and merging produce valid runs.
#[derive(Clone, Default)]
pub struct MemoryRunStore {
    arena: Arc<Mutex<Arena>>,
}

impl MemoryRunStore {
    pub fn new() -> MemoryRunStore {
        MemoryRunStore::default()
    }

    /// Number of runs created and not yet deleted.
    pub fn live_runs(&self) -> usize {
        self.lock().runs.len()
    }

    /// Total number of runs ever created.
    pub fn created_runs(&self) -> usize {
        self.lock().created
    }

    pub fn deleted_runs(&self) -> usize {
        self.lock().deleted
    }

    /// A copy of the records of a finished run.
    pub fn records(&self, handle: RunHandle) -> Option<Vec<CountRecord>> {
        self.lock()
            .runs
            .get(&handle)
            .map(|records| records.to_vec())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Arena> {
        // a poisoned arena is still consistent, every mutation is a single insert or remove
        self.arena.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct MemoryRunWriter {
    handle: RunHandle,
    records: Vec<CountRecord>,
    arena: Arc<Mutex<Arena>>,
}

impl RunWriter for MemoryRunWriter {
    fn write(&mut self, record: &CountRecord) -> Result<(), anyhow::Error> {
        if let Some(last) = self.records.last() {
            if last.token() >= record.token() {
                return Err(
                    anyhow!(
                        "{}: record {:?} written after {:?}, runs must be strictly ascending",
                        self.handle,
                        record.token(),
                        last.token()
                    )
                );
            }
        }
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(self) -> Result<usize, anyhow::Error> {
        let len = self.records.len();
        let mut arena = self.arena.lock().unwrap_or_else(|e| e.into_inner());
        arena.runs.insert(self.handle, Arc::new(self.records));
        Ok(len)
    }
}

pub struct MemoryRunCursor {
    records: Arc<Vec<CountRecord>>,
    pos: usize,
}

impl RunCursor for MemoryRunCursor {
    fn next_record(&mut self) -> Result<Option<CountRecord>, anyhow::Error> {
        let record = self.records.get(self.pos).cloned();
        if record.is_some() {
            self.pos += 1;
        }
        Ok(record)
    }
}

impl RunStore for MemoryRunStore {
    type Writer = MemoryRunWriter;
    type Cursor = MemoryRunCursor;

    fn create(&self) -> Result<(RunHandle, Self::Writer), anyhow::Error> {
        let mut arena = self.lock();
        let handle = RunHandle::new(arena.next);
        arena.next += 1;
        arena.created += 1;
        Ok(
            (
                handle,
                MemoryRunWriter {
                    handle,
                    records: Vec::new(),
                    arena: self.arena.clone(),
                }
            )
        )
    }

    fn open(&self, handle: RunHandle) -> Result<Self::Cursor, anyhow::Error> {
        let records = self.lock()
            .runs
            .get(&handle)
            .cloned()
            .ok_or_else(|| anyhow!("{}: no such run", handle))?;
        Ok(
            MemoryRunCursor {
                records,
                pos: 0,
            }
        )
    }

    fn delete(&self, handle: RunHandle) -> Result<(), anyhow::Error> {
        let mut arena = self.lock();
        arena.runs.remove(&handle).ok_or_else(|| anyhow!("{}: no such run", handle))?;
        arena.deleted += 1;
        Ok(())
    }
}
