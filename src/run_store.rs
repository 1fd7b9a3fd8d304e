use std::fmt::{Display, Formatter};

use crate::record::CountRecord;

/// Identifies a run inside a [RunStore].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RunHandle(usize);

impl RunHandle {
    pub(crate) fn new(id: usize) -> RunHandle {
        RunHandle(id)
    }

    pub fn id(&self) -> usize {
        self.0
    }
}

impl Display for RunHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Appends records to a run under construction.
///
/// Records must be written in strictly ascending token order. The run becomes readable after
/// [RunWriter::finish].
pub trait RunWriter {
    fn write(&mut self, record: &CountRecord) -> Result<(), anyhow::Error>;

    /// Complete the run, returning the number of records written.
    fn finish(self) -> Result<usize, anyhow::Error>;
}

/// Forward-only reader over the records of a run.
pub trait RunCursor {
    /// The next record, or `None` at the end of the run. Malformed records are skipped.
    fn next_record(&mut self) -> Result<Option<CountRecord>, anyhow::Error>;
}

/// Storage for runs.
///
/// Runs are created by run building and merging, read exactly once by the next merge and then
/// deleted. The store is shared between merge workers, so all operations take `&self`.
pub trait RunStore: Send + Sync {
    type Writer: RunWriter;
    type Cursor: RunCursor;

    fn create(&self) -> Result<(RunHandle, Self::Writer), anyhow::Error>;

    fn open(&self, handle: RunHandle) -> Result<Self::Cursor, anyhow::Error>;

    fn delete(&self, handle: RunHandle) -> Result<(), anyhow::Error>;

    /// Write already sorted records as a new run.
    fn write_run(&self, records: &[CountRecord]) -> Result<RunHandle, anyhow::Error> {
        let (handle, mut writer) = self.create()?;
        for record in records {
            writer.write(record)?;
        }
        writer.finish()?;
        Ok(handle)
    }
}
