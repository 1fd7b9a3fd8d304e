use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use tempfile::Builder;

use crate::record::{CountRecord, read_line_lossy};
use crate::run_store::{RunCursor, RunHandle, RunStore, RunWriter};

#[derive(Debug)]
struct RunFile {
    path: PathBuf,
    // adopted files belong to the caller and are never removed
    owned: bool,
}

/// A [RunStore] keeping each run in its own text file.
///
/// Runs are created as persisted temp files named `<prefix>XXXX<suffix>` in the temp directory.
#[derive(Debug)]
pub struct FileRunStore {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    next: AtomicUsize,
    files: Mutex<HashMap<RunHandle, RunFile>>,
}

impl FileRunStore {
    pub fn new(tmp: PathBuf, tmp_prefix: &str, tmp_suffix: &str) -> FileRunStore {
        FileRunStore {
            tmp,
            tmp_prefix: tmp_prefix.to_string(),
            tmp_suffix: tmp_suffix.to_string(),
            next: AtomicUsize::new(0),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Register an existing count file as a run. Deleting the run will not remove the file.
    pub fn adopt(&self, path: PathBuf) -> RunHandle {
        let handle = self.next_handle();
        self.lock().insert(handle, RunFile { path, owned: false });
        handle
    }

    pub fn path(&self, handle: RunHandle) -> Option<PathBuf> {
        self.lock().get(&handle).map(|run_file| run_file.path.clone())
    }

    /// Move a run to `target`, removing it from the store.
    ///
    /// Adopted runs are copied so the caller's file stays in place. An owned run that cannot be
    /// renamed, for example because `target` is on another file system, is copied and then
    /// removed.
    pub fn persist(&self, handle: RunHandle, target: &Path) -> Result<(), anyhow::Error> {
        let run_file = self.lock()
            .remove(&handle)
            .ok_or_else(|| anyhow!("{}: no such run", handle))?;
        if run_file.owned {
            if let Err(e) = std::fs::rename(&run_file.path, target) {
                log::info!("Rename {} to {} failed, copying instead, error: {}", run_file.path.to_string_lossy(), target.to_string_lossy(), e);
                Self::copy(&run_file.path, target)?;
                std::fs::remove_file(&run_file.path)
                    .with_context(|| format!("path: {}", run_file.path.to_string_lossy()))?;
            }
        } else {
            Self::copy(&run_file.path, target)?;
        }
        Ok(())
    }

    fn copy(source: &Path, target: &Path) -> Result<(), anyhow::Error> {
        std::fs::copy(source, target)
            .with_context(|| anyhow!("Copy {} to {}", source.to_string_lossy(), target.to_string_lossy()))?;
        Ok(())
    }

    fn next_handle(&self) -> RunHandle {
        RunHandle::new(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RunHandle, RunFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct FileRunWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

impl RunWriter for FileRunWriter {
    fn write(&mut self, record: &CountRecord) -> Result<(), anyhow::Error> {
        record.write_to(&mut self.writer)
            .with_context(|| format!("path: {}", self.path.to_string_lossy()))?;
        self.records += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<usize, anyhow::Error> {
        self.writer.flush()
            .with_context(|| format!("path: {}", self.path.to_string_lossy()))?;
        Ok(self.records)
    }
}

pub struct FileRunCursor {
    path: PathBuf,
    reader: BufReader<File>,
    bytes: Vec<u8>,
    line: String,
    line_number: usize,
}

impl RunCursor for FileRunCursor {
    fn next_record(&mut self) -> Result<Option<CountRecord>, anyhow::Error> {
        loop {
            let bytes = read_line_lossy(&mut self.reader, &mut self.bytes, &mut self.line)
                .with_context(|| format!("path: {}, line: {}", self.path.to_string_lossy(), self.line_number + 1))?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            match CountRecord::parse(&self.line) {
                Ok(record) => {
                    return Ok(Some(record));
                }
                Err(e) => {
                    log::warn!("Skipping malformed record, path: {}, line: {}, error: {}", self.path.to_string_lossy(), self.line_number, e);
                }
            }
        }
    }
}

impl RunStore for FileRunStore {
    type Writer = FileRunWriter;
    type Cursor = FileRunCursor;

    fn create(&self) -> Result<(RunHandle, Self::Writer), anyhow::Error> {
        let tmp_file = Builder::new()
            .prefix(&self.tmp_prefix)
            .suffix(&self.tmp_suffix)
            .tempfile_in(&self.tmp)
            .with_context(|| anyhow!("Failed to create new temp file in {}", self.tmp.to_string_lossy()))?;
        let (file, path) = tmp_file
            .keep()
            .map_err(|e| anyhow!("Failed to persist temp file: {}", e.to_string()))?;
        let handle = self.next_handle();
        self.lock().insert(handle, RunFile { path: path.clone(), owned: true });
        Ok(
            (
                handle,
                FileRunWriter {
                    path,
                    writer: BufWriter::new(file),
                    records: 0,
                }
            )
        )
    }

    fn open(&self, handle: RunHandle) -> Result<Self::Cursor, anyhow::Error> {
        let path = self.path(handle).ok_or_else(|| anyhow!("{}: no such run", handle))?;
        let file = File::open(&path).with_context(|| format!("path: {}", path.to_string_lossy()))?;
        Ok(
            FileRunCursor {
                path,
                reader: BufReader::new(file),
                bytes: Vec::new(),
                line: String::new(),
                line_number: 0,
            }
        )
    }

    fn delete(&self, handle: RunHandle) -> Result<(), anyhow::Error> {
        let run_file = self.lock()
            .remove(&handle)
            .ok_or_else(|| anyhow!("{}: no such run", handle))?;
        if run_file.owned {
            std::fs::remove_file(&run_file.path)
                .with_context(|| format!("path: {}", run_file.path.to_string_lossy()))?;
        }
        Ok(())
    }
}
