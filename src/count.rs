use std::cmp::{max, min};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use regex::Regex;
use rlimit::{getrlimit, Resource, setrlimit};

use crate::config::Config;
use crate::file_run_store::FileRunStore;
use crate::merge_scheduler::MergeScheduler;
use crate::record::{CountRecord, read_line_lossy};
use crate::run_builder::RunBuilder;
use crate::run_store::RunHandle;
use crate::token_reader::TokenReader;

/// Statistics of a completed count or merge.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CountSummary {
    /// Non blank tokens read from the input
    pub tokens: u64,
    /// Runs produced by run building, or input files for a merge
    pub runs: usize,
    pub rounds: usize,
    pub merges: usize,
    /// Largest number of distinct tokens held by the run building table
    pub peak_table: usize,
    /// Largest number of distinct tokens held by a merge buffer
    pub peak_buffer: usize,
}

/// Count token frequencies of text files
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use text_file_count::count::Count;
///
/// fn count_words(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     // hold at most 100 000 distinct words in memory
///     let mut text_file_count = Count::new(vec![input], output, 100_000);
///     // count whitespace separated words rather than complete lines
///     text_file_count.with_split_whitespace(true);
///     // set the directory for intermediate runs. The default is the system temp dir -
///     // std::env::temp_dir().
///     text_file_count.with_tmp_dir(tmp);
///     text_file_count.count()?;
///     Ok(())
/// }
/// ```
pub struct Count {
    input_files: Vec<PathBuf>,
    output: PathBuf,
    tmp: PathBuf,
    tasks: usize,
    max_tokens: usize,
    fan_in: Option<usize>,
    merge_buffer: Option<usize>,
    split_whitespace: bool,
    ignore_lines: Option<Regex>,
    concurrent_merge: bool,
}

impl Count {
    /// Create a default Count definition.
    ///
    /// `max_tokens` is the largest number of distinct tokens held in memory at once.
    /// * intermediate runs are written to std::env::temp_dir()
    /// * every trimmed, non blank line is a token
    /// * merge fan-in and merge buffer default to `max_tokens`
    /// * merges run on a single task
    pub fn new(input_files: Vec<PathBuf>, output: PathBuf, max_tokens: usize) -> Count {
        Count {
            input_files,
            output,
            tmp: std::env::temp_dir(),
            tasks: 1,
            max_tokens,
            fan_in: None,
            merge_buffer: None,
            split_whitespace: false,
            ignore_lines: None,
            concurrent_merge: true,
        }
    }

    /// Set directory for intermediate runs. By default use std::env::temp_dir()
    ///
    /// The final run is renamed to the output file. When the directory is on a different file
    /// system than the output, the run is copied and removed instead, which needs room for both
    /// files at once.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the number of tasks used to merge the batches of a round. Zero uses all system cores.
    /// The default is 1.
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the largest number of distinct tokens held in memory while reading the input.
    pub fn with_max_tokens(&mut self, max_tokens: usize) {
        self.max_tokens = max_tokens;
    }

    /// Set the number of runs merged together. The default is the max tokens value. Values
    /// below 2 are raised to 2.
    pub fn with_fan_in(&mut self, fan_in: usize) {
        self.fan_in = Some(fan_in);
    }

    /// Set the largest number of distinct tokens buffered by a merge. The default is the max
    /// tokens value.
    pub fn with_merge_buffer(&mut self, merge_buffer: usize) {
        self.merge_buffer = Some(merge_buffer);
    }

    /// Count every whitespace separated word instead of every line. The default is false.
    pub fn with_split_whitespace(&mut self, split_whitespace: bool) {
        self.split_whitespace = split_whitespace;
    }

    /// Lines matching the regex are not counted.
    pub fn with_ignore_lines(&mut self, r: Regex) {
        self.ignore_lines = Some(r)
    }

    /// Merge the batches of a round concurrently when more than one task is configured. The
    /// default is true.
    pub fn with_concurrent_merge(&mut self, concurrent_merge: bool) {
        self.concurrent_merge = concurrent_merge
    }

    /// Count the tokens of the input files into the output file.
    ///
    /// Input that is not valid UTF-8 is read lossily, each invalid sequence becoming U+FFFD.
    /// Fails when a token count exceeds `u64::MAX`.
    pub fn count(&self) -> Result<CountSummary, anyhow::Error> {
        let config = self.create_config()?;
        Self::with_file_limit(&config, || Self::internal_count(&self.input_files, &config, &self.output))
    }

    /// Merge count files into the output file, summing the counts of equal tokens.
    ///
    /// Every input should be a valid count file, see [Count::check]. Malformed lines are skipped
    /// with a warning and contribute nothing to the output. Input lines that are not valid UTF-8
    /// are read lossily. Fails when a summed count exceeds `u64::MAX`. The input files are kept.
    pub fn merge(&self) -> Result<CountSummary, anyhow::Error> {
        let config = self.create_config()?;
        Self::with_file_limit(&config, || Self::internal_merge(&self.input_files, &config, &self.output))
    }

    /// Check that every input file is a valid count file: each line is a `token<TAB>count`
    /// record and tokens are strictly ascending.
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let mut result = true;
        for path in &self.input_files {
            result = Self::internal_check(path)?;
            if !result {
                break;
            }
        }
        Ok(result)
    }

    fn create_config(&self) -> Result<Config, anyhow::Error> {
        let tasks = if self.tasks == 0 {
            num_cpus::get()
        } else {
            self.tasks
        };

        Config::new(
            self.tmp.clone(),
            "part-".to_string(),
            ".run".to_string(),
            tasks,
            self.max_tokens,
            self.fan_in.unwrap_or(self.max_tokens),
            self.merge_buffer.unwrap_or(self.max_tokens),
            self.split_whitespace,
            self.ignore_lines.clone(),
            self.concurrent_merge,
        )
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    fn with_file_limit<F>(config: &Config, f: F) -> Result<CountSummary, anyhow::Error>
        where F: FnOnce() -> Result<CountSummary, anyhow::Error>
    {
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let wanted = u64::try_from(config.open_files().saturating_add(256)).unwrap_or(u64::MAX);
        let new_soft = min(max(wanted, current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;
        let result = f();
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        Self::set_rlimits(current_soft, current_hard)?;
        result
    }

    fn create_store(config: &Config) -> Arc<FileRunStore> {
        Arc::new(FileRunStore::new(config.tmp().clone(), config.tmp_prefix(), config.tmp_suffix()))
    }

    fn internal_count(input_files: &[PathBuf], config: &Config, output: &PathBuf) -> Result<CountSummary, anyhow::Error> {
        log::info!("Start counting, max tokens: {}, fan-in: {}, merge buffer: {}", config.max_tokens(), config.fan_in(), config.merge_buffer());
        let store = Self::create_store(config);
        let mut run_builder = RunBuilder::new(store.as_ref(), config.max_tokens());
        run_builder.add_all(
            TokenReader::new(input_files, config.split_whitespace(), config.ignore_lines().clone())
        )?;
        let tokens = run_builder.tokens();
        let peak_table = run_builder.peak_distinct();
        let runs = run_builder.finish()?;

        let mut summary = Self::merge_runs(store, runs, config, output)?;
        summary.tokens = tokens;
        summary.peak_table = peak_table;
        log::info!("Finish counting, {} tokens", tokens);
        Ok(summary)
    }

    fn internal_merge(input_files: &[PathBuf], config: &Config, output: &PathBuf) -> Result<CountSummary, anyhow::Error> {
        log::info!("Merging {} count files", input_files.len());
        let store = Self::create_store(config);
        let runs = input_files.iter()
            .map(|path| store.adopt(path.clone()))
            .collect();
        Self::merge_runs(store, runs, config, output)
    }

    fn merge_runs(store: Arc<FileRunStore>, runs: Vec<RunHandle>, config: &Config, output: &PathBuf) -> Result<CountSummary, anyhow::Error> {
        let run_count = runs.len();
        let tasks = if config.concurrent_merge() { config.tasks() } else { 1 };
        let scheduler = MergeScheduler::new(store.clone(), config.fan_in(), config.merge_buffer())
            .with_tasks(tasks)
            .with_queue_size(config.queue_size());
        let (merged, schedule_summary) = scheduler.merge(runs)?;

        match merged {
            Some(handle) => {
                log::info!("Moving {} to {}", handle, output.to_string_lossy());
                store.persist(handle, output)?;
            }
            None => {
                log::info!("No tokens, creating empty {}", output.to_string_lossy());
                File::create(output)
                    .with_context(|| anyhow!("path: {}", output.to_string_lossy()))?;
            }
        }

        Ok(
            CountSummary {
                runs: run_count,
                rounds: schedule_summary.rounds,
                merges: schedule_summary.merges,
                peak_buffer: schedule_summary.peak_buffer,
                ..CountSummary::default()
            }
        )
    }

    pub(crate) fn internal_check(path: &PathBuf) -> Result<bool, anyhow::Error> {
        let mut result = true;
        let mut bytes = Vec::new();
        let mut line = String::new();
        let mut previous: Option<CountRecord> = None;
        let mut reader = BufReader::new(
            File::open(path).with_context(|| anyhow!("path: {}", path.to_string_lossy()))?
        );
        let mut line_number = 0;
        while read_line_lossy(&mut reader, &mut bytes, &mut line)
            .with_context(|| anyhow!("path: {}", path.to_string_lossy()))? != 0 {
            line_number += 1;
            let current = match CountRecord::parse(&line) {
                Ok(record) => record,
                Err(e) => {
                    log::info!("Invalid record, path: {}, line: {}, error: {}", path.to_string_lossy(), line_number, e);
                    result = false;
                    break;
                }
            };

            if let Some(previous_record) = &previous {
                if previous_record.token() >= current.token() {
                    log::info!("Token out of order, path: {}, line: {}", path.to_string_lossy(), line_number);
                    result = false;
                    break;
                }
            }
            previous = Some(current);
        }
        Ok(result)
    }
}
