use std::cmp::max;
use std::path::PathBuf;

use anyhow::anyhow;
use regex::Regex;

#[derive(Clone, Debug)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    tasks: usize,
    queue_size: usize,
    max_tokens: usize,
    fan_in: usize,
    merge_buffer: usize,
    split_whitespace: bool,
    ignore_lines: Option<Regex>,
    concurrent_merge: bool,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tmp_suffix: String,
        tasks: usize,
        max_tokens: usize,
        fan_in: usize,
        merge_buffer: usize,
        split_whitespace: bool,
        ignore_lines: Option<Regex>,
        concurrent_merge: bool,
    ) -> Result<Config, anyhow::Error> {
        if max_tokens == 0 {
            return Err(anyhow!("Invalid max tokens in memory: {}, must be a positive integer", max_tokens));
        }
        if fan_in == 0 {
            return Err(anyhow!("Invalid merge fan-in: {}, must be a positive integer", fan_in));
        }
        if merge_buffer == 0 {
            return Err(anyhow!("Invalid merge buffer size: {}, must be a positive integer", merge_buffer));
        }
        let queue_size = 4096;
        Ok(
            Config {
                tmp,
                tmp_prefix,
                tmp_suffix,
                tasks: max(tasks, 1),
                queue_size,
                max_tokens,
                // merging one run at a time never reduces the number of runs
                fan_in: max(fan_in, 2),
                merge_buffer,
                split_whitespace,
                ignore_lines,
                concurrent_merge,
            }
        )
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub(crate) fn fan_in(&self) -> usize {
        self.fan_in
    }

    pub(crate) fn merge_buffer(&self) -> usize {
        self.merge_buffer
    }

    pub(crate) fn split_whitespace(&self) -> bool {
        self.split_whitespace
    }

    pub(crate) fn ignore_lines(&self) -> &Option<Regex> {
        &self.ignore_lines
    }

    pub(crate) fn concurrent_merge(&self) -> bool {
        self.concurrent_merge
    }

    /// Files held open at once by all merge workers, one output per merge included. Saturates at
    /// `usize::MAX` for unbounded fan-in values.
    pub(crate) fn open_files(&self) -> usize {
        let workers = if self.concurrent_merge { self.tasks } else { 1 };
        self.fan_in.saturating_add(1).saturating_mul(workers)
    }
}
