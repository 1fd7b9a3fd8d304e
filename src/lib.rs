//! This crate counts token frequencies in text files that are too large, or have too many
//! distinct tokens, to be counted in memory.
//!
//! Tokens are the lines of the input files, or optionally their whitespace separated words. The
//! result is a TSV file with one `token<TAB>count` line per distinct token, sorted by token.
//!
//! Counting happens in two phases, using at most a configured number of distinct tokens in memory:
//! * run building - tokens are counted in a bounded table which is written to a sorted
//!   intermediate file, a run, every time it fills up.
//! * merging - runs are merged in rounds, a bounded number at a time, summing the counts of
//!   equal tokens, until a single run is left. The batches of a round can be merged concurrently.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use text_file_count::count::Count;
//!
//! fn count_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut text_file_count = Count::new(vec![input], output, 1_000_000);
//!
//!     // set the number of tasks used for merging. The default is a single task.
//!     text_file_count.with_tasks(4);
//!
//!     // set the directory for intermediate results. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory for intermediate files, preferably on the same file system as the output result.
//!     text_file_count.with_tmp_dir(tmp);
//!
//!     let summary = text_file_count.count()?;
//!     log::info!("counted {} tokens", summary.tokens);
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod heap_entry;
pub(crate) mod merge_command;
pub(crate) mod token_reader;

pub mod count;
pub mod record;
pub mod frequency_table;
pub mod run_store;
pub mod file_run_store;
pub mod memory_run_store;
pub mod run_builder;
pub mod merger;
pub mod merge_scheduler;
