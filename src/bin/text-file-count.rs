use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use regex::Regex;
use simple_logger::SimpleLogger;

use text_file_count::count::Count;

#[derive(Parser, Debug)]
#[command(name = "text-file-count", version, about = "Count token frequencies in text files larger than memory")]
struct Args {
    /// Largest number of distinct tokens held in memory
    max_tokens: usize,

    /// Input files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(short, long, default_value = "output.tsv")]
    output: PathBuf,

    /// Directory for intermediate runs, defaults to the system temp dir
    #[arg(long)]
    tmp: Option<PathBuf>,

    /// Tasks used for merging, 0 uses all cores
    #[arg(long, default_value_t = 1)]
    tasks: usize,

    /// Runs merged together, defaults to MAX_TOKENS
    #[arg(long = "fan-in")]
    fan_in: Option<usize>,

    /// Distinct tokens buffered by a merge, defaults to MAX_TOKENS
    #[arg(long = "merge-buffer")]
    merge_buffer: Option<usize>,

    /// Count whitespace separated words instead of lines
    #[arg(long = "split-whitespace")]
    split_whitespace: bool,

    /// Skip lines matching this regex
    #[arg(long = "ignore-lines")]
    ignore_lines: Option<String>,

    /// Merge existing count files instead of counting
    #[arg(long, conflicts_with = "check")]
    merge: bool,

    /// Check that the inputs are valid count files
    #[arg(long)]
    check: bool,
}

fn run(args: Args) -> Result<bool, anyhow::Error> {
    let mut text_file_count = Count::new(args.inputs, args.output, args.max_tokens);
    text_file_count.with_tasks(args.tasks);
    text_file_count.with_split_whitespace(args.split_whitespace);
    if let Some(tmp) = args.tmp {
        text_file_count.with_tmp_dir(tmp);
    }
    if let Some(fan_in) = args.fan_in {
        text_file_count.with_fan_in(fan_in);
    }
    if let Some(merge_buffer) = args.merge_buffer {
        text_file_count.with_merge_buffer(merge_buffer);
    }
    if let Some(ignore_lines) = args.ignore_lines {
        let r = Regex::new(&ignore_lines)
            .map_err(|e| anyhow!("Invalid ignore lines regex: {}, error: {}", ignore_lines, e))?;
        text_file_count.with_ignore_lines(r);
    }

    if args.check {
        let valid = text_file_count.check()?;
        println!("{}", if valid { "valid" } else { "invalid" });
        Ok(valid)
    } else if args.merge {
        text_file_count.merge()?;
        Ok(true)
    } else {
        let summary = text_file_count.count()?;
        log::info!("Counted {} tokens in {} runs, {} merge rounds", summary.tokens, summary.runs, summary.rounds);
        Ok(true)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = SimpleLogger::new().with_level(log::LevelFilter::Info).env().init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
