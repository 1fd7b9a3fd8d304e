use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Error};
use benchmark_rs::benchmarks::Benchmarks;
use benchmark_rs::stopwatch::StopWatch;
use data_encoding::HEXLOWER;
use rand::Rng;
use simple_logger::SimpleLogger;

use text_file_count::count::Count;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Clone)]
pub struct BenchmarkConfig {
    files: BTreeMap<usize, PathBuf>,
    bench_results_dir: PathBuf,
    bench_tmp_dir: PathBuf,
    tasks: usize,
    max_tokens: usize,
    fan_in: usize,
    description: String,
}

impl BenchmarkConfig {
    pub fn new(files: BTreeMap<usize, PathBuf>, bench_results_dir: PathBuf, bench_tmp_dir: PathBuf, tasks: usize, max_tokens: usize, fan_in: usize, description: &str) -> BenchmarkConfig {
        BenchmarkConfig {
            files,
            bench_results_dir,
            bench_tmp_dir,
            tasks,
            max_tokens,
            fan_in,
            description: description.to_string(),
        }
    }

    pub fn get_input_path(&self, key: usize) -> PathBuf {
        self.files.get(&key).unwrap().clone()
    }

    pub fn bench_results_dir(&self) -> &PathBuf {
        &self.bench_results_dir
    }

    pub fn bench_tmp_dir(&self) -> &PathBuf {
        &self.bench_tmp_dir
    }

    pub fn tasks(&self) -> usize {
        self.tasks
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn fan_in(&self) -> usize {
        self.fan_in
    }
}

impl Display for BenchmarkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "tasks: {}, max tokens: {}, fan-in: {}, description: {}",
                 self.tasks,
                 self.max_tokens,
                 self.fan_in,
                 self.description,
        )
    }
}

fn temp_file_name(dir: &PathBuf) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

fn cleanup(bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    if bench_results_dir.exists() {
        fs::remove_dir_all(bench_results_dir.clone()).with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }
    Ok(())
}

fn setup(bench_input_dir: &PathBuf, bench_results_dir: &PathBuf, bench_tmp_dir: &PathBuf) -> Result<(), anyhow::Error> {
    cleanup(bench_results_dir)?;

    for dir in [bench_input_dir, bench_results_dir, bench_tmp_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir.clone())
                .with_context(|| anyhow!("{}", dir.to_string_lossy()))?;
        }
    }
    Ok(())
}

fn create_input_files(count: usize, factor: usize, vocabulary: usize, base_path: PathBuf) -> Result<BTreeMap<usize, PathBuf>, anyhow::Error> {
    let mut files: BTreeMap<usize, PathBuf> = BTreeMap::new();
    let mut rng = rand::thread_rng();
    for i in 1..=count {
        let number_of_tokens = i * factor;
        let path = base_path.join(PathBuf::from(format!("{}-{}", number_of_tokens, vocabulary)));
        if !path.exists() {
            let mut writer = BufWriter::new(
                File::create(&path)
                    .with_context(|| anyhow!("path: {}", path.to_string_lossy()))?);
            for _j in 0..number_of_tokens {
                writeln!(writer, "token-{}", rng.gen_range(0..vocabulary))?;
            }
        }
        files.insert(number_of_tokens, path);
    }
    Ok(files)
}

fn count(stop_watch: &mut StopWatch, config: BenchmarkConfig, work: usize) -> Result<(), anyhow::Error> {
    stop_watch.pause();
    let input_path = config.get_input_path(work);
    let output_path = temp_file_name(config.bench_results_dir());
    log::info!("Start counting {}", input_path.to_string_lossy());
    stop_watch.resume();
    let mut text_file_count = Count::new(vec![input_path.clone()], output_path.clone(), config.max_tokens());
    text_file_count.with_tmp_dir(config.bench_tmp_dir().clone());
    text_file_count.with_tasks(config.tasks());
    text_file_count.with_fan_in(config.fan_in());
    text_file_count.count()?;
    stop_watch.pause();
    log::info!("Finish counting {}", input_path.to_string_lossy());
    fs::remove_file(output_path.clone())
        .with_context(|| anyhow!("{}", output_path.to_string_lossy()))?;
    Ok(())
}

#[test]
fn text_file_count_bench() -> Result<(), Error> {
    SimpleLogger::new().init().unwrap();
    log::info!("Started text_file_count_bench.");

    let bench_input_dir = PathBuf::from("./target/benchmarks/input");
    let bench_results_dir = PathBuf::from("./target/benchmarks/results");
    let bench_tmp_dir = PathBuf::from("./target/benchmarks/results/tmp");
    setup(&bench_input_dir, &bench_results_dir, &bench_tmp_dir)?;

    let small_vocabulary = create_input_files(10, 100_000, 10_000, bench_input_dir.clone())?;
    let large_vocabulary = create_input_files(10, 100_000, 1_000_000, bench_input_dir.clone())?;

    let mut benchmarks = Benchmarks::new("text-file-count");

    for (name, files, tasks, description) in [
        ("small-vocabulary-1-tasks", &small_vocabulary, 1, "10K distinct tokens"),
        ("small-vocabulary-4-tasks", &small_vocabulary, 4, "10K distinct tokens"),
        ("large-vocabulary-1-tasks", &large_vocabulary, 1, "1M distinct tokens"),
        ("large-vocabulary-4-tasks", &large_vocabulary, 4, "1M distinct tokens"),
    ] {
        benchmarks.add(
            name,
            count,
            BenchmarkConfig::new(
                files.clone(),
                bench_results_dir.clone(),
                bench_tmp_dir.clone(),
                tasks,
                50_000,
                64,
                description,
            ),
            files.keys().cloned().collect(),
            3,
            0,
        )?;
    }

    benchmarks.run()?;
    benchmarks.save_to_csv(PathBuf::from("./target/benchmarks/"), true, true)?;
    benchmarks.save_to_json(PathBuf::from("./target/benchmarks/"))?;

    log::info!("Finished text_file_count_bench.");
    Ok(())
}
