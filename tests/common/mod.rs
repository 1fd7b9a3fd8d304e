use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::HEXLOWER;
use rand::Rng;

#[allow(dead_code)]
pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    let tmp_dir_path = PathBuf::from_str("./target/results/tmp/").unwrap();

    for path in [results_dir_path, tmp_dir_path] {
        if !path.exists() {
            fs::create_dir_all(&path).unwrap_or_else(|_|
                panic!("Failed to create results directory: {:?}", path)
            );
        }
    }
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// Write one token per line and return the path.
#[allow(dead_code)]
pub fn write_tokens(dir: &str, tokens: &[String]) -> Result<PathBuf, anyhow::Error> {
    let path = temp_file_name(dir);
    let mut writer = BufWriter::new(File::create(&path)?);
    for token in tokens {
        writeln!(writer, "{}", token)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Random tokens drawn from a vocabulary of `vocabulary` words.
#[allow(dead_code)]
pub fn random_tokens(n: usize, vocabulary: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| format!("word-{}", rng.gen_range(0..vocabulary)))
        .collect()
}

/// Count tokens in memory, the expected output as lines.
#[allow(dead_code)]
pub fn expected_lines(tokens: &[String]) -> Vec<String> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for token in tokens {
        let token = token.trim();
        if !token.is_empty() {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts.into_iter()
        .map(|(token, count)| format!("{}\t{}", token, count))
        .collect()
}
