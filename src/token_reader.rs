use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use regex::Regex;

use crate::record::read_line_lossy;

/// Reads tokens from input files, one file after another.
///
/// Every line trimmed of surrounding whitespace is a token, or, with `split_whitespace`, every
/// whitespace separated word of the line. Blank lines and lines matching `ignore_lines` are
/// skipped. Input that is not valid UTF-8 is read lossily, each invalid sequence becoming U+FFFD.
pub(crate) struct TokenReader {
    paths: VecDeque<PathBuf>,
    current: Option<(PathBuf, BufReader<File>)>,
    bytes: Vec<u8>,
    line: String,
    pending: VecDeque<String>,
    split_whitespace: bool,
    ignore_lines: Option<Regex>,
}

impl TokenReader {
    pub(crate) fn new(paths: &[PathBuf], split_whitespace: bool, ignore_lines: Option<Regex>) -> TokenReader {
        TokenReader {
            paths: paths.iter().cloned().collect(),
            current: None,
            bytes: Vec::new(),
            line: String::new(),
            pending: VecDeque::new(),
            split_whitespace,
            ignore_lines,
        }
    }

    fn next_line(&mut self) -> Result<bool, anyhow::Error> {
        loop {
            if self.current.is_none() {
                match self.paths.pop_front() {
                    None => {
                        return Ok(false);
                    }
                    Some(path) => {
                        let file = File::open(&path)
                            .with_context(|| anyhow!("path: {}", path.display()))?;
                        log::info!("Reading tokens from {}", path.display());
                        self.current = Some((path, BufReader::new(file)));
                    }
                }
            }

            let bytes = match self.current.as_mut() {
                Some((path, reader)) => {
                    read_line_lossy(reader, &mut self.bytes, &mut self.line)
                        .with_context(|| anyhow!("path: {}", path.display()))?
                }
                None => 0,
            };
            if bytes == 0 {
                self.current = None;
            } else {
                return Ok(true);
            }
        }
    }

    fn read_token(&mut self) -> Result<Option<String>, anyhow::Error> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            if !self.next_line()? {
                return Ok(None);
            }

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(r) = &self.ignore_lines {
                if r.is_match(line) {
                    continue;
                }
            }
            if self.split_whitespace {
                self.pending.extend(line.split_whitespace().map(|word| word.to_string()));
            } else {
                return Ok(Some(line.to_string()));
            }
        }
    }
}

impl Iterator for TokenReader {
    type Item = Result<String, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(e) => {
                // a failed file is not retried
                self.paths.clear();
                self.current = None;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use regex::Regex;

    use crate::token_reader::TokenReader;

    fn write_input(name: &str, content: &str) -> Result<PathBuf, anyhow::Error> {
        let dir = PathBuf::from("./target/unit-results/token-reader");
        fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    #[test]
    fn test_lines_are_trimmed_and_blank_skipped() -> Result<(), anyhow::Error> {
        let path = write_input("lines.txt", "  apple \n\n   \nbanana split\n\tcherry")?;
        let tokens: Vec<String> = TokenReader::new(&[path], false, None)
            .collect::<Result<Vec<String>, anyhow::Error>>()?;
        assert_eq!(tokens, vec!["apple", "banana split", "cherry"]);
        Ok(())
    }

    #[test]
    fn test_split_whitespace_across_files() -> Result<(), anyhow::Error> {
        let first = write_input("first.txt", "a b  a\n")?;
        let second = write_input("second.txt", "\nc\td\n")?;
        let tokens: Vec<String> = TokenReader::new(&[first, second], true, None)
            .collect::<Result<Vec<String>, anyhow::Error>>()?;
        assert_eq!(tokens, vec!["a", "b", "a", "c", "d"]);
        Ok(())
    }

    #[test]
    fn test_ignore_lines() -> Result<(), anyhow::Error> {
        let path = write_input("comments.txt", "# header\nkeep\n  # indented comment\nkeep\n")?;
        let tokens: Vec<String> = TokenReader::new(&[path], false, Some(Regex::new("^#")?))
            .collect::<Result<Vec<String>, anyhow::Error>>()?;
        assert_eq!(tokens, vec!["keep", "keep"]);
        Ok(())
    }

    #[test]
    fn test_invalid_utf8() -> Result<(), anyhow::Error> {
        let dir = PathBuf::from("./target/unit-results/token-reader");
        fs::create_dir_all(&dir)?;
        let path = dir.join("latin1.txt");
        fs::write(&path, b"caf\xe9\nabc\nabc\n")?;
        let tokens: Vec<String> = TokenReader::new(&[path], false, None)
            .collect::<Result<Vec<String>, anyhow::Error>>()?;
        assert_eq!(tokens, vec!["caf\u{FFFD}", "abc", "abc"]);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let mut reader = TokenReader::new(&[PathBuf::from("./target/unit-results/does-not-exist")], false, None);
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }
}
