use std::cmp::Ordering;
use std::io::{BufRead, Write};

use anyhow::anyhow;

/// A single `(token, count)` record of a run.
///
/// On disk a record is one line: the token, a single TAB, the decimal count and a `\n`.
///
/// # Examples
/// ```
/// use text_file_count::record::CountRecord;
///
/// let record = CountRecord::parse("apple\t3\n").unwrap();
/// assert_eq!(record.token(), "apple");
/// assert_eq!(record.count(), 3);
/// assert_eq!(record.to_line(), "apple\t3\n");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountRecord {
    token: String,
    count: u64,
}

impl CountRecord {
    pub fn new(token: String, count: u64) -> CountRecord {
        CountRecord {
            token,
            count,
        }
    }

    /// Parse a record line. The trailing line terminator is optional.
    ///
    /// The line is split on its last TAB so that tokens containing tabs survive a round trip.
    pub fn parse(line: &str) -> Result<CountRecord, anyhow::Error> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let (token, count) = line.rsplit_once('\t')
            .ok_or_else(|| anyhow!("line: {line}, error: missing TAB separator"))?;
        let count = count.parse::<u64>()
            .map_err(|e| anyhow!("line: {line}, error: invalid count: {e}"))?;
        Ok(
            CountRecord {
                token: token.to_string(),
                count,
            }
        )
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_parts(self) -> (String, u64) {
        (self.token, self.count)
    }

    pub fn to_line(&self) -> String {
        format!("{}\t{}\n", self.token, self.count)
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        writeln!(writer, "{}\t{}", self.token, self.count)
    }
}

impl PartialOrd<Self> for CountRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CountRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token.cmp(&other.token).then(self.count.cmp(&other.count))
    }
}

/// Read one line of `reader` into `line`, returning the number of bytes read.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD. `bytes` is scratch space reused
/// between calls.
pub(crate) fn read_line_lossy<R: BufRead>(reader: &mut R, bytes: &mut Vec<u8>, line: &mut String) -> Result<usize, std::io::Error> {
    bytes.clear();
    line.clear();
    let read = reader.read_until(b'\n', bytes)?;
    line.push_str(&String::from_utf8_lossy(bytes));
    Ok(read)
}
