use std::cmp::max;
use std::collections::HashMap;

use anyhow::anyhow;

use crate::record::CountRecord;

/// Bounded in-memory mapping from token to count.
///
/// The table never decides on its own when to flush, the owner checks [FrequencyTable::is_full]
/// or [FrequencyTable::would_overflow] and calls [FrequencyTable::take_sorted]. The peak number of
/// distinct tokens ever held is recorded so callers can verify the memory bound.
#[derive(Debug)]
pub struct FrequencyTable {
    counts: HashMap<String, u64>,
    capacity: usize,
    peak: usize,
}

impl FrequencyTable {
    pub fn new(capacity: usize) -> FrequencyTable {
        FrequencyTable {
            counts: HashMap::with_capacity(capacity.min(1 << 16)),
            capacity,
            peak: 0,
        }
    }

    /// Add `count` occurrences of `token`, inserting it if absent.
    ///
    /// Fails without changing the table when the sum does not fit in a `u64`.
    pub fn add(&mut self, token: &str, count: u64) -> Result<(), anyhow::Error> {
        match self.counts.get_mut(token) {
            Some(current) => {
                *current = Self::checked_sum(token, *current, count)?;
            }
            None => {
                self.counts.insert(token.to_string(), count);
                self.peak = max(self.peak, self.counts.len());
            }
        }
        Ok(())
    }

    /// Same as [FrequencyTable::add] but takes ownership of the token, avoiding a copy on insert.
    pub fn add_owned(&mut self, token: String, count: u64) -> Result<(), anyhow::Error> {
        match self.counts.get_mut(&token) {
            Some(current) => {
                *current = Self::checked_sum(&token, *current, count)?;
            }
            None => {
                self.counts.insert(token, count);
                self.peak = max(self.peak, self.counts.len());
            }
        }
        Ok(())
    }

    fn checked_sum(token: &str, current: u64, count: u64) -> Result<u64, anyhow::Error> {
        current.checked_add(count)
            .ok_or_else(|| anyhow!("Count overflow for token: {}, {} + {} exceeds {}", token, current, count, u64::MAX))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.counts.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<u64> {
        self.counts.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    /// The table holds `capacity` distinct tokens.
    pub fn is_full(&self) -> bool {
        self.counts.len() >= self.capacity
    }

    /// Adding `token` would exceed the capacity.
    pub fn would_overflow(&self, token: &str) -> bool {
        self.is_full() && !self.contains(token)
    }

    /// Take the contents as records sorted by token, leaving the table empty.
    pub fn take_sorted(&mut self) -> Vec<CountRecord> {
        let mut records: Vec<CountRecord> = self.counts
            .drain()
            .map(|(token, count)| CountRecord::new(token, count))
            .collect();
        records.sort_unstable();
        records
    }
}

#[cfg(test)]
mod tests {
    use crate::frequency_table::FrequencyTable;
    use crate::record::CountRecord;

    #[test]
    fn test_add_and_take_sorted() -> Result<(), anyhow::Error> {
        let mut table = FrequencyTable::new(10);
        for token in ["b", "a", "c", "a", "b", "a"] {
            table.add(token, 1)?;
        }
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("a"), Some(3));

        let records = table.take_sorted();
        assert_eq!(
            records,
            vec![
                CountRecord::new("a".to_string(), 3),
                CountRecord::new("b".to_string(), 2),
                CountRecord::new("c".to_string(), 1),
            ]
        );
        assert!(table.is_empty());
        assert_eq!(table.peak(), 3);
        Ok(())
    }

    #[test]
    fn test_capacity() -> Result<(), anyhow::Error> {
        let mut table = FrequencyTable::new(2);
        table.add_owned("x".to_string(), 4)?;
        assert!(!table.is_full());
        table.add_owned("y".to_string(), 1)?;
        assert!(table.is_full());
        assert!(table.would_overflow("z"));
        assert!(!table.would_overflow("x"));
        table.add("x", 2)?;
        assert_eq!(table.get("x"), Some(6));
        assert_eq!(table.peak(), 2);
        Ok(())
    }

    #[test]
    fn test_count_overflow() -> Result<(), anyhow::Error> {
        let mut table = FrequencyTable::new(2);
        table.add("x", u64::MAX - 1)?;
        table.add("x", 1)?;
        assert_eq!(table.get("x"), Some(u64::MAX));

        let error = table.add_owned("x".to_string(), 1).unwrap_err();
        assert!(error.to_string().contains("token: x"));
        assert_eq!(table.get("x"), Some(u64::MAX));
        assert!(table.add("x", 1).is_err());
        Ok(())
    }
}
