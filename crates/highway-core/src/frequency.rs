use std::collections::HashMap;

use crate::error::{HighwayError, Result};

/// Global (corpus) word frequencies.
pub trait FrequencyProvider {
    fn word_frequency(&self, token: &str) -> f64;

    /// The frequency of a typical word; radii are scaled relative to it.
    fn typical_frequency(&self) -> f64;
}

/// Fallback provider: every word has the same frequency.
#[derive(Clone, Copy, Debug)]
pub struct FixedFrequency(pub f64);

impl FrequencyProvider for FixedFrequency {
    fn word_frequency(&self, _token: &str) -> f64 {
        self.0
    }

    fn typical_frequency(&self) -> f64 {
        self.0
    }
}

/// Frequency lookup loaded from a `word<TAB>frequency` listing.
#[derive(Clone, Debug)]
pub struct FrequencyTable {
    frequencies: HashMap<String, f64>,
    typical: f64,
    fallback: f64,
}

impl FrequencyTable {
    /// Build from pairs. The typical frequency is the median of the table,
    /// or `fallback` when the table is empty.
    pub fn new(frequencies: HashMap<String, f64>, fallback: f64) -> Self {
        let typical = median(frequencies.values().copied()).unwrap_or(fallback);
        Self {
            frequencies,
            typical,
            fallback,
        }
    }

    /// Parse lines of `word<whitespace>frequency`. Blank lines and `#`
    /// comments are ignored.
    pub fn from_text(content: &str, fallback: f64) -> Result<Self> {
        let mut frequencies = HashMap::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(word), Some(value)) = (parts.next(), parts.next()) else {
                return Err(HighwayError::InvalidAsset(format!(
                    "frequency line {}: expected `word frequency`",
                    line_no + 1
                )));
            };
            let value: f64 = value.parse().map_err(|e| {
                HighwayError::InvalidAsset(format!("frequency line {}: {e}", line_no + 1))
            })?;
            frequencies.insert(word.to_string(), value);
        }
        Ok(Self::new(frequencies, fallback))
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

impl FrequencyProvider for FrequencyTable {
    fn word_frequency(&self, token: &str) -> f64 {
        self.frequencies.get(token).copied().unwrap_or(self.fallback)
    }

    fn typical_frequency(&self) -> f64 {
        self.typical
    }
}

/// Median of the values, `None` when there are none.
pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
