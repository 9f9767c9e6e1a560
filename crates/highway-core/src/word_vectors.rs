use std::collections::HashMap;

use crate::error::{HighwayError, Result};
use crate::vector::Vector;

/// Maps tokens into the shared vector space.
pub trait VectorProvider {
    fn dim(&self) -> usize;

    /// Vector for one token; the zero vector when the token is unknown.
    fn vector(&self, token: &str) -> Vector;

    /// Mean of the known token vectors, zero when none are known.
    fn tokens_vector(&self, tokens: &[String]) -> Vector {
        let known: Vec<Vector> = tokens
            .iter()
            .map(|t| self.vector(t))
            .filter(|v| !v.is_zero())
            .collect();
        if known.is_empty() {
            return Vector::zeros(self.dim());
        }
        let refs: Vec<&Vector> = known.iter().collect();
        Vector::mean(&refs)
    }
}

/// Fallback provider: every token sits at the origin.
#[derive(Clone, Copy, Debug)]
pub struct ZeroVectors {
    pub dim: usize,
}

impl VectorProvider for ZeroVectors {
    fn dim(&self) -> usize {
        self.dim
    }

    fn vector(&self, _token: &str) -> Vector {
        Vector::zeros(self.dim)
    }
}

/// In-memory embedding table.
#[derive(Clone, Debug, Default)]
pub struct WordVectorTable {
    dim: usize,
    vectors: HashMap<String, Vector>,
}

impl WordVectorTable {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: HashMap::new(),
        }
    }

    pub fn insert(&mut self, token: &str, vector: Vector) {
        self.vectors.insert(token.to_string(), vector);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Parse the word2vec text format: an optional `<count> <dim>` header
    /// followed by `token v1 v2 ...` lines. Without a header the dimension is
    /// taken from the first entry. Lines of the wrong width are skipped.
    pub fn from_text(content: &str) -> Result<Self> {
        let mut dim: Option<usize> = None;
        let mut table = Self::default();

        for (line_no, line) in content.lines().enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }
            if line_no == 0
                && parts.len() == 2
                && let (Ok(_count), Ok(d)) = (parts[0].parse::<usize>(), parts[1].parse::<usize>())
            {
                dim = Some(d);
                continue;
            }
            let width = *dim.get_or_insert(parts.len() - 1);
            if width == 0 || parts.len() != width + 1 {
                continue;
            }
            let values = parts[1..]
                .iter()
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    HighwayError::InvalidAsset(format!("vector line {}: {e}", line_no + 1))
                })?;
            table.vectors.insert(parts[0].to_string(), Vector::new(values));
        }

        table.dim = dim.unwrap_or(0);
        Ok(table)
    }
}

impl VectorProvider for WordVectorTable {
    fn dim(&self) -> usize {
        self.dim
    }

    fn vector(&self, token: &str) -> Vector {
        self.vectors
            .get(token)
            .cloned()
            .unwrap_or_else(|| Vector::zeros(self.dim))
    }
}
