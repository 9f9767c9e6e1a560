use std::ops::{Add, Mul};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::EPSILON;

/// A point (or direction) in the shared embedding space.
///
/// Binary operations pair components positionally and stop at the shorter
/// operand, so a vector of the wrong dimension degrades instead of panicking.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector(pub Vec<f64>);

impl Vector {
    pub fn new(components: Vec<f64>) -> Self {
        Self(components)
    }

    /// The origin of a `dim`-dimensional space.
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| v.abs() < EPSILON)
    }

    pub fn norm(&self) -> f64 {
        self.0.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Unit-length copy. A near-zero vector is returned unchanged.
    pub fn normalize(&self) -> Self {
        let norm = self.norm();
        if norm < EPSILON {
            return self.clone();
        }
        Self(self.0.iter().map(|v| v / norm).collect())
    }

    /// Component-wise mean. Empty input gives an empty vector.
    pub fn mean(vectors: &[&Vector]) -> Self {
        let Some(first) = vectors.first() else {
            return Self::default();
        };
        let mut sums = vec![0.0; first.dim()];
        for vector in vectors {
            for (sum, v) in sums.iter_mut().zip(&vector.0) {
                *sum += v;
            }
        }
        let n = vectors.len() as f64;
        Self(sums.into_iter().map(|s| s / n).collect())
    }

    /// Uniform noise in `[-scale, scale]` on every axis. Zero when `scale <= 0`.
    ///
    /// The bound is per axis, so the Euclidean length can reach
    /// `scale * sqrt(dim)`.
    pub fn jitter(dim: usize, scale: f64, rng: &mut impl Rng) -> Self {
        if scale <= 0.0 {
            return Self::zeros(dim);
        }
        Self((0..dim).map(|_| rng.random_range(-scale..=scale)).collect())
    }
}

impl Add<&Vector> for &Vector {
    type Output = Vector;

    fn add(self, rhs: &Vector) -> Vector {
        Vector(self.0.iter().zip(&rhs.0).map(|(a, b)| a + b).collect())
    }
}

impl Mul<f64> for &Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        Vector(self.0.iter().map(|v| v * rhs).collect())
    }
}

impl From<Vec<f64>> for Vector {
    fn from(components: Vec<f64>) -> Self {
        Self(components)
    }
}
