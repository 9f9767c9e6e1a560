//! Frequency → distance calibration.
//!
//! The calibration is produced offline from a word-vector table and a corpus
//! frequency list; here it is only read. The JSON form stores quantile keys as
//! strings: `{"version": 1, "avg_freq": 1e-5, "distance_quantiles": {"0.5": 1.2}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::constants::{CALIBRATION_VERSION, EPSILON};
use crate::error::{HighwayError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyCalibration {
    /// (hit probability, typical distance), sorted by probability.
    quantiles: Vec<(f64, f64)>,
    pub avg_freq: f64,
    pub version: u32,
}

#[derive(Serialize, Deserialize)]
struct WireCalibration {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    avg_freq: f64,
    #[serde(default)]
    distance_quantiles: BTreeMap<String, f64>,
}

fn default_version() -> u32 {
    CALIBRATION_VERSION
}

impl FrequencyCalibration {
    pub fn new(quantiles: impl IntoIterator<Item = (f64, f64)>, avg_freq: f64) -> Self {
        let mut quantiles: Vec<(f64, f64)> = quantiles.into_iter().collect();
        quantiles.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            quantiles,
            avg_freq,
            version: CALIBRATION_VERSION,
        }
    }

    /// Flat calibration used when no calibration file exists: every
    /// configured quantile maps to the fallback distance scale.
    pub fn fallback(config: &MemoryConfig, avg_freq: Option<f64>) -> Self {
        Self::new(
            config
                .frequency_distance_quantiles
                .iter()
                .map(|&p| (p, config.frequency_fallback_distance_scale)),
            avg_freq.unwrap_or(config.frequency_fallback_avg_freq),
        )
    }

    /// Calibrated distance at `probability`: the exact quantile when present,
    /// else the nearest one (lower probability wins a tie), else 1.0.
    pub fn distance_at_probability(&self, probability: f64) -> f64 {
        self.quantiles
            .iter()
            .min_by(|a, b| {
                (a.0 - probability)
                    .abs()
                    .total_cmp(&(b.0 - probability).abs())
            })
            .map(|&(_, distance)| distance)
            .unwrap_or(1.0)
    }

    pub fn quantiles(&self) -> &[(f64, f64)] {
        &self.quantiles
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let wire: WireCalibration = serde_json::from_str(json)
            .map_err(|e| HighwayError::InvalidAsset(format!("calibration: {e}")))?;
        let quantiles = wire
            .distance_quantiles
            .into_iter()
            .map(|(key, distance)| {
                key.parse::<f64>()
                    .map(|p| (p, distance))
                    .map_err(|e| HighwayError::InvalidAsset(format!("quantile key '{key}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut calibration = Self::new(quantiles, wire.avg_freq);
        calibration.version = wire.version;
        Ok(calibration)
    }

    pub fn to_json(&self) -> Result<String> {
        let wire = WireCalibration {
            version: self.version,
            avg_freq: self.avg_freq,
            distance_quantiles: self
                .quantiles
                .iter()
                .map(|(p, d)| (p.to_string(), *d))
                .collect(),
        };
        serde_json::to_string_pretty(&wire)
            .map_err(|e| HighwayError::InvalidAsset(format!("calibration: {e}")))
    }

    /// True when the average frequency is usable as a radius scale.
    pub fn has_average(&self) -> bool {
        self.avg_freq > EPSILON
    }
}
