//! Frequency → search radius.
//!
//! Common units get a small radius: they rarely land on an existing point
//! and keep spawning fresh instances of the same meta. Rare units get a large
//! radius and act as stable anchors that are reused.

use crate::calibration::FrequencyCalibration;
use crate::config::MemoryConfig;
use crate::frequency::median;
use crate::meta::MetaEntry;

/// Median of the positive private frequencies, `default` when there are none.
pub fn private_typical(private_counts: impl Iterator<Item = f64>, default: f64) -> f64 {
    median(private_counts.filter(|&c| c > 0.0)).unwrap_or(default)
}

/// `min(cap, (1 + private/typical)^beta)`.
pub fn private_boost(private_count: f64, typical: f64, beta: f64, cap: f64) -> f64 {
    let ratio = private_count / typical.max(1.0);
    (1.0 + ratio).powf(beta).min(cap)
}

/// Radius growth for crystallized metas: `base × (log2(count + 1) + 1)`.
pub fn crystallized_multiplier(crystallized_count: u32, base: f64) -> f64 {
    let count = crystallized_count.max(1) as f64;
    base * ((count + 1.0).log2() + 1.0)
}

/// Radius policy for one engine state: config, calibration and the current
/// typical private frequency across the registry.
pub struct Tolerance<'a> {
    pub config: &'a MemoryConfig,
    pub calibration: &'a FrequencyCalibration,
    pub typical_private: f64,
}

impl<'a> Tolerance<'a> {
    pub fn new(
        config: &'a MemoryConfig,
        calibration: &'a FrequencyCalibration,
        typical_private: f64,
    ) -> Self {
        Self {
            config,
            calibration,
            typical_private,
        }
    }

    /// Global frequency boosted by personal repetition.
    pub fn effective_frequency(&self, global_freq: f64, private_freq: f64) -> f64 {
        let boost = private_boost(
            private_freq,
            self.typical_private,
            self.config.frequency_private_beta,
            self.config.frequency_private_cap,
        );
        global_freq.max(self.config.frequency_eps) * boost
    }

    /// Calibrated distance scaled by typical/effective frequency, clamped.
    pub fn radius_from_frequency(&self, effective_freq: f64) -> f64 {
        let scale = self
            .calibration
            .distance_at_probability(self.config.frequency_hit_probability);
        let radius =
            scale * (self.calibration.avg_freq / effective_freq.max(self.config.frequency_eps));
        self.clamp(radius)
    }

    /// Search radius for a meta. Unknown metas are treated as maximally rare.
    pub fn dynamic_radius(&self, meta: Option<&MetaEntry>) -> f64 {
        let Some(meta) = meta else {
            return self.config.radius_ceiling;
        };
        let effective = self.effective_frequency(meta.global_freq, meta.private_freq);
        let mut radius = self.radius_from_frequency(effective);
        if meta.is_crystallized() {
            radius *= crystallized_multiplier(
                meta.crystallized_count,
                self.config.crystallize_radius_multiplier,
            );
        }
        self.clamp(radius)
    }

    fn clamp(&self, radius: f64) -> f64 {
        radius.clamp(self.config.radius_floor, self.config.radius_ceiling)
    }
}
