use serde::{Deserialize, Serialize};

/// Tunable parameters of the engine.
///
/// Every field has a default, so a partial TOML `[memory]` table overrides
/// only what it names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Dimension of the shared vector space.
    pub vector_dim: usize,
    pub radius_floor: f64,
    pub radius_ceiling: f64,
    /// Hit probability whose calibrated distance scales the radius.
    pub frequency_hit_probability: f64,
    /// Damping exponent of the private-frequency boost.
    pub frequency_private_beta: f64,
    /// Hard cap of the private-frequency boost.
    pub frequency_private_cap: f64,
    /// Typical private frequency used before any meta has been counted.
    pub frequency_private_typical_default: f64,
    pub frequency_eps: f64,
    pub frequency_distance_quantiles: Vec<f64>,
    pub frequency_fallback_avg_freq: f64,
    pub frequency_fallback_distance_scale: f64,
    /// Upper bound of the per-dimension jitter applied to new instances.
    pub jitter_scale: f64,
    /// Edge count that crystallizes a pair of atomic units.
    pub crystallize_threshold: u32,
    pub crystallize_radius_multiplier: f64,
    /// Outward push applied to crystallized positions.
    pub crystallize_offset_scale: f64,
    pub retrieval_ttl: u32,
    pub hub_penalty_cap: f64,
    pub recitation_max_rounds: u32,
    pub retrieval_quota_short: usize,
    pub retrieval_quota_long: usize,
    pub retrieval_quota_paragraph: usize,
    pub retrieval_quota_full_text: usize,
    pub retrieval_quota_possible: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            vector_dim: 200,
            radius_floor: 0.0,
            radius_ceiling: 100.0,
            frequency_hit_probability: 0.5,
            frequency_private_beta: 0.5,
            frequency_private_cap: 5.0,
            frequency_private_typical_default: 10.0,
            frequency_eps: 1e-12,
            frequency_distance_quantiles: vec![0.1, 0.3, 0.5, 0.7, 0.9],
            frequency_fallback_avg_freq: 1e-5,
            frequency_fallback_distance_scale: 1.0,
            jitter_scale: 0.05,
            crystallize_threshold: 2,
            crystallize_radius_multiplier: 2.0,
            crystallize_offset_scale: 0.2,
            retrieval_ttl: 10,
            hub_penalty_cap: 2.0,
            recitation_max_rounds: 5,
            retrieval_quota_short: 9,
            retrieval_quota_long: 6,
            retrieval_quota_paragraph: 3,
            retrieval_quota_full_text: 1,
            retrieval_quota_possible: 2,
        }
    }
}
