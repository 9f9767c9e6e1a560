//! Find-or-build placement.
//!
//! A lookup searches the meta's own instances within the meta's dynamic
//! radius around a context point. A hit reuses the closest instance; a miss
//! builds a new one next to the context. Either way the lookup leaves a trace.

use rand::Rng;

use crate::calibration::FrequencyCalibration;
use crate::config::MemoryConfig;
use crate::crystallize::Crystallizer;
use crate::frequency::FrequencyProvider;
use crate::graph::{EdgeKind, PathGraph};
use crate::instance::InstanceId;
use crate::meta::MetaId;
use crate::registry::Registry;
use crate::text::{is_punctuation, normalize};
use crate::tolerance::{Tolerance, private_typical};
use crate::vector::Vector;
use crate::word_vectors::VectorProvider;

/// Borrowed view of everything placement reads but never owns.
#[derive(Clone, Copy)]
pub struct Placer<'a> {
    pub config: &'a MemoryConfig,
    pub calibration: &'a FrequencyCalibration,
    pub frequency: &'a dyn FrequencyProvider,
    pub vectors: &'a dyn VectorProvider,
}

impl<'a> Placer<'a> {
    pub fn new(
        config: &'a MemoryConfig,
        calibration: &'a FrequencyCalibration,
        frequency: &'a dyn FrequencyProvider,
        vectors: &'a dyn VectorProvider,
    ) -> Self {
        Self {
            config,
            calibration,
            frequency,
            vectors,
        }
    }

    /// Radius policy for the registry's current private-frequency spread.
    pub fn tolerance(&self, registry: &Registry) -> Tolerance<'a> {
        let typical = private_typical(
            registry.private_frequencies(),
            self.config.frequency_private_typical_default,
        );
        Tolerance::new(self.config, self.calibration, typical)
    }

    pub fn dynamic_radius(&self, registry: &Registry, meta_id: Option<MetaId>) -> f64 {
        let meta = meta_id.and_then(|id| registry.meta(id));
        self.tolerance(registry).dynamic_radius(meta)
    }

    /// Origin of the shared space.
    pub fn origin(&self) -> Vector {
        Vector::zeros(self.config.vector_dim)
    }

    /// Find an instance of `text` near `center`, building one on a miss.
    ///
    /// The lookup itself is read-only: an unseen text searches with the
    /// radius ceiling, and only a miss registers the meta (bumping its
    /// private frequency if it already exists). The chosen instance's usage
    /// counter is incremented either way.
    pub fn ensure_instance(
        &self,
        registry: &mut Registry,
        text: &str,
        center: &Vector,
        rng: &mut impl Rng,
    ) -> InstanceId {
        let existing = registry.find_meta(text).map(|meta| meta.id);
        let radius = self.dynamic_radius(registry, existing);

        let chosen = match self.closest_within(registry, existing, center, radius) {
            Some((id, dist)) => {
                tracing::debug!(text, radius, distance = dist, %id, "placement hit");
                id
            }
            None => {
                let meta_id = registry.ensure_meta(text, self.frequency, self.vectors);
                let id = self.create_near(registry, meta_id, center, radius, rng);
                tracing::debug!(text, radius, %id, "placement miss, built new instance");
                id
            }
        };
        if let Some(node) = registry.instance_mut(chosen) {
            node.use_once();
        }
        chosen
    }

    /// Closest instance of `meta_id` within `radius` of `center`; the more
    /// used one on equal distance.
    fn closest_within(
        &self,
        registry: &Registry,
        meta_id: Option<MetaId>,
        center: &Vector,
        radius: f64,
    ) -> Option<(InstanceId, f64)> {
        let meta = registry.meta(meta_id?)?;
        let mut best: Option<(InstanceId, f64, u32)> = None;
        for &id in &meta.instances {
            let Some(node) = registry.instance(id) else {
                continue;
            };
            let dist = center.distance(node.position());
            if dist > radius {
                continue;
            }
            let use_count = node.stats.use_count;
            let better = match best {
                None => true,
                Some((_, best_dist, best_use)) => {
                    dist < best_dist || (dist == best_dist && use_count > best_use)
                }
            };
            if better {
                best = Some((id, dist, use_count));
            }
        }
        best.map(|(id, dist, _)| (id, dist))
    }

    /// Build a new instance of `meta_id` near `center`.
    ///
    /// The category vector pulls the position, damped by effective frequency;
    /// jitter never exceeds the search radius.
    pub fn create_near(
        &self,
        registry: &mut Registry,
        meta_id: MetaId,
        center: &Vector,
        radius: f64,
        rng: &mut impl Rng,
    ) -> InstanceId {
        let tolerance = self.tolerance(registry);
        let bias = match registry.meta(meta_id) {
            Some(meta) => {
                let effective = tolerance.effective_frequency(meta.global_freq, meta.private_freq);
                &meta.category_vector * (1.0 / effective.max(1.0))
            }
            None => Vector::zeros(center.dim()),
        };
        let jitter_scale = radius.min(self.config.jitter_scale);
        registry.create_instance(meta_id, center, &bias, jitter_scale, rng)
    }

    /// Walk a token sequence, leaving a sequential edge between every pair of
    /// consecutive instances and checking each strengthened edge for
    /// crystallization.
    ///
    /// Each token is looked up around the previous token's instance; the
    /// first one around the origin.
    pub fn write_sequence(
        &self,
        registry: &mut Registry,
        graph: &mut PathGraph,
        tokens: &[String],
        rng: &mut impl Rng,
    ) -> Vec<InstanceId> {
        let tokens = prefer_longer_tokens(registry, clean_tokens(tokens));
        let crystallizer = Crystallizer::new(self.config, self.frequency, self.vectors);

        let mut path = Vec::with_capacity(tokens.len());
        let mut center = self.origin();
        let mut prev: Option<InstanceId> = None;
        for token in &tokens {
            let node = self.ensure_instance(registry, token, &center, rng);
            if let Some(prev) = prev {
                graph.add_edge(prev, node, EdgeKind::Sequential);
                for id in [prev, node] {
                    if let Some(n) = registry.instance_mut(id) {
                        n.stats.pass_count += 1;
                    }
                }
                crystallizer.maybe_crystallize(registry, graph, prev, node, rng);
            }
            if let Some(n) = registry.instance(node) {
                center = n.position().clone();
            }
            path.push(node);
            prev = Some(node);
        }
        path
    }
}

/// Drop tokens that are blank or punctuation only.
pub fn clean_tokens(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !is_punctuation(t))
        .cloned()
        .collect()
}

/// Merge adjacent pairs whose concatenation is already a registered meta.
///
/// Left to right, non-overlapping: `[A, B, C]` with `AB` known gives
/// `[AB, C]` even if `BC` is known too.
pub fn prefer_longer_tokens(registry: &Registry, tokens: Vec<String>) -> Vec<String> {
    let mut merged = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if let Some(next) = iter.peek() {
            let candidate = format!("{token}{next}");
            if registry.contains_key(&normalize(&candidate)) {
                merged.push(candidate);
                iter.next();
                continue;
            }
        }
        merged.push(token);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::FixedFrequency;
    use crate::word_vectors::{WordVectorTable, ZeroVectors};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    const FREQ: FixedFrequency = FixedFrequency(1e-5);
    const VECS: ZeroVectors = ZeroVectors { dim: 4 };

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn config() -> MemoryConfig {
        MemoryConfig {
            vector_dim: 4,
            ..MemoryConfig::default()
        }
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_miss_builds_then_hit_reuses() {
        let config = config();
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &VECS);
        let mut reg = Registry::new();
        let mut rng = rng();

        let origin = placer.origin();
        let first = placer.ensure_instance(&mut reg, "山", &origin, &mut rng);
        let second = placer.ensure_instance(&mut reg, "山", &origin, &mut rng);
        assert_eq!(first, second);
        assert_eq!(reg.instances().len(), 1);
        assert_eq!(reg.instance(first).unwrap().stats.use_count, 2);
    }

    #[test]
    fn test_hit_leaves_meta_untouched() {
        let config = config();
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &VECS);
        let mut reg = Registry::new();
        let mut rng = rng();

        let origin = placer.origin();
        let first = placer.ensure_instance(&mut reg, "山", &origin, &mut rng);
        assert_eq!(reg.meta(MetaId(0)).unwrap().private_freq, 1.0);
        for _ in 0..3 {
            assert_eq!(placer.ensure_instance(&mut reg, "山。", &origin, &mut rng), first);
        }
        let meta = reg.meta(MetaId(0)).unwrap();
        assert_eq!(meta.private_freq, 1.0);
        assert_eq!(meta.text, "山");
        assert_eq!(reg.instance(first).unwrap().stats.use_count, 4);
    }

    #[test]
    fn test_miss_on_known_meta_bumps_frequency() {
        let config = config();
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &VECS);
        let mut reg = Registry::new();
        let mut rng = rng();

        placer.ensure_instance(&mut reg, "山", &placer.origin(), &mut rng);
        let far_center = Vector::new(vec![50.0, 0.0, 0.0, 0.0]);
        placer.ensure_instance(&mut reg, "山", &far_center, &mut rng);
        assert_eq!(reg.meta(MetaId(0)).unwrap().private_freq, 2.0);
    }

    #[test]
    fn test_far_context_builds_new_instance() {
        let config = config();
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &VECS);
        let mut reg = Registry::new();
        let mut rng = rng();

        let near = placer.ensure_instance(&mut reg, "山", &placer.origin(), &mut rng);
        let far_center = Vector::new(vec![50.0, 0.0, 0.0, 0.0]);
        let far = placer.ensure_instance(&mut reg, "山", &far_center, &mut rng);
        assert_ne!(near, far);
        assert_eq!(reg.meta(MetaId(0)).unwrap().instances.len(), 2);
        assert!(reg.instance(far).unwrap().position().distance(&far_center) <= 0.1);
    }

    #[test]
    fn test_closest_candidate_wins() {
        let config = MemoryConfig {
            vector_dim: 1,
            ..MemoryConfig::default()
        };
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &ZeroVectors { dim: 1 });
        let mut reg = Registry::new();
        let mut rng = rng();
        let meta = reg.ensure_meta("山", &FREQ, &VECS);
        let zero = Vector::zeros(1);
        let a = reg.create_instance(meta, &Vector::new(vec![0.3]), &zero, 0.0, &mut rng);
        let b = reg.create_instance(meta, &Vector::new(vec![0.1]), &zero, 0.0, &mut rng);
        reg.instance_mut(a).unwrap().stats.use_count = 10;

        let chosen = placer.ensure_instance(&mut reg, "山", &zero, &mut rng);
        assert_eq!(chosen, b);
    }

    #[test]
    fn test_equal_distance_prefers_used() {
        let config = MemoryConfig {
            vector_dim: 1,
            ..MemoryConfig::default()
        };
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &ZeroVectors { dim: 1 });
        let mut reg = Registry::new();
        let mut rng = rng();
        let meta = reg.ensure_meta("山", &FREQ, &VECS);
        let zero = Vector::zeros(1);
        let a = reg.create_instance(meta, &Vector::new(vec![0.1]), &zero, 0.0, &mut rng);
        let b = reg.create_instance(meta, &Vector::new(vec![-0.1]), &zero, 0.0, &mut rng);
        reg.instance_mut(b).unwrap().stats.use_count = 3;

        assert_eq!(placer.ensure_instance(&mut reg, "山", &zero, &mut rng), b);
        reg.instance_mut(a).unwrap().stats.use_count = 9;
        assert_eq!(placer.ensure_instance(&mut reg, "山", &zero, &mut rng), a);
    }

    #[test]
    fn test_category_bias_damped_by_frequency() {
        let config = config();
        let cal = FrequencyCalibration::fallback(&config, None);
        let vectors = WordVectorTable::from_text("山 1 0 0 0\n").unwrap();
        let mut quiet = config.clone();
        quiet.jitter_scale = 0.0;
        let placer = Placer::new(&quiet, &cal, &FREQ, &vectors);
        let mut reg = Registry::new();
        let mut rng = rng();
        let id = placer.ensure_instance(&mut reg, "山", &placer.origin(), &mut rng);
        // effective frequency is far below 1, so the full category vector applies
        assert_eq!(
            reg.instance(id).unwrap().position(),
            &Vector::new(vec![1.0, 0.0, 0.0, 0.0])
        );
    }

    #[test]
    fn test_prefer_longer_tokens() {
        let mut reg = Registry::new();
        reg.ensure_meta("上山", &FREQ, &VECS);
        reg.ensure_meta("山下", &FREQ, &VECS);
        let merged = prefer_longer_tokens(&reg, tokens(&["上", "山", "下", "来"]));
        assert_eq!(merged, tokens(&["上山", "下", "来"]));
        let untouched = prefer_longer_tokens(&reg, tokens(&["下", "来"]));
        assert_eq!(untouched, tokens(&["下", "来"]));
    }

    #[test]
    fn test_clean_tokens_drops_punctuation() {
        assert_eq!(clean_tokens(&tokens(&["上", "，", " ", "山"])), tokens(&["上", "山"]));
    }

    #[test]
    fn test_write_sequence_leaves_edges() {
        let config = config();
        let cal = FrequencyCalibration::fallback(&config, None);
        let placer = Placer::new(&config, &cal, &FREQ, &VECS);
        let mut reg = Registry::new();
        let mut graph = PathGraph::new();
        let mut rng = rng();

        let path = placer.write_sequence(&mut reg, &mut graph, &tokens(&["上", "。", "山"]), &mut rng);
        assert_eq!(path.len(), 2);
        assert_eq!(graph.walk_count(path[0], path[1], EdgeKind::Sequential), Some(1));
        assert_eq!(reg.instance(path[0]).unwrap().stats.pass_count, 1);
        assert_eq!(reg.instance(path[1]).unwrap().stats.pass_count, 1);
    }
}
