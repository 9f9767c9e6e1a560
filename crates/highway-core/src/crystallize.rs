//! Crystallization: a well-worn sequential edge contracts into a new,
//! higher-level unit whose instance sits just outside its parts.

use rand::Rng;

use crate::config::MemoryConfig;
use crate::constants::{
    DEMOTED_EDGE_FLOOR, PAYLOAD_CRYSTALLIZED_COUNT, PAYLOAD_SOURCE, REFRACTORY_SPAN,
};
use crate::frequency::FrequencyProvider;
use crate::graph::{EdgeKind, PathGraph};
use crate::instance::InstanceId;
use crate::registry::Registry;
use crate::vector::Vector;
use crate::word_vectors::VectorProvider;

/// Walk count an edge needs before its endpoints crystallize.
///
/// `base` while the pair spans at most one unit, else
/// `ceil(log2(total)) + 1`: 2, 2, 3, 3, 4, ... for totals 1, 2, 3, 4, 5.
pub fn threshold(base: u32, total: u32) -> u32 {
    if total <= 1 {
        return base;
    }
    // ceil(log2(t)) == ilog2(t - 1) + 1 for t >= 2
    (total - 1).ilog2() + 2
}

pub struct Crystallizer<'a> {
    base_threshold: u32,
    offset_scale: f64,
    frequency: &'a dyn FrequencyProvider,
    vectors: &'a dyn VectorProvider,
}

impl<'a> Crystallizer<'a> {
    pub fn new(
        config: &MemoryConfig,
        frequency: &'a dyn FrequencyProvider,
        vectors: &'a dyn VectorProvider,
    ) -> Self {
        Self {
            base_threshold: config.crystallize_threshold,
            offset_scale: config.crystallize_offset_scale,
            frequency,
            vectors,
        }
    }

    /// Number of base units an instance spans: the payload stamp when it
    /// parses, else its meta's count.
    fn unit_count(registry: &Registry, id: InstanceId) -> u32 {
        let Some(node) = registry.instance(id) else {
            return 1;
        };
        node.payload_crystallized_count()
            .or_else(|| registry.meta(node.meta_id).map(|m| m.crystallized_count))
            .unwrap_or(1)
    }

    /// Check the sequential edge `left → right` after it was walked and
    /// crystallize it when it has reached threshold.
    ///
    /// An endpoint still in its refractory period absorbs the check: both
    /// counters cool down and nothing else happens. Returns the new
    /// crystallized instance.
    pub fn maybe_crystallize(
        &self,
        registry: &mut Registry,
        graph: &mut PathGraph,
        left: InstanceId,
        right: InstanceId,
        rng: &mut impl Rng,
    ) -> Option<InstanceId> {
        let walk_count = graph.walk_count(left, right, EdgeKind::Sequential)?;

        let refractory = [left, right]
            .iter()
            .any(|&id| registry.instance(id).is_some_and(|n| n.stats.refractory > 0));
        if refractory {
            for id in [left, right] {
                if let Some(node) = registry.instance_mut(id) {
                    node.cool_down();
                }
            }
            return None;
        }

        let total = Self::unit_count(registry, left) + Self::unit_count(registry, right);
        let threshold = threshold(self.base_threshold, total);
        if walk_count < threshold {
            return None;
        }

        let left_meta = registry.owner(left)?;
        let right_meta = registry.owner(right)?;
        let text = format!("{}{}", left_meta.text, right_meta.text);
        let level = left_meta.level.max(right_meta.level) + 1;

        let left_pos = registry.instance(left)?.position().clone();
        let right_pos = registry.instance(right)?.position().clone();
        let mean = Vector::mean(&[&left_pos, &right_pos]);
        let position = &mean + &(&mean.normalize() * self.offset_scale);

        let meta_id = registry.ensure_meta(&text, self.frequency, self.vectors);
        if let Some(meta) = registry.meta_mut(meta_id) {
            if meta.crystallized_count == 1 {
                meta.crystallized_count = total;
            }
            meta.level = meta.level.max(level);
        }

        let zero = Vector::zeros(position.dim());
        let node_id = registry.create_instance(meta_id, &position, &zero, 0.0, rng);
        if let Some(node) = registry.instance_mut(node_id) {
            node.payload.insert(PAYLOAD_SOURCE.to_string(), text.clone());
            node.payload
                .insert(PAYLOAD_CRYSTALLIZED_COUNT.to_string(), total.to_string());
        }

        graph.demote_edge(left, right, EdgeKind::Sequential, (threshold / 2).max(1));
        graph.reset_edge(left, right, EdgeKind::Sequential, DEMOTED_EDGE_FLOOR);
        graph.add_edge(left, node_id, EdgeKind::Hierarchical);
        graph.add_edge(right, node_id, EdgeKind::Hierarchical);
        for id in [left, right] {
            if let Some(node) = registry.instance_mut(id) {
                node.stats.refractory = REFRACTORY_SPAN;
            }
        }

        tracing::info!(
            text = %text,
            %left,
            %right,
            %node_id,
            walk_count,
            threshold,
            units = total,
            "crystallized"
        );
        Some(node_id)
    }
}
