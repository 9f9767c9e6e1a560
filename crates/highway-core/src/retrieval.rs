//! Retrieval: TTL-bounded spreading activation from query seeds, shaped into
//! per-category buckets.
//!
//! Retrieval is read-only. It never creates metas or instances and never
//! touches usage or traversal counters.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::graph::PathGraph;
use crate::instance::InstanceId;
use crate::meta::Category;
use crate::placement::{clean_tokens, prefer_longer_tokens};
use crate::registry::Registry;
use crate::text::normalize;

/// Per-call activation state. Discarded when the call returns.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub ttl_budget: f64,
    light: HashMap<InstanceId, u32>,
    sources: HashMap<InstanceId, Vec<InstanceId>>,
}

impl SessionState {
    pub fn new(ttl_budget: u32) -> Self {
        Self {
            ttl_budget: ttl_budget as f64,
            ..Self::default()
        }
    }

    /// Light `node` once, crediting `source`.
    pub fn touch(&mut self, node: InstanceId, source: InstanceId) {
        *self.light.entry(node).or_insert(0) += 1;
        self.sources.entry(node).or_default().push(source);
    }

    pub fn light_count(&self, node: InstanceId) -> u32 {
        self.light.get(&node).copied().unwrap_or(0)
    }

    pub fn sources(&self, node: InstanceId) -> &[InstanceId] {
        self.sources.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn touched(&self) -> usize {
        self.light.len()
    }

    /// Touched nodes by light count descending, then id ascending.
    pub fn ranked(&self) -> Vec<(InstanceId, u32)> {
        let mut ranked: Vec<(InstanceId, u32)> =
            self.light.iter().map(|(&id, &count)| (id, count)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

/// Output bucket a hit was selected into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Category(Category),
    PossiblyRelevant,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category(c) => c.as_str(),
            Self::PossiblyRelevant => "possibly_relevant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub text: String,
    pub bucket: Bucket,
    pub instance: InstanceId,
    pub light: u32,
    pub sources: Vec<InstanceId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn in_bucket(&self, bucket: Bucket) -> impl Iterator<Item = &RetrievalHit> {
        self.hits.iter().filter(move |h| h.bucket == bucket)
    }

    /// Display text → source ids. When two hits share a display text the
    /// later hit's sources replace the earlier ones.
    pub fn as_map(&self) -> BTreeMap<String, Vec<InstanceId>> {
        let mut map = BTreeMap::new();
        for hit in &self.hits {
            map.insert(hit.text.clone(), hit.sources.clone());
        }
        map
    }
}

/// Read-only spreading activation over a registry and its graph.
pub struct Diffuser<'a> {
    config: &'a MemoryConfig,
    registry: &'a Registry,
    graph: &'a PathGraph,
}

impl<'a> Diffuser<'a> {
    pub fn new(config: &'a MemoryConfig, registry: &'a Registry, graph: &'a PathGraph) -> Self {
        Self {
            config,
            registry,
            graph,
        }
    }

    /// Resolve each token to at most one existing instance: the meta's most
    /// used, lowest id on ties.
    pub fn resolve_seeds(&self, tokens: &[String]) -> Vec<InstanceId> {
        let tokens = prefer_longer_tokens(self.registry, clean_tokens(tokens));
        tokens
            .iter()
            .filter_map(|token| {
                let meta = self.registry.find_meta(&normalize(token))?;
                meta.instances
                    .iter()
                    .filter_map(|&id| self.registry.instance(id))
                    .max_by(|a, b| {
                        a.stats
                            .use_count
                            .cmp(&b.stats.use_count)
                            .then(b.id.cmp(&a.id))
                    })
                    .map(|n| n.id)
            })
            .collect()
    }

    /// Spread activation from `seeds` with the configured TTL.
    ///
    /// Every touch is enqueued, so a node reached along several paths is lit
    /// once per path. Each hop costs at least 1, which bounds the walk.
    pub fn spread(&self, seeds: &[InstanceId]) -> SessionState {
        let mut session = SessionState::new(self.config.retrieval_ttl);
        let mut queue = VecDeque::new();
        for &seed in seeds {
            session.touch(seed, seed);
            queue.push_back((seed, session.ttl_budget));
        }

        while let Some((current, ttl)) = queue.pop_front() {
            if ttl <= 0.0 {
                continue;
            }
            for neighbor in self.graph.neighbors(current) {
                let penalty = self
                    .registry
                    .instance(neighbor)
                    .map(|n| self.hop_penalty(n.hub_penalty))
                    .unwrap_or(0.0);
                let next = ttl - 1.0 - penalty;
                if next < 0.0 {
                    continue;
                }
                session.touch(neighbor, current);
                queue.push_back((neighbor, next));
            }
        }
        session
    }

    /// Extra TTL a hop into a node costs, within `[0, hub_penalty_cap]`.
    fn hop_penalty(&self, hub_penalty: f64) -> f64 {
        if hub_penalty.is_nan() {
            return 0.0;
        }
        hub_penalty.clamp(0.0, self.config.hub_penalty_cap.max(0.0))
    }

    /// Pick hits by category quota, then fill the possibly-relevant quota
    /// from whatever remains.
    pub fn shape(&self, session: &SessionState) -> RetrievalResult {
        let ranked = session.ranked();
        let mut selected: HashSet<InstanceId> = HashSet::new();
        let mut hits = Vec::new();

        let quotas = [
            (Category::ShortSentence, self.config.retrieval_quota_short),
            (Category::LongSentence, self.config.retrieval_quota_long),
            (Category::Paragraph, self.config.retrieval_quota_paragraph),
            (Category::FullText, self.config.retrieval_quota_full_text),
        ];
        for (category, quota) in quotas {
            let mut taken = 0;
            for &(id, light) in &ranked {
                if taken >= quota {
                    break;
                }
                if selected.contains(&id) {
                    continue;
                }
                let Some(meta) = self.registry.owner(id) else {
                    continue;
                };
                if !meta.has_label(category) {
                    continue;
                }
                selected.insert(id);
                hits.push(self.hit(session, id, light, meta.text.clone(), Bucket::Category(category)));
                taken += 1;
            }
        }

        let mut remaining = self.config.retrieval_quota_possible;
        for &(id, light) in &ranked {
            if remaining == 0 {
                break;
            }
            if selected.contains(&id) {
                continue;
            }
            let Some(meta) = self.registry.owner(id) else {
                continue;
            };
            selected.insert(id);
            hits.push(self.hit(session, id, light, meta.text.clone(), Bucket::PossiblyRelevant));
            remaining -= 1;
        }

        RetrievalResult { hits }
    }

    fn hit(
        &self,
        session: &SessionState,
        instance: InstanceId,
        light: u32,
        text: String,
        bucket: Bucket,
    ) -> RetrievalHit {
        RetrievalHit {
            text,
            bucket,
            instance,
            light,
            sources: session.sources(instance).to_vec(),
        }
    }

    /// Seeds → spread → shape. Unresolvable tokens give an empty result.
    pub fn retrieve(&self, tokens: &[String]) -> RetrievalResult {
        let seeds = self.resolve_seeds(tokens);
        if seeds.is_empty() {
            return RetrievalResult::default();
        }
        let session = self.spread(&seeds);
        tracing::debug!(
            seeds = seeds.len(),
            touched = session.touched(),
            "retrieval spread"
        );
        self.shape(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::FixedFrequency;
    use crate::graph::EdgeKind;
    use crate::meta::MetaId;
    use crate::vector::Vector;
    use crate::word_vectors::ZeroVectors;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    const FREQ: FixedFrequency = FixedFrequency(1e-5);
    const VECS: ZeroVectors = ZeroVectors { dim: 2 };

    /// One meta and one instance per name, in order.
    fn registry(names: &[&str]) -> (Registry, Vec<InstanceId>) {
        let mut reg = Registry::new();
        let mut rng = SmallRng::seed_from_u64(42);
        let zero = Vector::zeros(2);
        let ids = names
            .iter()
            .map(|name| {
                let meta = reg.ensure_meta(name, &FREQ, &VECS);
                reg.create_instance(meta, &zero, &zero, 0.0, &mut rng)
            })
            .collect();
        (reg, ids)
    }

    fn chain(ids: &[InstanceId]) -> PathGraph {
        let mut graph = PathGraph::new();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1], EdgeKind::Sequential);
        }
        graph
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ttl_bounds_reach_on_chain() {
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let (reg, ids) = registry(&names);
        let graph = chain(&ids);
        let config = MemoryConfig {
            retrieval_ttl: 4,
            ..MemoryConfig::default()
        };
        let diffuser = Diffuser::new(&config, &reg, &graph);
        let session = diffuser.spread(&[ids[0]]);
        for id in &ids[..=4] {
            assert!(session.light_count(*id) > 0, "{id} should be lit");
        }
        for id in &ids[5..] {
            assert_eq!(session.light_count(*id), 0, "{id} is 5+ hops away");
        }
    }

    #[test]
    fn test_reverse_sequential_reach() {
        let (reg, ids) = registry(&["a", "b", "c"]);
        let graph = chain(&ids);
        let config = MemoryConfig::default();
        let session = Diffuser::new(&config, &reg, &graph).spread(&[ids[2]]);
        assert!(session.light_count(ids[0]) > 0);
        assert_eq!(session.sources(ids[1])[0], ids[2]);
    }

    #[test]
    fn test_hierarchical_forward_only() {
        let (reg, ids) = registry(&["a", "b", "ab"]);
        let mut graph = PathGraph::new();
        graph.add_edge(ids[0], ids[2], EdgeKind::Hierarchical);
        let config = MemoryConfig::default();
        let diffuser = Diffuser::new(&config, &reg, &graph);
        assert!(diffuser.spread(&[ids[0]]).light_count(ids[2]) > 0);
        assert_eq!(diffuser.spread(&[ids[2]]).light_count(ids[0]), 0);
    }

    #[test]
    fn test_hub_penalty_shortens_reach() {
        let (mut reg, ids) = registry(&["a", "b", "c"]);
        let graph = chain(&ids);
        reg.instance_mut(ids[1]).unwrap().hub_penalty = 50.0;
        let config = MemoryConfig {
            retrieval_ttl: 3,
            ..MemoryConfig::default()
        };
        // penalty is capped at 2: reaching b costs 3, leaving nothing for c
        let session = Diffuser::new(&config, &reg, &graph).spread(&[ids[0]]);
        assert!(session.light_count(ids[1]) > 0);
        assert_eq!(session.light_count(ids[2]), 0);
    }

    #[test]
    fn test_converging_paths_each_light() {
        let (reg, ids) = registry(&["a", "b", "x", "y"]);
        let (a, b, x, y) = (ids[0], ids[1], ids[2], ids[3]);
        let mut graph = PathGraph::new();
        graph.add_edge(a, x, EdgeKind::Sequential);
        graph.add_edge(b, x, EdgeKind::Sequential);
        graph.add_edge(x, y, EdgeKind::Sequential);
        let config = MemoryConfig {
            retrieval_ttl: 2,
            ..MemoryConfig::default()
        };
        let session = Diffuser::new(&config, &reg, &graph).spread(&[a, b]);
        // x is reached from both seeds and passes both visits on to y
        assert_eq!(session.light_count(x), 2);
        assert_eq!(session.light_count(y), 2);
        assert_eq!(session.sources(y), &[x, x]);
        // each seed: itself, then once back from each of x's two visits
        assert_eq!(session.light_count(a), 3);
        assert_eq!(session.light_count(b), 3);
    }

    #[test]
    fn test_negative_hub_penalty_costs_nothing() {
        let (mut reg, ids) = registry(&["a", "b", "c"]);
        let graph = chain(&ids);
        reg.instance_mut(ids[1]).unwrap().hub_penalty = -5.0;
        let config = MemoryConfig {
            retrieval_ttl: 1,
            ..MemoryConfig::default()
        };
        let session = Diffuser::new(&config, &reg, &graph).spread(&[ids[0]]);
        assert_eq!(session.light_count(ids[1]), 1);
        assert_eq!(session.light_count(ids[2]), 0);
    }

    #[test]
    fn test_as_map_later_hit_replaces_sources() {
        let hit = |text: &str, instance: u64, sources: Vec<InstanceId>| RetrievalHit {
            text: text.to_string(),
            bucket: Bucket::PossiblyRelevant,
            instance: InstanceId(instance),
            light: 1,
            sources,
        };
        let result = RetrievalResult {
            hits: vec![
                hit("山", 1, vec![InstanceId(0)]),
                hit("山", 2, vec![InstanceId(3), InstanceId(4)]),
            ],
        };
        let map = result.as_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("山"), Some(&vec![InstanceId(3), InstanceId(4)]));
    }

    #[test]
    fn test_seeds_touch_themselves() {
        let (reg, ids) = registry(&["a"]);
        let graph = PathGraph::new();
        let config = MemoryConfig::default();
        let session = Diffuser::new(&config, &reg, &graph).spread(&[ids[0]]);
        assert_eq!(session.light_count(ids[0]), 1);
        assert_eq!(session.sources(ids[0]), &[ids[0]]);
    }

    #[test]
    fn test_unresolved_query_is_empty() {
        let (reg, ids) = registry(&["a", "b"]);
        let graph = chain(&ids);
        let config = MemoryConfig::default();
        let result = Diffuser::new(&config, &reg, &graph).retrieve(&tokens(&["z", "，"]));
        assert!(result.is_empty());
        assert!(result.as_map().is_empty());
    }

    #[test]
    fn test_seed_prefers_most_used() {
        let (mut reg, _) = registry(&[]);
        let mut rng = SmallRng::seed_from_u64(1);
        let zero = Vector::zeros(2);
        let meta = reg.ensure_meta("a", &FREQ, &VECS);
        let first = reg.create_instance(meta, &zero, &zero, 0.0, &mut rng);
        let second = reg.create_instance(meta, &zero, &zero, 0.0, &mut rng);
        let graph = PathGraph::new();
        let config = MemoryConfig::default();

        let diffuser = Diffuser::new(&config, &reg, &graph);
        assert_eq!(diffuser.resolve_seeds(&tokens(&["a"])), vec![first]);

        reg.instance_mut(second).unwrap().stats.use_count = 2;
        let diffuser = Diffuser::new(&config, &reg, &graph);
        assert_eq!(diffuser.resolve_seeds(&tokens(&["a"])), vec![second]);
    }

    #[test]
    fn test_retrieval_does_not_mutate() {
        let (reg, ids) = registry(&["a", "b"]);
        let graph = chain(&ids);
        let config = MemoryConfig::default();
        let before = reg.instances().to_vec();
        Diffuser::new(&config, &reg, &graph).retrieve(&tokens(&["a"]));
        assert_eq!(reg.instances(), before.as_slice());
    }

    /// A hub connected to ten short-sentence metas.
    fn star(ten_labelled: bool) -> (Registry, PathGraph, Vec<InstanceId>) {
        let names = ["hub", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9"];
        let (mut reg, ids) = registry(&names);
        let mut graph = PathGraph::new();
        for (i, &leaf) in ids[1..].iter().enumerate() {
            graph.add_edge(ids[0], leaf, EdgeKind::Sequential);
            if ten_labelled || i < 5 {
                reg.meta_mut(MetaId(i as u64 + 1))
                    .unwrap()
                    .labels
                    .insert(Category::ShortSentence);
            }
        }
        (reg, graph, ids)
    }

    #[test]
    fn test_short_sentence_quota() {
        let (reg, graph, ids) = star(true);
        let config = MemoryConfig {
            retrieval_quota_possible: 0,
            ..MemoryConfig::default()
        };
        let diffuser = Diffuser::new(&config, &reg, &graph);
        let result = diffuser.shape(&diffuser.spread(&[ids[0]]));
        assert_eq!(result.len(), 9);
        assert!(result
            .hits
            .iter()
            .all(|h| h.bucket == Bucket::Category(Category::ShortSentence)));
        assert!(!result.hits.iter().any(|h| h.instance == ids[0]));
    }

    #[test]
    fn test_possibly_relevant_fills_after_quotas() {
        let (reg, graph, ids) = star(true);
        let config = MemoryConfig::default();
        let diffuser = Diffuser::new(&config, &reg, &graph);
        let result = diffuser.shape(&diffuser.spread(&[ids[0]]));
        assert_eq!(result.in_bucket(Bucket::Category(Category::ShortSentence)).count(), 9);
        let extra: Vec<_> = result.in_bucket(Bucket::PossiblyRelevant).collect();
        assert_eq!(extra.len(), 2);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let (reg, graph, ids) = star(false);
        let config = MemoryConfig {
            retrieval_ttl: 2,
            ..MemoryConfig::default()
        };
        let diffuser = Diffuser::new(&config, &reg, &graph);
        let result = diffuser.shape(&diffuser.spread(&[ids[0]]));
        let short: Vec<InstanceId> = result
            .in_bucket(Bucket::Category(Category::ShortSentence))
            .map(|h| h.instance)
            .collect();
        assert_eq!(short, ids[1..6].to_vec());
        assert_eq!(result.as_map().get("s0"), Some(&vec![ids[0]]));
    }
}
