use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::calibration::FrequencyCalibration;
use crate::config::MemoryConfig;
use crate::error::{HighwayError, Result};
use crate::frequency::{FixedFrequency, FrequencyProvider};
use crate::graph::PathGraph;
use crate::instance::InstanceId;
use crate::placement::Placer;
use crate::recitation::{RecitationReport, Reciter};
use crate::registry::Registry;
use crate::retrieval::{Diffuser, RetrievalResult};
use crate::segment::{Segmenter, SimpleSegmenter};
use crate::tables::Tables;
use crate::text::is_punctuation;
use crate::word_vectors::{VectorProvider, ZeroVectors};

/// Table counts reported by `MemorySystem::stats`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub metas: usize,
    pub instances: usize,
    pub edges: usize,
    pub crystallized_metas: usize,
    pub max_level: u32,
}

/// Collects the collaborators of a `MemorySystem`.
///
/// Anything left unset degrades to a neutral fallback: zero vectors, the
/// fallback frequency, a flat calibration and the dictionary-free segmenter.
pub struct MemorySystemBuilder {
    config: MemoryConfig,
    segmenter: Option<Box<dyn Segmenter>>,
    vectors: Option<Box<dyn VectorProvider>>,
    frequency: Option<Box<dyn FrequencyProvider>>,
    calibration: Option<FrequencyCalibration>,
}

impl MemorySystemBuilder {
    pub fn segmenter(mut self, segmenter: Box<dyn Segmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn vectors(mut self, vectors: Box<dyn VectorProvider>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn frequency(mut self, frequency: Box<dyn FrequencyProvider>) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn calibration(mut self, calibration: FrequencyCalibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn build(self) -> MemorySystem {
        let mut config = self.config;

        let vectors = match self.vectors {
            Some(v) if v.dim() > 0 => {
                config.vector_dim = v.dim();
                v
            }
            _ => Box::new(ZeroVectors {
                dim: config.vector_dim,
            }),
        };
        let frequency = self
            .frequency
            .unwrap_or_else(|| Box::new(FixedFrequency(config.frequency_fallback_avg_freq)));

        let typical = frequency.typical_frequency();
        let calibration = match self.calibration {
            Some(mut c) => {
                if !c.has_average() {
                    c.avg_freq = typical;
                }
                c
            }
            None => FrequencyCalibration::fallback(&config, Some(typical)),
        };

        MemorySystem {
            config,
            registry: Registry::new(),
            graph: PathGraph::new(),
            calibration,
            segmenter: self.segmenter.unwrap_or_else(|| Box::new(SimpleSegmenter)),
            vectors,
            frequency,
        }
    }
}

/// The memory engine: tables plus the collaborators that feed them.
///
/// Writes and recitations mutate the tables; retrieval only reads them.
pub struct MemorySystem {
    config: MemoryConfig,
    registry: Registry,
    graph: PathGraph,
    calibration: FrequencyCalibration,
    segmenter: Box<dyn Segmenter>,
    vectors: Box<dyn VectorProvider>,
    frequency: Box<dyn FrequencyProvider>,
}

impl MemorySystem {
    pub fn builder(config: MemoryConfig) -> MemorySystemBuilder {
        MemorySystemBuilder {
            config,
            segmenter: None,
            vectors: None,
            frequency: None,
            calibration: None,
        }
    }

    /// Engine with every collaborator at its fallback.
    pub fn new(config: MemoryConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &PathGraph {
        &self.graph
    }

    pub fn calibration(&self) -> &FrequencyCalibration {
        &self.calibration
    }

    /// Borrow the collaborators and the tables separately.
    fn parts(&mut self) -> (Placer<'_>, &dyn Segmenter, &mut Registry, &mut PathGraph) {
        let Self {
            config,
            registry,
            graph,
            calibration,
            segmenter,
            vectors,
            frequency,
        } = self;
        let placer = Placer::new(config, calibration, &**frequency, &**vectors);
        (placer, &**segmenter, registry, graph)
    }

    /// Segment `text` into words and write them as one sequence.
    pub fn write_text(&mut self, text: &str, rng: &mut impl Rng) -> Result<Vec<InstanceId>> {
        if is_punctuation(text) {
            return Err(HighwayError::EmptyInput);
        }
        let tokens = self.segmenter.segment_words(text);
        Ok(self.write_sequence(&tokens, rng))
    }

    /// Write pre-segmented tokens. Blank and punctuation tokens are skipped.
    pub fn write_sequence(&mut self, tokens: &[String], rng: &mut impl Rng) -> Vec<InstanceId> {
        let (placer, _, registry, graph) = self.parts();
        placer.write_sequence(registry, graph, tokens, rng)
    }

    /// Rehearse `text` at every granularity until it converges.
    pub fn recite_text(&mut self, text: &str, rng: &mut impl Rng) -> Result<RecitationReport> {
        let (placer, segmenter, registry, graph) = self.parts();
        Reciter::new(placer, segmenter).recite(registry, graph, text, rng)
    }

    /// Segment `text` into words and retrieve from them.
    pub fn retrieve_text(&self, text: &str) -> Result<RetrievalResult> {
        if is_punctuation(text) {
            return Err(HighwayError::EmptyInput);
        }
        let tokens = self.segmenter.segment_words(text);
        Ok(self.retrieve(&tokens))
    }

    pub fn retrieve(&self, tokens: &[String]) -> RetrievalResult {
        Diffuser::new(&self.config, &self.registry, &self.graph).retrieve(tokens)
    }

    pub fn snapshot(&self) -> Tables {
        Tables::capture(&self.registry, &self.graph)
    }

    /// Replace every table with `tables`. On error the engine is unchanged.
    pub fn restore(&mut self, tables: Tables) -> Result<()> {
        let (registry, graph) = tables.into_state()?;
        self.registry = registry;
        self.graph = graph;
        Ok(())
    }

    pub fn stats(&self) -> SystemStats {
        let metas = self.registry.metas();
        SystemStats {
            metas: metas.len(),
            instances: self.registry.instances().len(),
            edges: self.graph.edge_count(),
            crystallized_metas: metas.iter().filter(|m| m.is_crystallized()).count(),
            max_level: metas.iter().map(|m| m.level).max().unwrap_or(0),
        }
    }
}
