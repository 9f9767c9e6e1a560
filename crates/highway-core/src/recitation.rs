//! Recitation: split a text into nested units and rehearse them until every
//! unit is a known meta.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{HighwayError, Result};
use crate::graph::PathGraph;
use crate::meta::{Category, MetaId};
use crate::placement::Placer;
use crate::registry::Registry;
use crate::segment::{SegmentedUnit, Segmenter};
use crate::text::{is_punctuation, normalize};

/// One rehearsal target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecitationUnit {
    pub display: String,
    pub normalized: String,
    pub category: Category,
}

impl RecitationUnit {
    fn from_segment(unit: &SegmentedUnit, category: Category) -> Self {
        Self {
            display: unit.display.clone(),
            normalized: unit.normalized.clone(),
            category,
        }
    }
}

pub struct RecitationPlanner;

impl RecitationPlanner {
    /// Units from finest to coarsest: phrases, short sentences, long
    /// sentences, paragraphs, then the whole trimmed text.
    pub fn build_plan(segmenter: &dyn Segmenter, text: &str) -> Vec<RecitationUnit> {
        let paragraphs = segmenter.split_paragraphs(text);
        let long = segmenter.split_long_sentences(&displays(&paragraphs));
        let short = segmenter.split_short_sentences(&displays(&long));

        let mut plan = Vec::new();
        for clause in &short {
            for phrase in segmenter.segment_words(&clause.display) {
                plan.push(RecitationUnit {
                    normalized: normalize(&phrase),
                    display: phrase,
                    category: Category::Phrase,
                });
            }
        }
        plan.extend(short.iter().map(|u| RecitationUnit::from_segment(u, Category::ShortSentence)));
        plan.extend(long.iter().map(|u| RecitationUnit::from_segment(u, Category::LongSentence)));
        plan.extend(paragraphs.iter().map(|u| RecitationUnit::from_segment(u, Category::Paragraph)));

        let whole = text.trim();
        if !whole.is_empty() {
            plan.push(RecitationUnit::from_segment(&SegmentedUnit::new(whole), Category::FullText));
        }
        plan
    }
}

fn displays(units: &[SegmentedUnit]) -> Vec<String> {
    units.iter().map(|u| u.display.clone()).collect()
}

/// Outcome of one recitation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecitationReport {
    pub rounds: u32,
    pub converged: bool,
    pub units: usize,
    /// Units registered outright after the round budget ran out.
    pub forced: usize,
}

pub struct Reciter<'a> {
    placer: Placer<'a>,
    segmenter: &'a dyn Segmenter,
}

impl<'a> Reciter<'a> {
    pub fn new(placer: Placer<'a>, segmenter: &'a dyn Segmenter) -> Self {
        Self { placer, segmenter }
    }

    /// Rehearse `text` until every planned unit is a registered meta or the
    /// round budget is spent, then label each unit's meta with its category.
    pub fn recite(
        &self,
        registry: &mut Registry,
        graph: &mut PathGraph,
        text: &str,
        rng: &mut impl Rng,
    ) -> Result<RecitationReport> {
        if is_punctuation(text) {
            return Err(HighwayError::EmptyInput);
        }

        let origin = self.placer.origin();
        for token in self.segmenter.segment_morphemes(text) {
            if !is_punctuation(&token) {
                self.placer.ensure_instance(registry, &token, &origin, rng);
            }
        }

        let plan = RecitationPlanner::build_plan(self.segmenter, text);
        let mut rounds = 0;
        let mut converged = false;
        while rounds < self.placer.config.recitation_max_rounds {
            rounds += 1;
            for unit in &plan {
                self.register_unit(registry, unit, rng);
                let tokens = self.segmenter.segment_morphemes(&unit.display);
                self.placer.write_sequence(registry, graph, &tokens, rng);
            }
            if plan.iter().all(|u| registry.contains_key(&u.normalized)) {
                converged = true;
                break;
            }
        }

        let forced = if converged {
            0
        } else {
            self.force_register(registry, &plan, rng)
        };
        tag_units(registry, &plan);

        let report = RecitationReport {
            rounds,
            converged,
            units: plan.len(),
            forced,
        };
        if forced > 0 {
            tracing::warn!(rounds, forced, "recitation did not converge, registered remaining units");
        }
        tracing::info!(
            rounds = report.rounds,
            converged = report.converged,
            units = report.units,
            "recitation finished"
        );
        Ok(report)
    }

    /// Phrases always become metas; coarser units only once the write path
    /// has crystallized them. A meta without instances gets one at the origin.
    fn register_unit(&self, registry: &mut Registry, unit: &RecitationUnit, rng: &mut impl Rng) {
        if unit.normalized.is_empty() {
            return;
        }
        let meta_id = if unit.category == Category::Phrase {
            registry.ensure_meta(&unit.display, self.placer.frequency, self.placer.vectors)
        } else {
            match registry.find_meta(&unit.normalized) {
                Some(meta) => meta.id,
                None => return,
            }
        };
        self.ensure_placed(registry, meta_id, rng);
    }

    fn ensure_placed(&self, registry: &mut Registry, meta_id: MetaId, rng: &mut impl Rng) {
        let unplaced = registry
            .meta(meta_id)
            .is_some_and(|m| m.instances.is_empty());
        if unplaced {
            let radius = self.placer.dynamic_radius(registry, Some(meta_id));
            let origin = self.placer.origin();
            self.placer.create_near(registry, meta_id, &origin, radius, rng);
        }
    }

    fn force_register(
        &self,
        registry: &mut Registry,
        plan: &[RecitationUnit],
        rng: &mut impl Rng,
    ) -> usize {
        let mut forced = 0;
        for unit in plan {
            if unit.normalized.is_empty() || registry.contains_key(&unit.normalized) {
                continue;
            }
            let meta_id =
                registry.ensure_meta(&unit.display, self.placer.frequency, self.placer.vectors);
            self.ensure_placed(registry, meta_id, rng);
            forced += 1;
        }
        forced
    }
}

/// Label each unit's meta and prefer the longer, punctuated display text.
fn tag_units(registry: &mut Registry, plan: &[RecitationUnit]) {
    for unit in plan {
        let Some(id) = registry.find_meta(&unit.normalized).map(|m| m.id) else {
            continue;
        };
        if let Some(meta) = registry.meta_mut(id) {
            if unit.display.chars().count() > meta.text.chars().count() {
                meta.text = unit.display.clone();
            }
            meta.labels.insert(unit.category);
        }
    }
}
