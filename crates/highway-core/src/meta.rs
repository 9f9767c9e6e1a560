use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;
use crate::vector::Vector;

/// Arena index of a meta in its registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaId(pub u64);

impl fmt::Display for MetaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "meta-{}", self.0)
    }
}

/// Recitation granularity a meta has been seen at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Phrase,
    ShortSentence,
    LongSentence,
    Paragraph,
    FullText,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phrase => "phrase",
            Self::ShortSentence => "short_sentence",
            Self::LongSentence => "long_sentence",
            Self::Paragraph => "paragraph",
            Self::FullText => "full_text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "phrase" => Some(Self::Phrase),
            "short_sentence" => Some(Self::ShortSentence),
            "long_sentence" => Some(Self::LongSentence),
            "paragraph" => Some(Self::Paragraph),
            "full_text" => Some(Self::FullText),
            _ => None,
        }
    }
}

/// A lexical type: the dictionary entry shared by all of its occurrences.
///
/// Identity is `key`, the punctuation-free form. `text` is the richest
/// surface form seen so far and may carry punctuation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub id: MetaId,
    pub key: String,
    pub text: String,
    pub global_freq: f64,
    pub private_freq: f64,
    pub level: u32,
    /// Number of base units this meta was built from; 1 for atomic metas.
    pub crystallized_count: u32,
    pub labels: BTreeSet<Category>,
    pub category_vector: Vector,
    pub instances: BTreeSet<InstanceId>,
}

impl MetaEntry {
    pub fn new(id: MetaId, key: String, text: String, global_freq: f64, category_vector: Vector) -> Self {
        Self {
            id,
            key,
            text,
            global_freq,
            private_freq: 1.0,
            level: 0,
            crystallized_count: 1,
            labels: BTreeSet::new(),
            category_vector,
            instances: BTreeSet::new(),
        }
    }

    /// Replace the display text when `surface` is at least as long.
    pub fn upgrade_text(&mut self, surface: &str) {
        if !surface.is_empty() && surface.chars().count() >= self.text.chars().count() {
            self.text = surface.to_string();
        }
    }

    pub fn is_crystallized(&self) -> bool {
        self.level > 0
    }

    pub fn has_label(&self, category: Category) -> bool {
        self.labels.contains(&category)
    }
}
