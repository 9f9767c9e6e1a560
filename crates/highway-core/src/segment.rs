use jieba_rs::Jieba;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{HighwayError, Result};

use crate::text::{is_cjk, is_punctuation, normalize};

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[。！？!?]+").unwrap());
static CLAUSE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[，,;；]+").unwrap());

/// A split piece of text: punctuated display form plus its lookup key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentedUnit {
    pub display: String,
    pub normalized: String,
}

impl SegmentedUnit {
    pub fn new(display: &str) -> Self {
        Self {
            display: display.to_string(),
            normalized: normalize(display),
        }
    }
}

/// Text segmentation capability.
///
/// Backends only have to tokenize; the structural splits (paragraph, long
/// sentence, short clause) default to punctuation rules shared by all of them.
pub trait Segmenter {
    /// Finest-grained tokens, used for pre-registration and edge walking.
    fn segment_morphemes(&self, text: &str) -> Vec<String>;

    /// Regular word tokens, used for phrases, writes and queries.
    fn segment_words(&self, text: &str) -> Vec<String>;

    /// One unit per non-blank line.
    fn split_paragraphs(&self, text: &str) -> Vec<SegmentedUnit> {
        text.split('\n')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(SegmentedUnit::new)
            .collect()
    }

    /// Split at sentence-ending punctuation, which stays on the sentence.
    fn split_long_sentences(&self, paragraphs: &[String]) -> Vec<SegmentedUnit> {
        paragraphs
            .iter()
            .flat_map(|p| split_keeping_delimiters(p, &SENTENCE_END))
            .filter(|u| !u.normalized.is_empty())
            .collect()
    }

    /// Split at commas and semicolons only.
    fn split_short_sentences(&self, sentences: &[String]) -> Vec<SegmentedUnit> {
        sentences
            .iter()
            .flat_map(|s| split_keeping_delimiters(s, &CLAUSE_END))
            .filter(|u| !u.normalized.is_empty())
            .collect()
    }
}

/// Cut `text` after every delimiter match, trimming each piece.
fn split_keeping_delimiters(text: &str, pattern: &Regex) -> Vec<SegmentedUnit> {
    let mut units = Vec::new();
    let mut last = 0;
    for m in pattern.find_iter(text) {
        let piece = text[last..m.end()].trim();
        if !piece.is_empty() {
            units.push(SegmentedUnit::new(piece));
        }
        last = m.end();
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        units.push(SegmentedUnit::new(tail));
    }
    units
}

/// Dictionary-free segmenter.
///
/// Morphemes: CJK runs cut into two-character chunks (a trailing single
/// character joins the chunk before it), alphanumeric runs kept whole.
/// Words: every CJK character alone, alphanumeric runs kept whole.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleSegmenter;

impl SimpleSegmenter {
    fn cjk_chunks(run: &[char]) -> Vec<String> {
        if run.len() <= 1 {
            return run.iter().map(|c| c.to_string()).collect();
        }
        let mut chunks: Vec<String> = run.chunks(2).map(|c| c.iter().collect()).collect();
        if chunks.len() >= 2 && chunks[chunks.len() - 1].chars().count() == 1 {
            let last = chunks.pop().unwrap_or_default();
            if let Some(prev) = chunks.last_mut() {
                prev.push_str(&last);
            }
        }
        chunks
    }
}

impl Segmenter for SimpleSegmenter {
    fn segment_morphemes(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut cjk: Vec<char> = Vec::new();
        let mut alnum = String::new();

        for c in text.chars() {
            if is_cjk(c) {
                if !alnum.is_empty() {
                    tokens.push(std::mem::take(&mut alnum));
                }
                cjk.push(c);
            } else if c.is_alphanumeric() {
                if !cjk.is_empty() {
                    tokens.extend(Self::cjk_chunks(&cjk));
                    cjk.clear();
                }
                alnum.push(c);
            } else {
                if !cjk.is_empty() {
                    tokens.extend(Self::cjk_chunks(&cjk));
                    cjk.clear();
                }
                if !alnum.is_empty() {
                    tokens.push(std::mem::take(&mut alnum));
                }
            }
        }
        if !cjk.is_empty() {
            tokens.extend(Self::cjk_chunks(&cjk));
        }
        if !alnum.is_empty() {
            tokens.push(alnum);
        }
        tokens.retain(|t| !is_punctuation(t));
        tokens
    }

    fn segment_words(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut alnum = String::new();

        for c in text.chars() {
            if is_cjk(c) {
                if !alnum.is_empty() {
                    tokens.push(std::mem::take(&mut alnum));
                }
                tokens.push(c.to_string());
            } else if c.is_alphanumeric() {
                alnum.push(c);
            } else if !alnum.is_empty() {
                tokens.push(std::mem::take(&mut alnum));
            }
        }
        if !alnum.is_empty() {
            tokens.push(alnum);
        }
        tokens.retain(|t| !is_punctuation(t));
        tokens
    }
}

/// Every non-punctuation character is both a morpheme and a word.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharSegmenter;

impl CharSegmenter {
    fn chars(text: &str) -> Vec<String> {
        text.chars()
            .map(|c| c.to_string())
            .filter(|c| !is_punctuation(c))
            .collect()
    }
}

impl Segmenter for CharSegmenter {
    fn segment_morphemes(&self, text: &str) -> Vec<String> {
        Self::chars(text)
    }

    fn segment_words(&self, text: &str) -> Vec<String> {
        Self::chars(text)
    }
}

/// Dictionary segmenter backed by jieba.
///
/// Morphemes come from search-mode cutting, which also emits the shorter
/// words inside long ones. Words come from the default precise mode.
pub struct JiebaSegmenter {
    jieba: Jieba,
}

impl JiebaSegmenter {
    /// Loads the bundled dictionary.
    pub fn new() -> Self {
        Self {
            jieba: Jieba::new(),
        }
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for JiebaSegmenter {
    fn segment_morphemes(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut_for_search(text, true)
            .into_iter()
            .filter(|t| !is_punctuation(t))
            .map(str::to_string)
            .collect()
    }

    fn segment_words(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .filter(|t| !is_punctuation(t))
            .map(str::to_string)
            .collect()
    }
}

/// Segmentation backend, chosen once when the engine is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterBackend {
    #[default]
    Simple,
    Char,
    Jieba,
}

impl SegmenterBackend {
    pub fn build(self) -> Box<dyn Segmenter> {
        match self {
            Self::Simple => Box::new(SimpleSegmenter),
            Self::Char => Box::new(CharSegmenter),
            Self::Jieba => Box::new(JiebaSegmenter::new()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Char => "char",
            Self::Jieba => "jieba",
        }
    }

}

impl FromStr for SegmenterBackend {
    type Err = HighwayError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "char" => Ok(Self::Char),
            "jieba" => Ok(Self::Jieba),
            _ => Err(HighwayError::UnknownSegmenter(name.to_string())),
        }
    }
}
