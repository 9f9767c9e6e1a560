//! Crystalline highway: a find-or-build textual memory engine.
//!
//! Text is remembered as instances placed in a shared vector space. Looking a
//! unit up either finds an existing instance within a frequency-dependent
//! radius or builds a new one. Repeated paths between instances crystallize
//! into higher-level units, and retrieval spreads a decaying TTL over the
//! resulting graph.
//!
//! No I/O: persistence and transport live in other crates.

pub mod calibration;
pub mod config;
pub mod constants;
pub mod crystallize;
pub mod error;
pub mod frequency;
pub mod graph;
pub mod instance;
pub mod meta;
pub mod placement;
pub mod recitation;
pub mod registry;
pub mod retrieval;
pub mod segment;
pub mod serde_compat;
pub mod system;
pub mod tables;
pub mod text;
pub mod tolerance;
pub mod vector;
pub mod word_vectors;

pub use calibration::FrequencyCalibration;
pub use config::MemoryConfig;
pub use constants::EPSILON;
pub use crystallize::{Crystallizer, threshold};
pub use error::{HighwayError, Result};
pub use frequency::{FixedFrequency, FrequencyProvider, FrequencyTable};
pub use graph::{EdgeKind, EdgeRecord, PathGraph};
pub use instance::{InstanceId, InstanceNode, InstanceStats};
pub use meta::{Category, MetaEntry, MetaId};
pub use placement::Placer;
pub use recitation::{RecitationPlanner, RecitationReport, RecitationUnit, Reciter};
pub use registry::Registry;
pub use retrieval::{Bucket, Diffuser, RetrievalHit, RetrievalResult, SessionState};
pub use segment::{
    CharSegmenter, JiebaSegmenter, SegmentedUnit, Segmenter, SegmenterBackend, SimpleSegmenter,
};
pub use serde_compat::{CURRENT_VERSION, export_json, import_json};
pub use system::{MemorySystem, MemorySystemBuilder, SystemStats};
pub use tables::Tables;
pub use text::normalize;
pub use tolerance::Tolerance;
pub use vector::Vector;
pub use word_vectors::{VectorProvider, WordVectorTable, ZeroVectors};
