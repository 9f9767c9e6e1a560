use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::PAYLOAD_CRYSTALLIZED_COUNT;
use crate::meta::MetaId;
use crate::vector::Vector;

/// Arena index of an instance in its registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStats {
    /// Times this instance was chosen or created by a lookup.
    pub use_count: u32,
    /// Times a sequential edge touching this instance was walked.
    pub pass_count: u32,
    /// Nonzero right after crystallizing; absorbs the next crystallization.
    pub refractory: u32,
}

/// One spatial occurrence of a meta.
///
/// `meta_id` and `position` are fixed at creation; only the counters move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceNode {
    pub id: InstanceId,
    pub meta_id: MetaId,
    position: Vector,
    pub stats: InstanceStats,
    /// Extra TTL cost for reaching this node during retrieval.
    pub hub_penalty: f64,
    pub payload: BTreeMap<String, String>,
}

impl InstanceNode {
    pub fn new(id: InstanceId, meta_id: MetaId, position: Vector) -> Self {
        Self {
            id,
            meta_id,
            position,
            stats: InstanceStats::default(),
            hub_penalty: 0.0,
            payload: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> &Vector {
        &self.position
    }

    /// Increment usage count.
    pub fn use_once(&mut self) {
        self.stats.use_count += 1;
    }

    /// Count down the refractory flag, returning whether it was set.
    pub fn cool_down(&mut self) -> bool {
        let was_set = self.stats.refractory > 0;
        self.stats.refractory = self.stats.refractory.saturating_sub(1);
        was_set
    }

    /// Crystallized-unit count stamped in the payload, if any.
    pub fn payload_crystallized_count(&self) -> Option<u32> {
        self.payload
            .get(PAYLOAD_CRYSTALLIZED_COUNT)
            .and_then(|v| v.parse().ok())
    }
}
