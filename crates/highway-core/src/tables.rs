use serde::{Deserialize, Serialize};

use crate::error::{HighwayError, Result};
use crate::graph::{EdgeRecord, PathGraph};
use crate::instance::InstanceNode;
use crate::meta::MetaEntry;
use crate::registry::Registry;

/// Flat snapshot of the three engine tables. The unit of persistence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub metas: Vec<MetaEntry>,
    pub instances: Vec<InstanceNode>,
    pub edges: Vec<EdgeRecord>,
}

impl Tables {
    pub fn capture(registry: &Registry, graph: &PathGraph) -> Self {
        Self {
            metas: registry.metas().to_vec(),
            instances: registry.instances().to_vec(),
            edges: graph.records(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty() && self.instances.is_empty() && self.edges.is_empty()
    }

    /// Validate and rebuild the live registry and graph.
    pub fn into_state(self) -> Result<(Registry, PathGraph)> {
        let registry = Registry::from_parts(self.metas, self.instances)?;
        let known = registry.instances().len() as u64;
        if let Some(edge) = self
            .edges
            .iter()
            .find(|e| e.src.0 >= known || e.dst.0 >= known)
        {
            return Err(HighwayError::CorruptTables(format!(
                "{} edge {} -> {} references a missing instance",
                edge.kind.as_str(),
                edge.src,
                edge.dst
            )));
        }
        Ok((registry, PathGraph::from_records(self.edges)))
    }
}
