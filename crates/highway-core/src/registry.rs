use std::collections::HashMap;

use rand::Rng;

use crate::error::{HighwayError, Result};
use crate::frequency::FrequencyProvider;
use crate::instance::{InstanceId, InstanceNode};
use crate::meta::{MetaEntry, MetaId};
use crate::text::normalize;
use crate::vector::Vector;
use crate::word_vectors::VectorProvider;

/// Owner of the meta table and the instance table.
///
/// Both tables are arenas: an id is the entry's index, handed out
/// monotonically and never reused. `key_index` maps normalized text to the
/// meta that owns it and is rebuilt whenever tables are restored.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    metas: Vec<MetaEntry>,
    instances: Vec<InstanceNode>,
    key_index: HashMap<String, MetaId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted rows.
    ///
    /// Rows may arrive in any order but ids must be dense, every instance must
    /// point at an existing meta, and normalized keys must be unique. Meta
    /// ownership sets are recomputed from the instance rows.
    pub fn from_parts(mut metas: Vec<MetaEntry>, mut instances: Vec<InstanceNode>) -> Result<Self> {
        metas.sort_by_key(|m| m.id);
        instances.sort_by_key(|n| n.id);

        for (idx, meta) in metas.iter().enumerate() {
            if meta.id.0 != idx as u64 {
                return Err(HighwayError::CorruptTables(format!(
                    "meta ids not dense: expected meta-{idx}, found {}",
                    meta.id
                )));
            }
        }
        for (idx, node) in instances.iter().enumerate() {
            if node.id.0 != idx as u64 {
                return Err(HighwayError::CorruptTables(format!(
                    "instance ids not dense: expected node-{idx}, found {}",
                    node.id
                )));
            }
        }

        let mut key_index = HashMap::with_capacity(metas.len());
        for meta in &mut metas {
            if key_index.insert(meta.key.clone(), meta.id).is_some() {
                return Err(HighwayError::CorruptTables(format!(
                    "duplicate meta key '{}'",
                    meta.key
                )));
            }
            meta.instances.clear();
        }
        for node in &instances {
            let owner = metas.get_mut(node.meta_id.0 as usize).ok_or_else(|| {
                HighwayError::CorruptTables(format!(
                    "{} owned by missing {}",
                    node.id, node.meta_id
                ))
            })?;
            owner.instances.insert(node.id);
        }

        Ok(Self {
            metas,
            instances,
            key_index,
        })
    }

    pub fn metas(&self) -> &[MetaEntry] {
        &self.metas
    }

    pub fn instances(&self) -> &[InstanceNode] {
        &self.instances
    }

    pub fn meta(&self, id: MetaId) -> Option<&MetaEntry> {
        self.metas.get(id.0 as usize)
    }

    pub fn meta_mut(&mut self, id: MetaId) -> Option<&mut MetaEntry> {
        self.metas.get_mut(id.0 as usize)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&InstanceNode> {
        self.instances.get(id.0 as usize)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut InstanceNode> {
        self.instances.get_mut(id.0 as usize)
    }

    /// Meta whose normalized key equals `normalize(text)`.
    pub fn find_meta(&self, text: &str) -> Option<&MetaEntry> {
        self.key_index
            .get(&normalize(text))
            .and_then(|id| self.meta(*id))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }

    /// Owning meta of an instance.
    pub fn owner(&self, id: InstanceId) -> Option<&MetaEntry> {
        self.instance(id).and_then(|n| self.meta(n.meta_id))
    }

    pub fn private_frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.metas.iter().map(|m| m.private_freq)
    }

    /// Find or create the meta for `text`.
    ///
    /// An existing meta has its private frequency bumped and its display text
    /// upgraded when `text` is no shorter. A new meta takes its global
    /// frequency from the collaborators and its category vector from the
    /// display text, or from the key when the display text has no vector.
    /// Callers must not pass punctuation-only text.
    pub fn ensure_meta(
        &mut self,
        text: &str,
        frequency: &dyn FrequencyProvider,
        vectors: &dyn VectorProvider,
    ) -> MetaId {
        let key = normalize(text);
        if let Some(&id) = self.key_index.get(&key) {
            let meta = &mut self.metas[id.0 as usize];
            meta.private_freq += 1.0;
            meta.upgrade_text(text);
            return id;
        }

        let id = MetaId(self.metas.len() as u64);
        let global_freq = frequency.word_frequency(&key);
        let mut category_vector = vectors.vector(text);
        if category_vector.is_zero() {
            category_vector = vectors.vector(&key);
        }
        self.metas.push(MetaEntry::new(
            id,
            key.clone(),
            text.to_string(),
            global_freq,
            category_vector,
        ));
        self.key_index.insert(key, id);
        id
    }

    /// Place a new instance of `meta_id` at `base + bias + jitter`.
    ///
    /// Jitter is uniform per axis within `jitter_scale`; zero disables it.
    pub fn create_instance(
        &mut self,
        meta_id: MetaId,
        base: &Vector,
        bias: &Vector,
        jitter_scale: f64,
        rng: &mut impl Rng,
    ) -> InstanceId {
        let id = InstanceId(self.instances.len() as u64);
        let jitter = Vector::jitter(base.dim(), jitter_scale, rng);
        let position = &(base + bias) + &jitter;
        self.instances.push(InstanceNode::new(id, meta_id, position));
        if let Some(meta) = self.meta_mut(meta_id) {
            meta.instances.insert(id);
        }
        id
    }
}
