//! One synchronization batch worth of deltas
//!
//! Ordered as the stages apply: assets first (entities may bind to them),
//! then entities, constraints, instanced entities, instance infos. All
//! deltas in one snapshot belong to the same fence-bracketed batch.

use serde::{Deserialize, Serialize};

use super::asset::AssetDelta;
use super::entity::EntityDelta;
use super::instance::{ConstraintDelta, InstanceInfoDelta};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub assets: Vec<AssetDelta>,
    pub entities: Vec<EntityDelta>,
    pub constraints: Vec<ConstraintDelta>,
    /// Prototype entities referenced by instance infos.
    pub instanced_entities: Vec<EntityDelta>,
    pub instance_infos: Vec<InstanceInfoDelta>,
}

impl SceneSnapshot {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
            && self.entities.is_empty()
            && self.constraints.is_empty()
            && self.instanced_entities.is_empty()
            && self.instance_infos.is_empty()
    }

    pub fn delta_count(&self) -> usize {
        self.assets.len()
            + self.entities.len()
            + self.constraints.len()
            + self.instanced_entities.len()
            + self.instance_infos.len()
    }
}
