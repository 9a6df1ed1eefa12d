//! Instance and constraint deltas

use glam::Mat4;
use serde::{Deserialize, Serialize};

/// Placement transforms for many repeated copies of one entity's mesh.
///
/// `parent_path` names the local space the transforms are expressed in.
/// An absent parent falls back to the scene root (logged as a warning,
/// never dropped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfoDelta {
    pub path: String,
    /// Path of the entity whose mesh is instanced.
    pub entity_path: String,
    pub parent_path: String,
    pub transforms: Vec<Mat4>,
}

impl InstanceInfoDelta {
    pub fn new(path: impl Into<String>, entity_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entity_path: entity_path.into(),
            parent_path: String::new(),
            transforms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Aim,
    Parent,
    Position,
    Rotation,
    Scale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDelta {
    pub path: String,
    pub kind: ConstraintKind,
    pub source_paths: Vec<String>,
}
