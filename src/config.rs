//! Per-session feature toggles
//!
//! Consulted per delta while a batch is applied. Disabling a toggle leaves
//! the corresponding replica property untouched; it never drops entities.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Apply position/rotation/scale from transform deltas.
    pub sync_transform: bool,
    /// Apply visibility flags from transform deltas.
    pub sync_visibility: bool,
    /// Apply mesh geometry payloads.
    pub sync_meshes: bool,
    /// Mirror mesh geometry into a collision proxy.
    pub make_mesh_colliders: bool,
    /// Apply material-index assignments.
    pub sync_materials: bool,
    /// Apply focal length / sensor size / lens shift to cameras.
    pub use_physical_camera_params: bool,
    /// Uniform scale applied to incoming entity positions.
    pub scale_factor: f32,
    /// Name reported when a peer queries `ClientName`.
    pub client_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_transform: true,
            sync_visibility: true,
            sync_meshes: true,
            make_mesh_colliders: true,
            sync_materials: true,
            use_physical_camera_params: false,
            scale_factor: 1.0,
            client_name: "scenelink".to_string(),
        }
    }
}
