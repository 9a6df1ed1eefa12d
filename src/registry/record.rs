//! Replica records
//!
//! An [`EntityRecord`] binds a remote identifier to a local object handle
//! and caches the replica-side state of its sub-components. Skeleton data
//! and reference aliases are stored in deferred form here and resolved
//! after the whole batch has applied.

use glam::{Quat, Vec2, Vec3, Vec4};

use super::hooks::{MeshHandle, ObjectHandle};
use crate::model::{EntityKind, Identifier, LightKind};

/// Skeleton bindings that could not be resolved while the batch was being
/// walked: bone paths may point at entities later in the same batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBones {
    pub bone_paths: Vec<String>,
    /// Explicit root bone path; derived from bone ancestry when None.
    pub root_bone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub fov: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub focal_length: f32,
    pub sensor_size: Vec2,
    pub lens_shift: Vec2,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            fov: 60.0,
            near_plane: 0.3,
            far_plane: 1000.0,
            focal_length: 0.0,
            sensor_size: Vec2::ZERO,
            lens_shift: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub kind: LightKind,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    pub spot_angle: f32,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            color: Vec4::ONE,
            intensity: 1.0,
            range: 0.0,
            spot_angle: 30.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshState {
    /// Host handle for the imported geometry, if import succeeded.
    pub handle: Option<MeshHandle>,
    pub points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uv0: Vec<Vec2>,
    pub uv1: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub material_ids: Vec<i32>,
    /// Resolved bone handles; empty until bone resolution runs.
    pub bones: Vec<ObjectHandle>,
    pub root_bone: Option<ObjectHandle>,
    /// Disabled while a mesh assignment is in flight to avoid transient
    /// skinning artifacts; re-enabled when bones resolve.
    pub skinning_enabled: bool,
    pub blendshape_count: u32,
    pub has_collision_proxy: bool,
    /// Set when geometry was mirrored onto an instancing prototype.
    pub instancing_enabled: bool,
}

impl MeshState {
    /// Sub-mesh count, one per distinct material id (at least one once any
    /// geometry exists).
    pub fn submesh_count(&self) -> usize {
        if self.indices.is_empty() && self.points.is_empty() {
            return 0;
        }
        let mut ids: Vec<i32> = self.material_ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids.len().max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointsState {
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

/// One registry entry: remote identity bound to a local replica.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub ident: Identifier,
    pub handle: ObjectHandle,
    pub kind: EntityKind,
    /// Pre-existing in the local scene; updated but never created or
    /// destroyed by this system.
    pub host_owned: bool,
    /// Prototype for instance batches.
    pub instanced_prototype: bool,
    pub visible: bool,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// When set, this record mirrors the referenced path's full state.
    pub reference: Option<String>,
    pub pending_bones: Option<PendingBones>,
    pub camera: Option<CameraState>,
    pub light: Option<LightState>,
    pub mesh: Option<MeshState>,
    pub points: Option<PointsState>,
}

impl EntityRecord {
    pub fn new(ident: Identifier, handle: ObjectHandle, host_owned: bool) -> Self {
        Self {
            ident,
            handle,
            kind: EntityKind::Transform,
            host_owned,
            instanced_prototype: false,
            visible: true,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            reference: None,
            pending_bones: None,
            camera: None,
            light: None,
            mesh: None,
            points: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.ident.path
    }

    pub fn is_reference_alias(&self) -> bool {
        self.reference.is_some()
    }
}
