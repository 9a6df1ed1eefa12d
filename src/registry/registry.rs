//! Registry operations
//!
//! Lookup precedence: a valid numeric id wins over path lookup. Failure
//! semantics are deliberate no-ops: an empty path is a root-level no-op, a
//! missing host id means the host object was externally removed and the
//! delta is dropped, a stale backing object purges its entry on access.

use std::collections::HashMap;

use log::{debug, warn};

use super::hooks::{AssetImporter, LocalScene};
use super::record::{EntityRecord, MeshState, PendingBones};
use crate::config::SyncConfig;
use crate::model::{
    CameraDelta, CameraFlags, EntityKind, Identifier, LightDelta, LightFlags, MeshDelta,
    MeshFlags, PointsDelta, PointsFlags, TransformDelta, TransformFlags,
};

#[derive(Default)]
pub struct EntityRegistry {
    /// Entities created by this session, keyed by hierarchical path.
    by_path: HashMap<String, EntityRecord>,
    /// Host-owned entities, keyed by numeric id. Never created or
    /// destroyed here, only updated.
    by_id: HashMap<i32, EntityRecord>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_path.len() + self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty() && self.by_id.is_empty()
    }

    /// Drops every entry without touching local objects. Used at session
    /// close; the host framework owns teardown of its own scene.
    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_id.clear();
    }

    pub fn get_path(&self, path: &str) -> Option<&EntityRecord> {
        self.by_path.get(path)
    }

    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut EntityRecord> {
        self.by_path.get_mut(path)
    }

    /// Removes a path-keyed entry without destroying the local object.
    /// Used when the backing object already vanished externally.
    pub fn purge_path(&mut self, path: &str) -> bool {
        self.by_path.remove(path).is_some()
    }

    /// All session-created paths, sorted for deterministic query replies.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.by_path.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Paths directly under the scene root.
    pub fn root_paths(&self) -> Vec<String> {
        self.paths()
            .into_iter()
            .filter(|p| p.matches('/').count() == 1)
            .collect()
    }

    pub fn lookup(&self, ident: &Identifier) -> Option<&EntityRecord> {
        if ident.has_id() {
            if let Some(rec) = self.by_id.get(&ident.id) {
                return Some(rec);
            }
        }
        self.by_path.get(&ident.path)
    }

    /// Creates or updates the base transform replica for one delta.
    ///
    /// Returns None for the silent-drop cases: empty path, unknown host
    /// id, or a stale backing object.
    pub fn upsert_transform(
        &mut self,
        delta: &TransformDelta,
        scene: &mut dyn LocalScene,
        config: &SyncConfig,
    ) -> Option<&mut EntityRecord> {
        let ident = &delta.ident;
        if ident.has_id() {
            if let Some(rec) = self.by_id.get(&ident.id) {
                if !scene.is_valid(rec.handle) {
                    debug!("purging stale host entity id {}", ident.id);
                    self.by_id.remove(&ident.id);
                    return None;
                }
            } else {
                match scene.find_by_id(ident.id) {
                    Some(handle) => {
                        self.by_id
                            .insert(ident.id, EntityRecord::new(ident.clone(), handle, true));
                    }
                    None => {
                        // Host object externally removed; not an error.
                        debug!("dropping delta for unknown host id {}", ident.id);
                        return None;
                    }
                }
            }
            let rec = self.by_id.get_mut(&ident.id)?;
            Self::apply_transform(rec, delta, scene, config);
            return Some(rec);
        }

        if ident.path.is_empty() {
            // Root-level no-op.
            return None;
        }

        if let Some(rec) = self.by_path.get(&ident.path) {
            if !scene.is_valid(rec.handle) {
                debug!("purging stale entity at '{}'", ident.path);
                self.by_path.remove(&ident.path);
            }
        }
        if !self.by_path.contains_key(&ident.path) {
            let handle = scene.create_at_path(&ident.path);
            self.by_path.insert(
                ident.path.clone(),
                EntityRecord::new(ident.clone(), handle, false),
            );
        }
        let rec = self.by_path.get_mut(&ident.path)?;
        Self::apply_transform(rec, delta, scene, config);
        Some(rec)
    }

    fn apply_transform(
        rec: &mut EntityRecord,
        delta: &TransformDelta,
        scene: &mut dyn LocalScene,
        config: &SyncConfig,
    ) {
        let flags = delta.flags;
        let mut moved = false;
        if config.sync_transform {
            if flags.has(TransformFlags::POSITION) {
                rec.position = delta.position * config.scale_factor;
                moved = true;
            }
            if flags.has(TransformFlags::ROTATION) {
                rec.rotation = delta.rotation;
                moved = true;
            }
            if flags.has(TransformFlags::SCALE) {
                rec.scale = delta.scale;
                moved = true;
            }
            if moved {
                scene.set_local_transform(rec.handle, rec.position, rec.rotation, rec.scale);
            }
        }
        if config.sync_visibility && flags.has(TransformFlags::VISIBILITY) {
            rec.visible = delta.visible;
            scene.set_visible(rec.handle, delta.visible);
        }
        if flags.has(TransformFlags::REFERENCE) {
            rec.reference = if delta.reference.is_empty() {
                None
            } else {
                Some(delta.reference.clone())
            };
        }
    }

    pub fn upsert_camera(
        &mut self,
        delta: &CameraDelta,
        scene: &mut dyn LocalScene,
        config: &SyncConfig,
    ) -> Option<&mut EntityRecord> {
        let use_physical = config.use_physical_camera_params;
        let rec = self.upsert_transform(&delta.transform, scene, config)?;
        rec.kind = EntityKind::Camera;
        if rec.is_reference_alias() || delta.flags.is_empty() {
            return Some(rec);
        }
        let cam = rec.camera.get_or_insert_with(Default::default);
        if delta.flags.has(CameraFlags::FOV) {
            cam.fov = delta.fov;
        }
        if delta.flags.has(CameraFlags::NEAR_PLANE) {
            cam.near_plane = delta.near_plane;
        }
        if delta.flags.has(CameraFlags::FAR_PLANE) {
            cam.far_plane = delta.far_plane;
        }
        if use_physical {
            if delta.flags.has(CameraFlags::FOCAL_LENGTH) {
                cam.focal_length = delta.focal_length;
            }
            if delta.flags.has(CameraFlags::SENSOR_SIZE) {
                cam.sensor_size = delta.sensor_size;
            }
            if delta.flags.has(CameraFlags::LENS_SHIFT) {
                cam.lens_shift = delta.lens_shift;
            }
        }
        Some(rec)
    }

    pub fn upsert_light(
        &mut self,
        delta: &LightDelta,
        scene: &mut dyn LocalScene,
        config: &SyncConfig,
    ) -> Option<&mut EntityRecord> {
        let rec = self.upsert_transform(&delta.transform, scene, config)?;
        rec.kind = EntityKind::Light;
        if rec.is_reference_alias() || delta.flags.is_empty() {
            return Some(rec);
        }
        let light = rec.light.get_or_insert_with(Default::default);
        if delta.flags.has(LightFlags::KIND) {
            light.kind = delta.kind;
        }
        if delta.flags.has(LightFlags::COLOR) {
            light.color = delta.color;
        }
        if delta.flags.has(LightFlags::INTENSITY) {
            light.intensity = delta.intensity;
        }
        if delta.flags.has(LightFlags::RANGE) {
            light.range = delta.range;
        }
        if delta.flags.has(LightFlags::SPOT_ANGLE) {
            light.spot_angle = delta.spot_angle;
        }
        Some(rec)
    }

    pub fn upsert_mesh(
        &mut self,
        delta: &MeshDelta,
        scene: &mut dyn LocalScene,
        importer: &mut dyn AssetImporter,
        config: &SyncConfig,
    ) -> Option<&mut EntityRecord> {
        let sync_meshes = config.sync_meshes;
        let sync_materials = config.sync_materials;
        let make_colliders = config.make_mesh_colliders;
        let rec = self.upsert_transform(&delta.transform, scene, config)?;
        rec.kind = EntityKind::Mesh;
        if rec.is_reference_alias() || delta.flags.is_empty() || !sync_meshes {
            return Some(rec);
        }
        if delta.has_bones() {
            rec.pending_bones = Some(PendingBones {
                bone_paths: delta.bone_paths.clone(),
                root_bone: if delta.root_bone.is_empty() {
                    None
                } else {
                    Some(delta.root_bone.clone())
                },
            });
        }
        let mesh = rec.mesh.get_or_insert_with(MeshState::default);
        if delta.flags.has(MeshFlags::POINTS) {
            mesh.points = delta.points.clone();
        }
        if delta.flags.has(MeshFlags::NORMALS) {
            mesh.normals = delta.normals.clone();
        }
        if delta.flags.has(MeshFlags::TANGENTS) {
            mesh.tangents = delta.tangents.clone();
        }
        if delta.flags.has(MeshFlags::UV0) {
            mesh.uv0 = delta.uv0.clone();
        }
        if delta.flags.has(MeshFlags::UV1) {
            mesh.uv1 = delta.uv1.clone();
        }
        if delta.flags.has(MeshFlags::COLORS) {
            mesh.colors = delta.colors.clone();
        }
        if delta.flags.has(MeshFlags::INDICES) {
            mesh.indices = delta.indices.clone();
        }
        if sync_materials && delta.flags.has(MeshFlags::MATERIAL_IDS) {
            mesh.material_ids = delta.material_ids.clone();
        }
        if delta.flags.has(MeshFlags::BLENDSHAPES) {
            mesh.blendshape_count = delta.blendshape_count;
        }
        if delta.has_bones() {
            // Skinning stays off until the resolver binds the bones.
            mesh.skinning_enabled = false;
            mesh.bones.clear();
            mesh.root_bone = None;
        }
        if delta.flags.has(MeshFlags::POINTS) || delta.flags.has(MeshFlags::INDICES) {
            match importer.import_mesh(&delta.transform.ident.path, delta) {
                Ok(handle) => mesh.handle = Some(handle),
                Err(e) => warn!(
                    "mesh import failed for '{}': {}",
                    delta.transform.ident.path, e
                ),
            }
            mesh.has_collision_proxy = make_colliders;
        }
        Some(rec)
    }

    pub fn upsert_points(
        &mut self,
        delta: &PointsDelta,
        scene: &mut dyn LocalScene,
        config: &SyncConfig,
    ) -> Option<&mut EntityRecord> {
        let rec = self.upsert_transform(&delta.transform, scene, config)?;
        rec.kind = EntityKind::Points;
        if rec.is_reference_alias() || delta.flags.is_empty() {
            return Some(rec);
        }
        let points = rec.points.get_or_insert_with(Default::default);
        if delta.flags.has(PointsFlags::POSITIONS) {
            points.positions = delta.positions.clone();
        }
        if delta.flags.has(PointsFlags::ROTATIONS) {
            points.rotations = delta.rotations.clone();
        }
        if delta.flags.has(PointsFlags::SCALES) {
            points.scales = delta.scales.clone();
        }
        Some(rec)
    }

    /// Removes whichever table entry matches and destroys the local object
    /// unless it is externally owned. Returns the removed record so the
    /// caller can fire exactly one delete notification.
    pub fn erase(
        &mut self,
        ident: &Identifier,
        scene: &mut dyn LocalScene,
    ) -> Option<EntityRecord> {
        if ident.has_id() {
            if let Some(rec) = self.by_id.remove(&ident.id) {
                // Host-owned: never destroyed by this system.
                return Some(rec);
            }
        }
        if let Some(rec) = self.by_path.remove(&ident.path) {
            if scene.is_valid(rec.handle) {
                scene.destroy(rec.handle);
            }
            return Some(rec);
        }
        None
    }
}
