//! Instance batch management
//!
//! Many repeated placements of one mesh become a handful of instanced
//! draws instead of one draw per placement. Transform arrays are split
//! into chunks of at most [`MAX_INSTANCES_PER_BATCH`] matrices; the last
//! chunk holds the remainder. Re-registering a path swaps its whole chunk
//! set atomically, never a mix of old and new.

use std::collections::BTreeMap;

use glam::Mat4;

use crate::constants::MAX_INSTANCES_PER_BATCH;
use crate::registry::{MaterialHandle, MeshHandle, ObjectHandle};

/// Renderer seam: one call per (sub-mesh, material, chunk).
pub trait InstanceDraw {
    fn draw_instanced(
        &mut self,
        mesh: MeshHandle,
        submesh: usize,
        material: MaterialHandle,
        transforms: &[Mat4],
    );
}

/// Everything known about one instanced path.
#[derive(Debug, Clone)]
pub struct InstanceInfoRecord {
    pub path: String,
    /// Path of the prototype entity whose mesh is drawn.
    pub entity_path: String,
    /// Local space the transforms are expressed in.
    pub parent: ObjectHandle,
}

#[derive(Debug)]
struct BatchSet {
    record: InstanceInfoRecord,
    /// None until the prototype's mesh import succeeds; such sets are
    /// skipped at render time and refreshed when the mesh shows up.
    mesh: Option<MeshHandle>,
    submesh_count: usize,
    materials: Vec<MaterialHandle>,
    chunks: Vec<Vec<Mat4>>,
}

fn split_chunks(transforms: &[Mat4]) -> Vec<Vec<Mat4>> {
    transforms
        .chunks(MAX_INSTANCES_PER_BATCH)
        .map(|c| c.to_vec())
        .collect()
}

#[derive(Debug, Default)]
pub struct InstanceBatchManager {
    sets: BTreeMap<String, BatchSet>,
}

impl InstanceBatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the batch set for a path.
    pub fn set_instances(
        &mut self,
        record: InstanceInfoRecord,
        mesh: Option<MeshHandle>,
        submesh_count: usize,
        materials: Vec<MaterialHandle>,
        transforms: &[Mat4],
    ) {
        let set = BatchSet {
            record: record.clone(),
            mesh,
            submesh_count,
            materials,
            chunks: split_chunks(transforms),
        };
        // Single insert: stale chunks never coexist with new ones.
        self.sets.insert(record.path, set);
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.sets.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }

    pub fn contains(&self, path: &str) -> bool {
        self.sets.contains_key(path)
    }

    pub fn chunk_count(&self, path: &str) -> usize {
        self.sets.get(path).map(|s| s.chunks.len()).unwrap_or(0)
    }

    pub fn chunk_sizes(&self, path: &str) -> Vec<usize> {
        self.sets
            .get(path)
            .map(|s| s.chunks.iter().map(|c| c.len()).collect())
            .unwrap_or_default()
    }

    pub fn record(&self, path: &str) -> Option<&InstanceInfoRecord> {
        self.sets.get(path).map(|s| &s.record)
    }

    /// True when the set exists but still has no mesh bound.
    pub fn needs_mesh(&self, path: &str) -> bool {
        self.sets
            .get(path)
            .map(|s| s.mesh.is_none())
            .unwrap_or(false)
    }

    /// Paths registered before their prototype's mesh import finished.
    pub fn paths_needing_mesh(&self) -> Vec<String> {
        self.sets
            .iter()
            .filter(|(_, s)| s.mesh.is_none())
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Late-binds a mesh once the prototype import completes.
    pub fn bind_mesh(
        &mut self,
        path: &str,
        mesh: MeshHandle,
        submesh_count: usize,
        materials: Vec<MaterialHandle>,
    ) {
        if let Some(set) = self.sets.get_mut(path) {
            set.mesh = Some(mesh);
            set.submesh_count = submesh_count;
            set.materials = materials;
        }
    }

    /// Issues one instanced draw per (sub-mesh, chunk). Sub-meshes beyond
    /// the material list reuse the last material; a path with no materials
    /// is skipped entirely.
    pub fn render_all(&self, draw: &mut dyn InstanceDraw) {
        for set in self.sets.values() {
            let Some(mesh) = set.mesh else { continue };
            if set.materials.is_empty() {
                // Nothing to shade with.
                continue;
            }
            for submesh in 0..set.submesh_count {
                let material = set.materials[submesh.min(set.materials.len() - 1)];
                for chunk in &set.chunks {
                    draw.draw_instanced(mesh, submesh, material, chunk);
                }
            }
        }
    }
}
