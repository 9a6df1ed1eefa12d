//! Two-pass dependency resolution
//!
//! Bone paths and reference paths can point at entities that appear later
//! in the same batch, or whose geometry is only final after their own bones
//! resolve. Resolution therefore runs after the whole batch has applied:
//! Pass 1 binds skeletons, Pass 2 mirrors reference aliases. Pass 1 always
//! completes for the entire batch before Pass 2 starts, so a referenced
//! skeletal entity is mirrored post-bone-resolution.
//!
//! The worklists are explicit data collected while deltas apply, not flags
//! scattered across records. An unresolved entry stays queued and retries
//! next batch; the target may simply not have arrived yet.

use std::collections::BTreeSet;

use log::debug;

use crate::error::SyncError;
use crate::registry::{EntityRegistry, LocalScene, ObjectHandle};

/// Pending resolution work, owned by the engine across batches.
#[derive(Debug, Default)]
pub struct ResolveWork {
    /// Paths whose records carry unresolved skeleton data.
    pending_bones: BTreeSet<String>,
    /// Paths whose records alias another entity. Aliases re-mirror every
    /// batch so they track the referenced record's current state.
    pending_refs: BTreeSet<String>,
}

impl ResolveWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_bones(&mut self, path: &str) {
        self.pending_bones.insert(path.to_string());
    }

    pub fn mark_reference(&mut self, path: &str) {
        self.pending_refs.insert(path.to_string());
    }

    pub fn clear_reference(&mut self, path: &str) {
        self.pending_refs.remove(path);
    }

    /// Forgets a deleted entity entirely.
    pub fn forget(&mut self, path: &str) {
        self.pending_bones.remove(path);
        self.pending_refs.remove(path);
    }

    pub fn clear(&mut self) {
        self.pending_bones.clear();
        self.pending_refs.clear();
    }

    pub fn bones_pending(&self) -> usize {
        self.pending_bones.len()
    }

    pub fn refs_pending(&self) -> usize {
        self.pending_refs.len()
    }
}

/// Runs both passes in order. Called exactly once per batch, at SceneEnd.
pub fn run(work: &mut ResolveWork, registry: &mut EntityRegistry, scene: &dyn LocalScene) {
    resolve_bones(work, registry, scene);
    resolve_references(work, registry, scene);
}

/// Pass 1: bind skeletons.
fn resolve_bones(work: &mut ResolveWork, registry: &mut EntityRegistry, scene: &dyn LocalScene) {
    let paths: Vec<String> = work.pending_bones.iter().cloned().collect();
    let mut stale: Vec<String> = Vec::new();

    for path in paths {
        let Some(rec) = registry.get_path_mut(&path) else {
            work.pending_bones.remove(&path);
            continue;
        };
        if !scene.is_valid(rec.handle) {
            stale.push(path);
            continue;
        }
        let Some(pending) = rec.pending_bones.clone() else {
            work.pending_bones.remove(&path);
            continue;
        };

        let mut bones: Vec<ObjectHandle> = Vec::with_capacity(pending.bone_paths.len());
        let mut unresolved: Option<String> = None;
        for bone_path in &pending.bone_paths {
            match scene.find_by_path(bone_path) {
                Some(handle) => bones.push(handle),
                None => {
                    unresolved = Some(bone_path.clone());
                    break;
                }
            }
        }
        if let Some(missing) = unresolved {
            debug!(
                "{}, retrying next batch",
                SyncError::UnresolvedDependency {
                    path: path.clone(),
                    target: missing,
                }
            );
            continue;
        }

        let root_bone = match &pending.root_bone {
            Some(root_path) => match scene.find_by_path(root_path) {
                Some(handle) => Some(handle),
                None => {
                    debug!(
                        "{}, retrying next batch",
                        SyncError::UnresolvedDependency {
                            path: path.clone(),
                            target: root_path.clone(),
                        }
                    );
                    continue;
                }
            },
            // Unspecified: walk bone[0]'s ancestors up to the scene root.
            None => bones.first().map(|&b| topmost_ancestor(scene, b)),
        };

        if let Some(mesh) = rec.mesh.as_mut() {
            mesh.bones = bones;
            mesh.root_bone = root_bone;
            mesh.skinning_enabled = true;
        }
        rec.pending_bones = None;
        work.pending_bones.remove(&path);
    }

    // Purge records whose backing object vanished, after the pass.
    for path in stale {
        debug!("{}", SyncError::StaleLocalObject { path: path.clone() });
        registry.purge_path(&path);
        work.forget(&path);
    }
}

/// Walks the ancestor chain until the next parent would be the scene root.
fn topmost_ancestor(scene: &dyn LocalScene, start: ObjectHandle) -> ObjectHandle {
    let root = scene.root();
    let mut current = start;
    while let Some(parent) = scene.parent_of(current) {
        if parent == root {
            break;
        }
        current = parent;
    }
    current
}

/// Pass 2: mirror reference aliases from the current state of their
/// targets. Must run after Pass 1 so skeletal targets are already bound.
fn resolve_references(
    work: &mut ResolveWork,
    registry: &mut EntityRegistry,
    scene: &dyn LocalScene,
) {
    let paths: Vec<String> = work.pending_refs.iter().cloned().collect();

    for path in paths {
        let Some(rec) = registry.get_path(&path) else {
            work.pending_refs.remove(&path);
            continue;
        };
        let Some(target_path) = rec.reference.clone() else {
            work.pending_refs.remove(&path);
            continue;
        };
        let instanced = rec.instanced_prototype;

        let source = match registry.get_path(&target_path) {
            Some(src) if scene.is_valid(src.handle) => src,
            _ => {
                debug!(
                    "{}, retrying next batch",
                    SyncError::UnresolvedDependency {
                        path: path.clone(),
                        target: target_path.clone(),
                    }
                );
                continue;
            }
        };

        // Copy from the target's current state, never from the delta that
        // created the link.
        let camera = source.camera;
        let light = source.light;
        let mut mesh = source.mesh.clone();
        let points = source.points.clone();

        if let Some(mesh) = mesh.as_mut() {
            if instanced {
                mesh.instancing_enabled = true;
            }
        }

        let Some(rec) = registry.get_path_mut(&path) else {
            continue;
        };
        if camera.is_some() {
            rec.camera = camera;
        }
        if light.is_some() {
            rec.light = light;
        }
        if let Some(mesh) = mesh {
            rec.mesh = Some(mesh);
        }
        if points.is_some() {
            rec.points = points;
        }
        // Alias stays queued: it re-mirrors whenever the target changes.
    }
}
