//! Collaborator seams
//!
//! The engine never owns visual objects or asset bytes. The host scene
//! graph, the asset importer and the consumer's change listener plug in
//! through these traits; everything they hand back is an opaque handle.

use crate::error::SyncResult;
use crate::model::{ConstraintDelta, EntityDelta, Identifier, InstanceInfoDelta, MeshDelta};
use glam::{Quat, Vec3};

macro_rules! opaque_handle {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u64);
        )+
    };
}

opaque_handle!(
    ObjectHandle,
    MeshHandle,
    MaterialHandle,
    TextureHandle,
    AudioHandle,
    AnimationHandle,
);

/// Local-object factory owned by the host scene-graph framework.
///
/// `create_at_path` must create missing intermediate path segments.
/// Handles may go stale at any time (objects removed externally); callers
/// re-check with `is_valid` before trusting a cached handle.
pub trait LocalScene {
    fn root(&self) -> ObjectHandle;
    fn find_by_path(&self, path: &str) -> Option<ObjectHandle>;
    /// Lookup for host-owned objects addressed by numeric id.
    fn find_by_id(&self, id: i32) -> Option<ObjectHandle>;
    fn create_at_path(&mut self, path: &str) -> ObjectHandle;
    fn destroy(&mut self, handle: ObjectHandle);
    fn is_valid(&self, handle: ObjectHandle) -> bool;
    fn parent_of(&self, handle: ObjectHandle) -> Option<ObjectHandle>;
    fn set_local_transform(
        &mut self,
        handle: ObjectHandle,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
    );
    fn set_visible(&mut self, handle: ObjectHandle, visible: bool);
}

/// Turns raw asset payloads into host handles. Failures are isolated per
/// asset and never abort a batch.
pub trait AssetImporter {
    fn import_material(&mut self, ident: &Identifier, data: &[u8]) -> SyncResult<MaterialHandle>;
    fn import_texture(&mut self, ident: &Identifier, data: &[u8]) -> SyncResult<TextureHandle>;
    fn import_audio(&mut self, ident: &Identifier, data: &[u8]) -> SyncResult<AudioHandle>;
    fn import_animation(&mut self, ident: &Identifier, data: &[u8])
        -> SyncResult<AnimationHandle>;
    fn import_mesh(&mut self, path: &str, mesh: &MeshDelta) -> SyncResult<MeshHandle>;
}

/// Per-entity change notifications, fired once per changed entity while a
/// batch applies, plus batch boundary markers. Default impls are no-ops so
/// consumers override only what they need.
#[allow(unused_variables)]
pub trait SceneObserver {
    fn on_scene_update_begin(&mut self) {}
    fn on_scene_update_end(&mut self) {}
    fn on_update_entity(&mut self, path: &str, delta: &EntityDelta) {}
    fn on_update_material(&mut self, ident: &Identifier) {}
    fn on_update_texture(&mut self, ident: &Identifier) {}
    fn on_update_audio(&mut self, ident: &Identifier) {}
    fn on_update_animation(&mut self, ident: &Identifier) {}
    fn on_update_instanced_entity(&mut self, path: &str, delta: &EntityDelta) {}
    fn on_update_instance_info(&mut self, delta: &InstanceInfoDelta) {}
    fn on_update_constraint(&mut self, delta: &ConstraintDelta) {}
    fn on_delete_entity(&mut self, ident: &Identifier) {}
    fn on_delete_instanced_entity(&mut self, ident: &Identifier) {}
    fn on_delete_instance_info(&mut self, ident: &Identifier) {}
}

/// No-op observer for hosts that only need the replica state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SceneObserver for NullObserver {}
