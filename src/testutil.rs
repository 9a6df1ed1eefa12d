//! Shared test doubles: an in-memory scene graph, a counting importer and
//! a recording observer.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::error::{SyncError, SyncResult};
use crate::model::{ConstraintDelta, EntityDelta, Identifier, InstanceInfoDelta, MeshDelta};
use crate::registry::{
    AnimationHandle, AssetImporter, AudioHandle, LocalScene, MaterialHandle, MeshHandle,
    ObjectHandle, SceneObserver, TextureHandle,
};

struct MockObject {
    path: String,
    parent: Option<ObjectHandle>,
    valid: bool,
    #[allow(dead_code)]
    visible: bool,
}

/// Minimal hierarchical scene graph backing the LocalScene seam.
pub struct MockScene {
    next: u64,
    objects: HashMap<ObjectHandle, MockObject>,
    by_path: HashMap<String, ObjectHandle>,
    by_id: HashMap<i32, ObjectHandle>,
    root: ObjectHandle,
    pub destroyed: Vec<String>,
}

impl MockScene {
    pub fn new() -> Self {
        let root = ObjectHandle(1);
        let mut objects = HashMap::new();
        objects.insert(
            root,
            MockObject {
                path: String::new(),
                parent: None,
                valid: true,
                visible: true,
            },
        );
        Self {
            next: 2,
            objects,
            by_path: HashMap::new(),
            by_id: HashMap::new(),
            root,
            destroyed: Vec::new(),
        }
    }

    fn alloc(&mut self, path: String, parent: ObjectHandle) -> ObjectHandle {
        let handle = ObjectHandle(self.next);
        self.next += 1;
        self.objects.insert(
            handle,
            MockObject {
                path: path.clone(),
                parent: Some(parent),
                valid: true,
                visible: true,
            },
        );
        self.by_path.insert(path, handle);
        handle
    }

    /// Pre-register a host-owned object addressable by numeric id.
    pub fn register_host(&mut self, id: i32, path: &str) -> ObjectHandle {
        let handle = self.create_at_path(path);
        self.by_id.insert(id, handle);
        handle
    }

    /// Simulates external removal: the handle stays known but invalid.
    pub fn invalidate(&mut self, path: &str) {
        if let Some(handle) = self.by_path.remove(path) {
            if let Some(obj) = self.objects.get_mut(&handle) {
                obj.valid = false;
            }
        }
    }
}

impl Default for MockScene {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScene for MockScene {
    fn root(&self) -> ObjectHandle {
        self.root
    }

    fn find_by_path(&self, path: &str) -> Option<ObjectHandle> {
        self.by_path.get(path).copied()
    }

    fn find_by_id(&self, id: i32) -> Option<ObjectHandle> {
        self.by_id.get(&id).copied()
    }

    fn create_at_path(&mut self, path: &str) -> ObjectHandle {
        if let Some(existing) = self.find_by_path(path) {
            return existing;
        }
        let mut parent = self.root;
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            parent = match self.find_by_path(&current) {
                Some(h) => h,
                None => self.alloc(current.clone(), parent),
            };
        }
        parent
    }

    fn destroy(&mut self, handle: ObjectHandle) {
        if let Some(obj) = self.objects.remove(&handle) {
            self.by_path.remove(&obj.path);
            self.destroyed.push(obj.path);
        }
    }

    fn is_valid(&self, handle: ObjectHandle) -> bool {
        self.objects.get(&handle).map(|o| o.valid).unwrap_or(false)
    }

    fn parent_of(&self, handle: ObjectHandle) -> Option<ObjectHandle> {
        self.objects.get(&handle).and_then(|o| o.parent)
    }

    fn set_local_transform(
        &mut self,
        _handle: ObjectHandle,
        _position: Vec3,
        _rotation: Quat,
        _scale: Vec3,
    ) {
    }

    fn set_visible(&mut self, handle: ObjectHandle, visible: bool) {
        if let Some(obj) = self.objects.get_mut(&handle) {
            obj.visible = visible;
        }
    }
}

/// Importer that hands out sequential handles; paths listed in
/// `fail_paths` are rejected to exercise per-asset isolation.
#[derive(Default)]
pub struct MockImporter {
    next: u64,
    pub fail_paths: Vec<String>,
    pub imported_meshes: Vec<String>,
    pub imported_materials: Vec<Identifier>,
}

impl MockImporter {
    fn next_handle(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    fn check(&self, path: &str) -> SyncResult<()> {
        if self.fail_paths.iter().any(|p| p == path) {
            return Err(SyncError::AssetImportFailed {
                path: path.to_string(),
                reason: "rejected by test".to_string(),
            });
        }
        Ok(())
    }
}

impl AssetImporter for MockImporter {
    fn import_material(&mut self, ident: &Identifier, _data: &[u8]) -> SyncResult<MaterialHandle> {
        self.check(&ident.path)?;
        self.imported_materials.push(ident.clone());
        Ok(MaterialHandle(self.next_handle()))
    }

    fn import_texture(&mut self, ident: &Identifier, _data: &[u8]) -> SyncResult<TextureHandle> {
        self.check(&ident.path)?;
        Ok(TextureHandle(self.next_handle()))
    }

    fn import_audio(&mut self, ident: &Identifier, _data: &[u8]) -> SyncResult<AudioHandle> {
        self.check(&ident.path)?;
        Ok(AudioHandle(self.next_handle()))
    }

    fn import_animation(
        &mut self,
        ident: &Identifier,
        _data: &[u8],
    ) -> SyncResult<AnimationHandle> {
        self.check(&ident.path)?;
        Ok(AnimationHandle(self.next_handle()))
    }

    fn import_mesh(&mut self, path: &str, _mesh: &MeshDelta) -> SyncResult<MeshHandle> {
        self.check(path)?;
        self.imported_meshes.push(path.to_string());
        Ok(MeshHandle(self.next_handle()))
    }
}

/// Records every callback in arrival order.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<String>,
}

impl SceneObserver for RecordingObserver {
    fn on_scene_update_begin(&mut self) {
        self.events.push("begin".into());
    }

    fn on_scene_update_end(&mut self) {
        self.events.push("end".into());
    }

    fn on_update_entity(&mut self, path: &str, _delta: &EntityDelta) {
        self.events.push(format!("entity:{}", path));
    }

    fn on_update_material(&mut self, ident: &Identifier) {
        self.events.push(format!("material:{}", ident.path));
    }

    fn on_update_texture(&mut self, ident: &Identifier) {
        self.events.push(format!("texture:{}", ident.path));
    }

    fn on_update_audio(&mut self, ident: &Identifier) {
        self.events.push(format!("audio:{}", ident.path));
    }

    fn on_update_animation(&mut self, ident: &Identifier) {
        self.events.push(format!("animation:{}", ident.path));
    }

    fn on_update_instanced_entity(&mut self, path: &str, _delta: &EntityDelta) {
        self.events.push(format!("instanced:{}", path));
    }

    fn on_update_instance_info(&mut self, delta: &InstanceInfoDelta) {
        self.events.push(format!("instance_info:{}", delta.path));
    }

    fn on_update_constraint(&mut self, delta: &ConstraintDelta) {
        self.events.push(format!("constraint:{}", delta.path));
    }

    fn on_delete_entity(&mut self, ident: &Identifier) {
        self.events.push(format!("delete:{}", ident.path));
    }

    fn on_delete_instanced_entity(&mut self, ident: &Identifier) {
        self.events.push(format!("delete_instanced:{}", ident.path));
    }

    fn on_delete_instance_info(&mut self, ident: &Identifier) {
        self.events.push(format!("delete_instance_info:{}", ident.path));
    }
}
