//! Entity Registry
//!
//! Single source of truth for which remote entity maps to which local
//! object. Two owned lookup tables: path-keyed for entities this session
//! creates, id-keyed for host-owned entities that pre-exist in the local
//! scene and are only ever updated. All access goes through registry
//! operations; `open_session`/`close_session` bound the lifecycle.

pub mod hooks;
pub mod record;
pub mod registry;

pub use hooks::{
    AnimationHandle, AssetImporter, AudioHandle, LocalScene, MaterialHandle, MeshHandle,
    NullObserver, ObjectHandle, SceneObserver, TextureHandle,
};
pub use record::{CameraState, EntityRecord, LightState, MeshState, PendingBones, PointsState};
pub use registry::EntityRegistry;
