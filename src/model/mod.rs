//! Scene Snapshot Model
//!
//! Payload data model for the wire protocol: hierarchical entity deltas,
//! asset deltas, constraint deltas and instance deltas, each carrying a
//! bitmask of which fields changed. Deltas are incremental, never full-state
//! snapshots; an unflagged field leaves the replica untouched.

pub mod asset;
pub mod entity;
pub mod identifier;
pub mod instance;
pub mod scene;

pub use asset::{AssetDelta, AssetKind};
pub use entity::{
    CameraDelta, CameraFlags, EntityDelta, EntityKind, LightDelta, LightFlags, LightKind,
    MeshDelta, MeshFlags, PointsDelta, PointsFlags, TransformDelta, TransformFlags,
};
pub use identifier::Identifier;
pub use instance::{ConstraintDelta, ConstraintKind, InstanceInfoDelta};
pub use scene::SceneSnapshot;
