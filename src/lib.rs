//! scenelink - live scene synchronization engine
//!
//! Streams a 3D scene description from an external content-creation tool
//! and keeps a local replica in sync as the source mutates. This crate is
//! the wire protocol and the reconciliation core: binary message codec,
//! incremental scene delta model, entity registry, deferred dependency
//! resolution and instance-batch management. Transport, rendering and UI
//! live with the embedding host, behind the seams in [`registry::hooks`]
//! and [`instancing::InstanceDraw`].

pub mod config;
pub mod constants;
pub mod error;
pub mod instancing;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod resolve;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use instancing::{InstanceBatchManager, InstanceDraw};
pub use model::{EntityDelta, Identifier, SceneSnapshot};
pub use protocol::{decode_message, encode_message, Message, MessageBody};
pub use registry::{AssetImporter, EntityRegistry, LocalScene, SceneObserver};
pub use session::{message_channel, ReadyToken, SessionState, SyncEngine};
