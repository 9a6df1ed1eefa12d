//! Asset deltas
//!
//! Materials, textures, audio and animation clips travel as opaque payload
//! blobs; decoding them is the importer's concern. The engine only routes
//! them and tracks identity.

use serde::{Deserialize, Serialize};

use super::identifier::Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Material,
    Texture,
    Audio,
    AnimationClip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDelta {
    pub ident: Identifier,
    pub kind: AssetKind,
    pub data: Vec<u8>,
}

impl AssetDelta {
    pub fn new(ident: Identifier, kind: AssetKind, data: Vec<u8>) -> Self {
        Self { ident, kind, data }
    }
}
