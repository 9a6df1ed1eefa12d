//! Message variants and their payload layouts
//!
//! Completion "ready" tokens are deliberately not part of these types; they
//! never cross the wire. The session layer correlates requests and
//! responses by (session_id, message_id) and owns the tokens.

use serde::{Deserialize, Serialize};

use crate::constants::PROTOCOL_VERSION;
use crate::model::{Identifier, SceneSnapshot};

/// Common prefix of every message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub protocol_version: i32,
    pub session_id: i32,
    pub message_id: i32,
    pub timestamp_send: f64,
}

impl Header {
    pub fn new(session_id: i32, message_id: i32, timestamp_send: f64) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            session_id,
            message_id,
            timestamp_send,
        }
    }
}

/// Packed bitfield of the optional scene features a `Get` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFlags {
    pub transform: bool,
    pub points: bool,
    pub normals: bool,
    pub tangents: bool,
    pub uv0: bool,
    pub uv1: bool,
    pub colors: bool,
    pub indices: bool,
    pub material_ids: bool,
    pub bones: bool,
    pub blendshapes: bool,
    pub apply_culling: bool,
}

impl GetFlags {
    pub fn all() -> Self {
        Self {
            transform: true,
            points: true,
            normals: true,
            tangents: true,
            uv0: true,
            uv1: true,
            colors: true,
            indices: true,
            material_ids: true,
            bones: true,
            blendshapes: true,
            apply_culling: true,
        }
    }

    pub fn to_bits(self) -> u32 {
        let mut bits = 0u32;
        let flags = [
            self.transform,
            self.points,
            self.normals,
            self.tangents,
            self.uv0,
            self.uv1,
            self.colors,
            self.indices,
            self.material_ids,
            self.bones,
            self.blendshapes,
            self.apply_culling,
        ];
        for (i, set) in flags.into_iter().enumerate() {
            if set {
                bits |= 1 << i;
            }
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Self {
        let bit = |i: u32| bits & (1 << i) != 0;
        Self {
            transform: bit(0),
            points: bit(1),
            normals: bit(2),
            tangents: bit(3),
            uv0: bit(4),
            uv1: bit(5),
            colors: bit(6),
            indices: bit(7),
            material_ids: bit(8),
            bones: bit(9),
            blendshapes: bit(10),
            apply_culling: bit(11),
        }
    }
}

impl Default for GetFlags {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    pub scale_factor: f32,
    pub handedness: Handedness,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            handedness: Handedness::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshRefineSettings {
    pub scale_factor: f32,
    pub smooth_angle: f32,
    pub split_unit: u32,
    pub max_bone_influence: i32,
}

impl Default for MeshRefineSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            smooth_angle: 80.0,
            split_unit: 65000,
            max_bone_influence: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GetData {
    pub flags: GetFlags,
    pub scene: SceneSettings,
    pub refine: MeshRefineSettings,
}

/// Identifiers to remove, partitioned by kind rather than type-tagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteData {
    pub entities: Vec<Identifier>,
    pub materials: Vec<Identifier>,
    pub instances: Vec<Identifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FenceType {
    SceneBegin,
    SceneEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKind {
    Normal,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
    pub kind: TextKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    ClientName,
    RootNodes,
    AllNodes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub text: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollType {
    SceneUpdate,
}

/// Closed variant set of the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    Get(GetData),
    Set(SceneSnapshot),
    Delete(DeleteData),
    Fence(FenceType),
    Text(TextData),
    Screenshot,
    Query(QueryKind),
    Response(ResponseData),
    Poll(PollType),
}

impl MessageBody {
    /// Wire tag, also the dispatch key for decoding.
    pub fn kind_tag(&self) -> u32 {
        match self {
            MessageBody::Get(_) => 1,
            MessageBody::Set(_) => 2,
            MessageBody::Delete(_) => 3,
            MessageBody::Fence(_) => 4,
            MessageBody::Text(_) => 5,
            MessageBody::Screenshot => 6,
            MessageBody::Query(_) => 7,
            MessageBody::Response(_) => 8,
            MessageBody::Poll(_) => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: Header,
    pub body: MessageBody,
}

impl Message {
    pub fn new(header: Header, body: MessageBody) -> Self {
        Self { header, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_flags_pack_unpack() {
        let mut flags = GetFlags::all();
        flags.uv1 = false;
        flags.apply_culling = false;
        let bits = flags.to_bits();
        assert_eq!(GetFlags::from_bits(bits), flags);
        assert_eq!(bits & (1 << 5), 0);
        assert_eq!(bits & (1 << 11), 0);
        assert_ne!(bits & (1 << 0), 0);
    }

    #[test]
    fn all_flags_is_twelve_bits() {
        assert_eq!(GetFlags::all().to_bits(), 0xFFF);
    }

    #[test]
    fn header_uses_compiled_version() {
        let h = Header::new(3, 7, 0.5);
        assert_eq!(h.protocol_version, PROTOCOL_VERSION);
    }
}
