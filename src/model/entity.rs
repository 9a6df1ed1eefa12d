//! Entity deltas
//!
//! One tagged variant per entity kind (transform, camera, light, mesh,
//! point cloud), dispatched by exhaustive match. Every kind embeds a
//! transform delta; kind-specific payloads follow. Each payload carries its
//! own changed-flags bitmask.

use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::identifier::Identifier;

macro_rules! delta_flags {
    ($name:ident { $($flag:ident = $bit:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            $(pub const $flag: u32 = 1 << $bit;)+

            pub fn has(self, bit: u32) -> bool {
                self.0 & bit != 0
            }

            pub fn with(mut self, bit: u32) -> Self {
                self.0 |= bit;
                self
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }
    };
}

delta_flags!(TransformFlags {
    POSITION = 0,
    ROTATION = 1,
    SCALE = 2,
    VISIBILITY = 3,
    REFERENCE = 4,
});

delta_flags!(CameraFlags {
    FOV = 0,
    NEAR_PLANE = 1,
    FAR_PLANE = 2,
    FOCAL_LENGTH = 3,
    SENSOR_SIZE = 4,
    LENS_SHIFT = 5,
});

delta_flags!(LightFlags {
    KIND = 0,
    COLOR = 1,
    INTENSITY = 2,
    RANGE = 3,
    SPOT_ANGLE = 4,
});

delta_flags!(MeshFlags {
    POINTS = 0,
    NORMALS = 1,
    TANGENTS = 2,
    UV0 = 3,
    UV1 = 4,
    COLORS = 5,
    INDICES = 6,
    MATERIAL_IDS = 7,
    BONES = 8,
    BLENDSHAPES = 9,
});

delta_flags!(PointsFlags {
    POSITIONS = 0,
    ROTATIONS = 1,
    SCALES = 2,
});

/// Base delta shared by every entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDelta {
    pub ident: Identifier,
    pub flags: TransformFlags,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    /// When set, this entity mirrors the full state of another path.
    /// Resolved after direct deltas, never geometry truth by itself.
    pub reference: String,
}

impl TransformDelta {
    pub fn new(ident: Identifier) -> Self {
        Self {
            ident,
            flags: TransformFlags::default(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            reference: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDelta {
    pub transform: TransformDelta,
    pub flags: CameraFlags,
    pub fov: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub focal_length: f32,
    pub sensor_size: Vec2,
    pub lens_shift: Vec2,
}

impl CameraDelta {
    pub fn new(ident: Identifier) -> Self {
        Self {
            transform: TransformDelta::new(ident),
            flags: CameraFlags::default(),
            fov: 60.0,
            near_plane: 0.3,
            far_plane: 1000.0,
            focal_length: 0.0,
            sensor_size: Vec2::ZERO,
            lens_shift: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Spot,
    Point,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightDelta {
    pub transform: TransformDelta,
    pub flags: LightFlags,
    pub kind: LightKind,
    pub color: Vec4,
    pub intensity: f32,
    pub range: f32,
    pub spot_angle: f32,
}

impl LightDelta {
    pub fn new(ident: Identifier) -> Self {
        Self {
            transform: TransformDelta::new(ident),
            flags: LightFlags::default(),
            kind: LightKind::Directional,
            color: Vec4::ONE,
            intensity: 1.0,
            range: 0.0,
            spot_angle: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDelta {
    pub transform: TransformDelta,
    pub flags: MeshFlags,
    pub points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub uv0: Vec<Vec2>,
    pub uv1: Vec<Vec2>,
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub material_ids: Vec<i32>,
    /// Paths of the skeleton bones, resolved after the whole batch applies.
    pub bone_paths: Vec<String>,
    /// Per-vertex weights, `bones_per_vertex` entries per point.
    pub bone_weights: Vec<f32>,
    pub bones_per_vertex: u32,
    /// Explicit root bone path; derived from bone ancestry when empty.
    pub root_bone: String,
    pub blendshape_count: u32,
}

impl MeshDelta {
    pub fn new(ident: Identifier) -> Self {
        Self {
            transform: TransformDelta::new(ident),
            flags: MeshFlags::default(),
            points: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            uv0: Vec::new(),
            uv1: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
            material_ids: Vec::new(),
            bone_paths: Vec::new(),
            bone_weights: Vec::new(),
            bones_per_vertex: 0,
            root_bone: String::new(),
            blendshape_count: 0,
        }
    }

    pub fn has_bones(&self) -> bool {
        self.flags.has(MeshFlags::BONES) && !self.bone_paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsDelta {
    pub transform: TransformDelta,
    pub flags: PointsFlags,
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

impl PointsDelta {
    pub fn new(ident: Identifier) -> Self {
        Self {
            transform: TransformDelta::new(ident),
            flags: PointsFlags::default(),
            positions: Vec::new(),
            rotations: Vec::new(),
            scales: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Transform,
    Camera,
    Light,
    Mesh,
    Points,
}

/// One scene entity delta, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityDelta {
    Transform(TransformDelta),
    Camera(CameraDelta),
    Light(LightDelta),
    Mesh(MeshDelta),
    Points(PointsDelta),
}

impl EntityDelta {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDelta::Transform(_) => EntityKind::Transform,
            EntityDelta::Camera(_) => EntityKind::Camera,
            EntityDelta::Light(_) => EntityKind::Light,
            EntityDelta::Mesh(_) => EntityKind::Mesh,
            EntityDelta::Points(_) => EntityKind::Points,
        }
    }

    pub fn transform(&self) -> &TransformDelta {
        match self {
            EntityDelta::Transform(t) => t,
            EntityDelta::Camera(c) => &c.transform,
            EntityDelta::Light(l) => &l.transform,
            EntityDelta::Mesh(m) => &m.transform,
            EntityDelta::Points(p) => &p.transform,
        }
    }

    pub fn ident(&self) -> &Identifier {
        &self.transform().ident
    }

    pub fn path(&self) -> &str {
        &self.transform().ident.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_bit_ops() {
        let flags = TransformFlags::default()
            .with(TransformFlags::POSITION)
            .with(TransformFlags::SCALE);
        assert!(flags.has(TransformFlags::POSITION));
        assert!(!flags.has(TransformFlags::ROTATION));
        assert!(flags.has(TransformFlags::SCALE));
        assert!(TransformFlags::default().is_empty());
    }

    #[test]
    fn kind_dispatch() {
        let delta = EntityDelta::Camera(CameraDelta::new(Identifier::from_path("/cam")));
        assert_eq!(delta.kind(), EntityKind::Camera);
        assert_eq!(delta.path(), "/cam");
    }

    #[test]
    fn bones_need_flag_and_paths() {
        let mut mesh = MeshDelta::new(Identifier::from_path("/m"));
        assert!(!mesh.has_bones());
        mesh.bone_paths.push("/rig/spine".into());
        assert!(!mesh.has_bones());
        mesh.flags = mesh.flags.with(MeshFlags::BONES);
        assert!(mesh.has_bones());
    }
}
