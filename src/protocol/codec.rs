//! Little-endian encoder/decoder for the message set
//!
//! Layout per message: `[u32 kind][i32 protocol_version][i32 session_id]
//! [i32 message_id][f64 timestamp_send][payload]`. Strings and lists are
//! u32-count prefixed. The version check runs before anything else in the
//! header is trusted; trailing bytes after the payload are an error.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::constants::PROTOCOL_VERSION;
use crate::error::{SyncError, SyncResult};
use crate::model::{
    AssetDelta, AssetKind, CameraDelta, CameraFlags, ConstraintDelta, ConstraintKind, EntityDelta,
    Identifier, InstanceInfoDelta, LightDelta, LightFlags, LightKind, MeshDelta, MeshFlags,
    PointsDelta, PointsFlags, SceneSnapshot, TransformDelta, TransformFlags,
};

use super::message::{
    DeleteData, FenceType, GetData, GetFlags, Handedness, Header, MeshRefineSettings, Message,
    MessageBody, PollType, QueryKind, ResponseData, SceneSettings, TextData, TextKind,
};

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn str(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.buf.extend_from_slice(b);
    }

    fn vec2(&mut self, v: Vec2) {
        self.f32(v.x);
        self.f32(v.y);
    }

    fn vec3(&mut self, v: Vec3) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    fn vec4(&mut self, v: Vec4) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
        self.f32(v.w);
    }

    fn quat(&mut self, q: Quat) {
        self.f32(q.x);
        self.f32(q.y);
        self.f32(q.z);
        self.f32(q.w);
    }

    fn mat4(&mut self, m: &Mat4) {
        for v in m.to_cols_array() {
            self.f32(v);
        }
    }

    fn list<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.u32(items.len() as u32);
        for item in items {
            f(self, item);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> SyncResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(SyncError::MalformedPayload(format!(
                "need {} bytes, {} available",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> SyncResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> SyncResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> SyncResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> SyncResult<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self) -> SyncResult<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn bool(&mut self) -> SyncResult<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(SyncError::MalformedPayload(format!("bad bool byte {}", v))),
        }
    }

    fn str(&mut self) -> SyncResult<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SyncError::MalformedPayload("invalid utf-8 in string".to_string()))
    }

    fn bytes(&mut self) -> SyncResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn vec2(&mut self) -> SyncResult<Vec2> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    fn vec3(&mut self) -> SyncResult<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn vec4(&mut self) -> SyncResult<Vec4> {
        Ok(Vec4::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    fn quat(&mut self) -> SyncResult<Quat> {
        Ok(Quat::from_xyzw(
            self.f32()?,
            self.f32()?,
            self.f32()?,
            self.f32()?,
        ))
    }

    fn mat4(&mut self) -> SyncResult<Mat4> {
        let mut cols = [0.0f32; 16];
        for v in cols.iter_mut() {
            *v = self.f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }

    fn list<T>(&mut self, mut f: impl FnMut(&mut Self) -> SyncResult<T>) -> SyncResult<Vec<T>> {
        let count = self.u32()? as usize;
        // A declared count can never exceed the bytes left to parse.
        if count > self.remaining() {
            return Err(SyncError::MalformedPayload(format!(
                "list count {} exceeds remaining payload",
                count
            )));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }
}

fn bad_tag(what: &str, tag: u32) -> SyncError {
    SyncError::MalformedPayload(format!("unknown {} tag {}", what, tag))
}

fn write_identifier(w: &mut Writer, ident: &Identifier) {
    w.i32(ident.id);
    w.str(&ident.path);
}

fn read_identifier(r: &mut Reader) -> SyncResult<Identifier> {
    let id = r.i32()?;
    let path = r.str()?;
    Ok(Identifier { id, path })
}

fn write_transform(w: &mut Writer, t: &TransformDelta) {
    write_identifier(w, &t.ident);
    w.u32(t.flags.0);
    w.vec3(t.position);
    w.quat(t.rotation);
    w.vec3(t.scale);
    w.bool(t.visible);
    w.str(&t.reference);
}

fn read_transform(r: &mut Reader) -> SyncResult<TransformDelta> {
    Ok(TransformDelta {
        ident: read_identifier(r)?,
        flags: TransformFlags(r.u32()?),
        position: r.vec3()?,
        rotation: r.quat()?,
        scale: r.vec3()?,
        visible: r.bool()?,
        reference: r.str()?,
    })
}

fn write_entity(w: &mut Writer, e: &EntityDelta) {
    match e {
        EntityDelta::Transform(t) => {
            w.u32(0);
            write_transform(w, t);
        }
        EntityDelta::Camera(c) => {
            w.u32(1);
            write_transform(w, &c.transform);
            w.u32(c.flags.0);
            w.f32(c.fov);
            w.f32(c.near_plane);
            w.f32(c.far_plane);
            w.f32(c.focal_length);
            w.vec2(c.sensor_size);
            w.vec2(c.lens_shift);
        }
        EntityDelta::Light(l) => {
            w.u32(2);
            write_transform(w, &l.transform);
            w.u32(l.flags.0);
            w.u32(light_kind_tag(l.kind));
            w.vec4(l.color);
            w.f32(l.intensity);
            w.f32(l.range);
            w.f32(l.spot_angle);
        }
        EntityDelta::Mesh(m) => {
            w.u32(3);
            write_transform(w, &m.transform);
            w.u32(m.flags.0);
            w.list(&m.points, |w, v| w.vec3(*v));
            w.list(&m.normals, |w, v| w.vec3(*v));
            w.list(&m.tangents, |w, v| w.vec4(*v));
            w.list(&m.uv0, |w, v| w.vec2(*v));
            w.list(&m.uv1, |w, v| w.vec2(*v));
            w.list(&m.colors, |w, v| w.vec4(*v));
            w.list(&m.indices, |w, v| w.u32(*v));
            w.list(&m.material_ids, |w, v| w.i32(*v));
            w.list(&m.bone_paths, |w, s| w.str(s));
            w.list(&m.bone_weights, |w, v| w.f32(*v));
            w.u32(m.bones_per_vertex);
            w.str(&m.root_bone);
            w.u32(m.blendshape_count);
        }
        EntityDelta::Points(p) => {
            w.u32(4);
            write_transform(w, &p.transform);
            w.u32(p.flags.0);
            w.list(&p.positions, |w, v| w.vec3(*v));
            w.list(&p.rotations, |w, v| w.quat(*v));
            w.list(&p.scales, |w, v| w.vec3(*v));
        }
    }
}

fn read_entity(r: &mut Reader) -> SyncResult<EntityDelta> {
    let tag = r.u32()?;
    match tag {
        0 => Ok(EntityDelta::Transform(read_transform(r)?)),
        1 => Ok(EntityDelta::Camera(CameraDelta {
            transform: read_transform(r)?,
            flags: CameraFlags(r.u32()?),
            fov: r.f32()?,
            near_plane: r.f32()?,
            far_plane: r.f32()?,
            focal_length: r.f32()?,
            sensor_size: r.vec2()?,
            lens_shift: r.vec2()?,
        })),
        2 => Ok(EntityDelta::Light(LightDelta {
            transform: read_transform(r)?,
            flags: LightFlags(r.u32()?),
            kind: read_light_kind(r)?,
            color: r.vec4()?,
            intensity: r.f32()?,
            range: r.f32()?,
            spot_angle: r.f32()?,
        })),
        3 => Ok(EntityDelta::Mesh(MeshDelta {
            transform: read_transform(r)?,
            flags: MeshFlags(r.u32()?),
            points: r.list(|r| r.vec3())?,
            normals: r.list(|r| r.vec3())?,
            tangents: r.list(|r| r.vec4())?,
            uv0: r.list(|r| r.vec2())?,
            uv1: r.list(|r| r.vec2())?,
            colors: r.list(|r| r.vec4())?,
            indices: r.list(|r| r.u32())?,
            material_ids: r.list(|r| r.i32())?,
            bone_paths: r.list(|r| r.str())?,
            bone_weights: r.list(|r| r.f32())?,
            bones_per_vertex: r.u32()?,
            root_bone: r.str()?,
            blendshape_count: r.u32()?,
        })),
        4 => Ok(EntityDelta::Points(PointsDelta {
            transform: read_transform(r)?,
            flags: PointsFlags(r.u32()?),
            positions: r.list(|r| r.vec3())?,
            rotations: r.list(|r| r.quat())?,
            scales: r.list(|r| r.vec3())?,
        })),
        t => Err(bad_tag("entity kind", t)),
    }
}

fn light_kind_tag(kind: LightKind) -> u32 {
    match kind {
        LightKind::Directional => 0,
        LightKind::Spot => 1,
        LightKind::Point => 2,
        LightKind::Area => 3,
    }
}

fn read_light_kind(r: &mut Reader) -> SyncResult<LightKind> {
    match r.u32()? {
        0 => Ok(LightKind::Directional),
        1 => Ok(LightKind::Spot),
        2 => Ok(LightKind::Point),
        3 => Ok(LightKind::Area),
        t => Err(bad_tag("light kind", t)),
    }
}

fn asset_kind_tag(kind: AssetKind) -> u32 {
    match kind {
        AssetKind::Material => 0,
        AssetKind::Texture => 1,
        AssetKind::Audio => 2,
        AssetKind::AnimationClip => 3,
    }
}

fn read_asset_kind(r: &mut Reader) -> SyncResult<AssetKind> {
    match r.u32()? {
        0 => Ok(AssetKind::Material),
        1 => Ok(AssetKind::Texture),
        2 => Ok(AssetKind::Audio),
        3 => Ok(AssetKind::AnimationClip),
        t => Err(bad_tag("asset kind", t)),
    }
}

fn constraint_kind_tag(kind: ConstraintKind) -> u32 {
    match kind {
        ConstraintKind::Aim => 0,
        ConstraintKind::Parent => 1,
        ConstraintKind::Position => 2,
        ConstraintKind::Rotation => 3,
        ConstraintKind::Scale => 4,
    }
}

fn read_constraint_kind(r: &mut Reader) -> SyncResult<ConstraintKind> {
    match r.u32()? {
        0 => Ok(ConstraintKind::Aim),
        1 => Ok(ConstraintKind::Parent),
        2 => Ok(ConstraintKind::Position),
        3 => Ok(ConstraintKind::Rotation),
        4 => Ok(ConstraintKind::Scale),
        t => Err(bad_tag("constraint kind", t)),
    }
}

fn write_snapshot(w: &mut Writer, s: &SceneSnapshot) {
    w.list(&s.assets, |w, a| {
        write_identifier(w, &a.ident);
        w.u32(asset_kind_tag(a.kind));
        w.bytes(&a.data);
    });
    w.list(&s.entities, write_entity);
    w.list(&s.constraints, |w, c| {
        w.str(&c.path);
        w.u32(constraint_kind_tag(c.kind));
        w.list(&c.source_paths, |w, s| w.str(s));
    });
    w.list(&s.instanced_entities, write_entity);
    w.list(&s.instance_infos, |w, i| {
        w.str(&i.path);
        w.str(&i.entity_path);
        w.str(&i.parent_path);
        w.list(&i.transforms, |w, m| w.mat4(m));
    });
}

fn read_snapshot(r: &mut Reader) -> SyncResult<SceneSnapshot> {
    Ok(SceneSnapshot {
        assets: r.list(|r| {
            Ok(AssetDelta {
                ident: read_identifier(r)?,
                kind: read_asset_kind(r)?,
                data: r.bytes()?,
            })
        })?,
        entities: r.list(read_entity)?,
        constraints: r.list(|r| {
            Ok(ConstraintDelta {
                path: r.str()?,
                kind: read_constraint_kind(r)?,
                source_paths: r.list(|r| r.str())?,
            })
        })?,
        instanced_entities: r.list(read_entity)?,
        instance_infos: r.list(|r| {
            Ok(InstanceInfoDelta {
                path: r.str()?,
                entity_path: r.str()?,
                parent_path: r.str()?,
                transforms: r.list(|r| r.mat4())?,
            })
        })?,
    })
}

/// Serialize one message to its wire frame.
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(msg.body.kind_tag());
    w.i32(msg.header.protocol_version);
    w.i32(msg.header.session_id);
    w.i32(msg.header.message_id);
    w.f64(msg.header.timestamp_send);
    match &msg.body {
        MessageBody::Get(g) => {
            w.u32(g.flags.to_bits());
            w.f32(g.scene.scale_factor);
            w.u32(match g.scene.handedness {
                Handedness::Left => 0,
                Handedness::Right => 1,
            });
            w.f32(g.refine.scale_factor);
            w.f32(g.refine.smooth_angle);
            w.u32(g.refine.split_unit);
            w.i32(g.refine.max_bone_influence);
        }
        MessageBody::Set(scene) => write_snapshot(&mut w, scene),
        MessageBody::Delete(d) => {
            w.list(&d.entities, write_identifier);
            w.list(&d.materials, write_identifier);
            w.list(&d.instances, write_identifier);
        }
        MessageBody::Fence(f) => w.u32(match f {
            FenceType::SceneBegin => 1,
            FenceType::SceneEnd => 2,
        }),
        MessageBody::Text(t) => {
            w.str(&t.text);
            w.u32(match t.kind {
                TextKind::Normal => 0,
                TextKind::Warning => 1,
                TextKind::Error => 2,
            });
        }
        MessageBody::Screenshot => {}
        MessageBody::Query(q) => w.u32(match q {
            QueryKind::ClientName => 1,
            QueryKind::RootNodes => 2,
            QueryKind::AllNodes => 3,
        }),
        MessageBody::Response(resp) => w.list(&resp.text, |w, s| w.str(s)),
        MessageBody::Poll(p) => w.u32(match p {
            PollType::SceneUpdate => 1,
        }),
    }
    w.buf
}

/// Deserialize one wire frame. The protocol version is validated before any
/// other header field is trusted; a mismatch is fatal to the session.
pub fn decode_message(bytes: &[u8]) -> SyncResult<Message> {
    let mut r = Reader::new(bytes);
    let kind = r.u32()?;
    let protocol_version = r.i32()?;
    if protocol_version != PROTOCOL_VERSION {
        return Err(SyncError::ProtocolMismatch {
            expected: PROTOCOL_VERSION,
            found: protocol_version,
        });
    }
    let header = Header {
        protocol_version,
        session_id: r.i32()?,
        message_id: r.i32()?,
        timestamp_send: r.f64()?,
    };
    let body = match kind {
        1 => MessageBody::Get(GetData {
            flags: GetFlags::from_bits(r.u32()?),
            scene: SceneSettings {
                scale_factor: r.f32()?,
                handedness: match r.u32()? {
                    0 => Handedness::Left,
                    1 => Handedness::Right,
                    t => return Err(bad_tag("handedness", t)),
                },
            },
            refine: MeshRefineSettings {
                scale_factor: r.f32()?,
                smooth_angle: r.f32()?,
                split_unit: r.u32()?,
                max_bone_influence: r.i32()?,
            },
        }),
        2 => MessageBody::Set(read_snapshot(&mut r)?),
        3 => MessageBody::Delete(DeleteData {
            entities: r.list(read_identifier)?,
            materials: r.list(read_identifier)?,
            instances: r.list(read_identifier)?,
        }),
        4 => MessageBody::Fence(match r.u32()? {
            1 => FenceType::SceneBegin,
            2 => FenceType::SceneEnd,
            t => return Err(bad_tag("fence", t)),
        }),
        5 => MessageBody::Text(TextData {
            text: r.str()?,
            kind: match r.u32()? {
                0 => TextKind::Normal,
                1 => TextKind::Warning,
                2 => TextKind::Error,
                t => return Err(bad_tag("text kind", t)),
            },
        }),
        6 => MessageBody::Screenshot,
        7 => MessageBody::Query(match r.u32()? {
            1 => QueryKind::ClientName,
            2 => QueryKind::RootNodes,
            3 => QueryKind::AllNodes,
            t => return Err(bad_tag("query kind", t)),
        }),
        8 => MessageBody::Response(ResponseData {
            text: r.list(|r| r.str())?,
        }),
        9 => MessageBody::Poll(match r.u32()? {
            1 => PollType::SceneUpdate,
            t => return Err(bad_tag("poll", t)),
        }),
        t => return Err(bad_tag("message kind", t)),
    };
    if r.remaining() != 0 {
        return Err(SyncError::MalformedPayload(format!(
            "{} trailing bytes after payload",
            r.remaining()
        )));
    }
    Ok(Message { header, body })
}
