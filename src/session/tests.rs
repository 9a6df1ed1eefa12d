//! End-to-end engine tests: fence bracketing, buffered batch application,
//! deferred resolution and request correlation.

use glam::{Mat4, Vec3};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::instancing::InstanceDraw;
use crate::model::{
    AssetDelta, AssetKind, ConstraintDelta, ConstraintKind, EntityDelta, Identifier,
    InstanceInfoDelta, MeshDelta, MeshFlags, SceneSnapshot, TransformDelta, TransformFlags,
};
use crate::protocol::{
    DeleteData, FenceType, Header, Message, MessageBody, PollType, QueryKind, ResponseData,
};
use crate::registry::{LocalScene, MaterialHandle, MeshHandle};
use crate::session::{SessionState, SyncEngine};
use crate::testutil::{MockImporter, MockScene, RecordingObserver};

type TestEngine = SyncEngine<MockScene, MockImporter, RecordingObserver>;

fn engine() -> TestEngine {
    let mut e = SyncEngine::new(
        MockScene::new(),
        MockImporter::default(),
        RecordingObserver::default(),
        SyncConfig::default(),
    );
    e.open_session(1);
    e
}

fn msg(body: MessageBody) -> Message {
    Message::new(Header::new(1, 50, 0.0), body)
}

fn fence(kind: FenceType) -> Message {
    msg(MessageBody::Fence(kind))
}

fn set(snapshot: SceneSnapshot) -> Message {
    msg(MessageBody::Set(snapshot))
}

fn moved(path: &str, pos: Vec3) -> TransformDelta {
    let mut t = TransformDelta::new(Identifier::from_path(path));
    t.flags = t.flags.with(TransformFlags::POSITION);
    t.position = pos;
    t
}

fn snapshot_with(entities: Vec<EntityDelta>) -> SceneSnapshot {
    SceneSnapshot {
        entities,
        ..Default::default()
    }
}

fn mesh_proto(path: &str) -> MeshDelta {
    let mut m = MeshDelta::new(Identifier::from_path(path));
    m.flags = MeshFlags(MeshFlags::POINTS | MeshFlags::INDICES | MeshFlags::MATERIAL_IDS);
    m.points = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
    m.indices = vec![0, 1, 2];
    m.material_ids = vec![0];
    m
}

#[derive(Default)]
struct CountingDraw {
    calls: Vec<(MeshHandle, usize, MaterialHandle, usize)>,
}

impl InstanceDraw for CountingDraw {
    fn draw_instanced(
        &mut self,
        mesh: MeshHandle,
        submesh: usize,
        material: MaterialHandle,
        transforms: &[Mat4],
    ) {
        self.calls.push((mesh, submesh, material, transforms.len()));
    }
}

#[test]
fn empty_fenced_batch_fires_begin_and_end_only() {
    let mut e = engine();
    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();
    assert_eq!(e.observer().events, vec!["begin", "end"]);
    assert_eq!(e.state(), SessionState::AwaitingSceneBegin);
}

#[test]
fn deltas_buffer_until_scene_end() {
    let mut e = engine();
    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    e.handle_message(set(snapshot_with(vec![EntityDelta::Transform(moved(
        "/a",
        Vec3::X,
    ))])))
    .unwrap();
    // Still buffered.
    assert!(e.registry().is_empty());
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();
    assert_eq!(e.registry().len(), 1);
    assert_eq!(e.observer().events, vec!["begin", "entity:/a", "end"]);
}

#[test]
fn unfenced_set_is_a_degenerate_batch() {
    let mut e = engine();
    e.handle_message(set(snapshot_with(vec![EntityDelta::Transform(moved(
        "/a",
        Vec3::X,
    ))])))
    .unwrap();
    assert_eq!(e.registry().len(), 1);
    assert_eq!(e.observer().events, vec!["begin", "entity:/a", "end"]);
}

#[test]
fn unfenced_delete_is_a_degenerate_batch() {
    let mut e = engine();
    e.handle_message(set(snapshot_with(vec![EntityDelta::Transform(moved(
        "/doomed",
        Vec3::X,
    ))])))
    .unwrap();
    e.handle_message(msg(MessageBody::Delete(DeleteData {
        entities: vec![Identifier::from_path("/doomed")],
        ..Default::default()
    })))
    .unwrap();
    assert_eq!(
        e.observer().events,
        vec!["begin", "entity:/doomed", "end", "begin", "delete:/doomed", "end"]
    );
}

#[test]
fn constraints_stored_and_notified() {
    let mut e = engine();
    let snapshot = SceneSnapshot {
        entities: vec![
            EntityDelta::Transform(moved("/cam", Vec3::X)),
            EntityDelta::Transform(moved("/hero", Vec3::Z)),
        ],
        constraints: vec![ConstraintDelta {
            path: "/cam".into(),
            kind: ConstraintKind::Aim,
            source_paths: vec!["/hero".into()],
        }],
        ..Default::default()
    };
    e.handle_message(set(snapshot)).unwrap();

    let stored = e.constraint("/cam").expect("constraint retained");
    assert_eq!(stored.kind, ConstraintKind::Aim);
    assert_eq!(stored.source_paths, vec!["/hero".to_string()]);
    assert!(e.observer().events.iter().any(|ev| ev == "constraint:/cam"));
    assert!(e.constraint("/hero").is_none());
}

#[test]
fn last_write_wins_per_field_within_a_batch() {
    let mut e = engine();
    let mut rotated = TransformDelta::new(Identifier::from_path("/a"));
    rotated.flags = rotated.flags.with(TransformFlags::ROTATION);
    rotated.rotation = glam::Quat::from_rotation_z(0.7);

    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    e.handle_message(set(snapshot_with(vec![
        EntityDelta::Transform(moved("/a", Vec3::X)),
        EntityDelta::Transform(rotated.clone()),
        EntityDelta::Transform(moved("/a", Vec3::Z)),
    ])))
    .unwrap();
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();

    let rec = e.registry().get_path("/a").unwrap();
    // Position from the last flagged write; rotation untouched by it.
    assert_eq!(rec.position, Vec3::Z);
    assert_eq!(rec.rotation, rotated.rotation);
}

#[test]
fn reference_to_skeletal_entity_sees_post_bone_state() {
    let mut e = engine();
    let mut skinned = mesh_proto("/B");
    skinned.flags = MeshFlags(skinned.flags.0 | MeshFlags::BONES);
    skinned.bone_paths = vec!["/rig/bone".into()];

    let mut alias = TransformDelta::new(Identifier::from_path("/A"));
    alias.flags = alias.flags.with(TransformFlags::REFERENCE);
    alias.reference = "/B".into();

    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    // Alias arrives before its target, bones before their mesh: forward
    // references in both directions.
    e.handle_message(set(snapshot_with(vec![
        EntityDelta::Transform(alias),
        EntityDelta::Mesh(skinned),
        EntityDelta::Transform(moved("/rig/bone", Vec3::Y)),
    ])))
    .unwrap();
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();

    let a = e.registry().get_path("/A").unwrap();
    let mesh = a.mesh.as_ref().expect("alias mirrored mesh");
    assert!(mesh.skinning_enabled, "mirror ran after bone resolution");
    assert_eq!(mesh.bones.len(), 1);
}

#[test]
fn delete_by_path_fires_exactly_one_callback() {
    let mut e = engine();
    e.handle_message(set(snapshot_with(vec![EntityDelta::Transform(moved(
        "/doomed",
        Vec3::X,
    ))])))
    .unwrap();
    e.handle_message(msg(MessageBody::Delete(DeleteData {
        entities: vec![Identifier::from_path("/doomed")],
        ..Default::default()
    })))
    .unwrap();

    let deletes: Vec<&String> = e
        .observer()
        .events
        .iter()
        .filter(|ev| ev.starts_with("delete:"))
        .collect();
    assert_eq!(deletes, vec!["delete:/doomed"]);
    assert!(e.registry().is_empty());
    assert_eq!(e.scene().destroyed, vec!["/doomed".to_string()]);
}

#[test]
fn delete_by_id_spares_host_object() {
    let mut e = engine();
    e.scene_mut().register_host(42, "/host/prop");
    e.handle_message(set(snapshot_with(vec![EntityDelta::Transform(
        TransformDelta::new(Identifier::with_id("/host/prop", 42)),
    )])))
    .unwrap();
    e.handle_message(msg(MessageBody::Delete(DeleteData {
        entities: vec![Identifier::with_id("/host/prop", 42)],
        ..Default::default()
    })))
    .unwrap();
    assert!(e.registry().is_empty());
    assert!(e.scene().destroyed.is_empty());
    assert!(e.scene().find_by_path("/host/prop").is_some());
}

#[test]
fn missing_instance_parent_falls_back_to_root() {
    let mut e = engine();
    let snapshot = SceneSnapshot {
        instanced_entities: vec![EntityDelta::Mesh(mesh_proto("/rock"))],
        instance_infos: vec![InstanceInfoDelta {
            path: "/rocks".into(),
            entity_path: "/rock".into(),
            parent_path: "/terrain".into(),
            transforms: vec![Mat4::IDENTITY; 5],
        }],
        ..Default::default()
    };
    e.handle_message(set(snapshot)).unwrap();

    let record = e.instances().record("/rocks").expect("batch registered");
    assert_eq!(record.parent, e.scene().root());
    assert_eq!(e.instances().chunk_sizes("/rocks"), vec![5]);
}

#[test]
fn instance_batches_render_with_imported_materials() {
    let mut e = engine();
    let snapshot = SceneSnapshot {
        assets: vec![AssetDelta::new(
            Identifier::with_id("/mat/stone", 0),
            AssetKind::Material,
            vec![0xAB],
        )],
        instanced_entities: vec![EntityDelta::Mesh(mesh_proto("/rock"))],
        instance_infos: vec![InstanceInfoDelta {
            path: "/rocks".into(),
            entity_path: "/rock".into(),
            parent_path: String::new(),
            transforms: vec![Mat4::IDENTITY; 2047],
        }],
        ..Default::default()
    };
    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    e.handle_message(set(snapshot)).unwrap();
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();

    assert_eq!(e.instances().chunk_sizes("/rocks"), vec![1023, 1023, 1]);
    let mut draw = CountingDraw::default();
    e.render_instances(&mut draw);
    assert_eq!(draw.calls.len(), 3);
    let total: usize = draw.calls.iter().map(|c| c.3).sum();
    assert_eq!(total, 2047);
}

#[test]
fn failed_asset_import_does_not_block_entities() {
    let mut importer = MockImporter::default();
    importer.fail_paths.push("/mat/bad".into());
    let mut e = SyncEngine::new(
        MockScene::new(),
        importer,
        RecordingObserver::default(),
        SyncConfig::default(),
    );
    e.open_session(1);

    let snapshot = SceneSnapshot {
        assets: vec![AssetDelta::new(
            Identifier::with_id("/mat/bad", 1),
            AssetKind::Material,
            vec![],
        )],
        entities: vec![EntityDelta::Transform(moved("/survivor", Vec3::X))],
        ..Default::default()
    };
    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    e.handle_message(set(snapshot)).unwrap();
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();

    assert!(e.registry().get_path("/survivor").is_some());
    let events = &e.observer().events;
    assert!(events.iter().any(|ev| ev == "entity:/survivor"));
    assert!(!events.iter().any(|ev| ev.starts_with("material:")));
}

#[test]
fn queries_answered_out_of_band_while_streaming() {
    let mut e = engine();
    e.handle_message(set(snapshot_with(vec![
        EntityDelta::Transform(moved("/a", Vec3::X)),
        EntityDelta::Transform(moved("/a/b", Vec3::X)),
        EntityDelta::Transform(moved("/c", Vec3::X)),
    ])))
    .unwrap();

    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    let query = Message::new(Header::new(1, 99, 0.0), MessageBody::Query(QueryKind::RootNodes));
    e.handle_message(query).unwrap();
    // Response is produced immediately, mid-fence.
    let outbox = e.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].header.message_id, 99);
    match &outbox[0].body {
        MessageBody::Response(data) => {
            assert_eq!(data.text, vec!["/a".to_string(), "/c".to_string()]);
        }
        other => panic!("expected Response, got {:?}", other),
    }
    assert_eq!(e.state(), SessionState::Streaming);
}

#[test]
fn response_completes_the_correlated_request() {
    let mut e = engine();
    let (request, token) = e.make_query(QueryKind::ClientName, 0.0);
    assert!(!token.is_ready());

    let reply = Message::new(
        Header::new(1, request.header.message_id, 0.0),
        MessageBody::Response(ResponseData {
            text: vec!["exporter".into()],
        }),
    );
    e.handle_message(reply).unwrap();
    assert!(token.is_ready());
    let data = e.take_response(request.header.message_id).unwrap();
    assert_eq!(data.text, vec!["exporter".to_string()]);
}

#[test]
fn poll_completes_at_next_scene_end() {
    let mut e = engine();
    let token = e.poll_scene_update();
    e.handle_message(msg(MessageBody::Poll(PollType::SceneUpdate)))
        .unwrap();
    assert!(!token.is_ready());

    e.handle_message(fence(FenceType::SceneBegin)).unwrap();
    e.handle_message(fence(FenceType::SceneEnd)).unwrap();

    assert!(token.is_ready());
    let outbox = e.take_outbox();
    assert_eq!(outbox.len(), 1);
    assert!(matches!(outbox[0].body, MessageBody::Response(_)));
    assert_eq!(outbox[0].header.message_id, 50);
}

#[test]
fn close_session_cancels_outstanding_tokens() {
    let mut e = engine();
    let (_, query_token) = e.make_query(QueryKind::AllNodes, 0.0);
    let poll_token = e.poll_scene_update();

    e.close_session();
    assert!(query_token.is_cancelled());
    assert!(poll_token.is_cancelled());
    assert!(!query_token.is_ready());
    assert!(e.registry().is_empty());
}

#[test]
fn closed_session_rejects_messages() {
    let mut e = engine();
    e.close_session();
    assert_eq!(
        e.handle_message(fence(FenceType::SceneBegin)),
        Err(SyncError::SessionClosed)
    );
}

#[test]
fn delete_instance_info_fires_callback_and_drops_batch() {
    let mut e = engine();
    let snapshot = SceneSnapshot {
        instanced_entities: vec![EntityDelta::Mesh(mesh_proto("/rock"))],
        instance_infos: vec![InstanceInfoDelta {
            path: "/rocks".into(),
            entity_path: "/rock".into(),
            parent_path: String::new(),
            transforms: vec![Mat4::IDENTITY],
        }],
        ..Default::default()
    };
    e.handle_message(set(snapshot)).unwrap();
    assert!(e.instances().contains("/rocks"));

    e.handle_message(msg(MessageBody::Delete(DeleteData {
        instances: vec![Identifier::from_path("/rocks")],
        ..Default::default()
    })))
    .unwrap();
    assert!(!e.instances().contains("/rocks"));
    assert!(e
        .observer()
        .events
        .iter()
        .any(|ev| ev == "delete_instance_info:/rocks"));
}
