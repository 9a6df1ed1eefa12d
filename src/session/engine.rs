//! Sync engine: fence state machine and batch application
//!
//! All deltas between a SceneBegin and SceneEnd fence belong to one batch.
//! They are buffered in arrival order and applied together at SceneEnd;
//! dependency resolution and the instance-batch refresh run once per
//! batch. Queries are answered out of band, independent of fence state.
//!
//! Stage order within a batch: assets, entities, constraints, instanced
//! entities, instance infos. A failure in one stage never blocks the rest.

use std::collections::HashMap;

use log::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::instancing::{InstanceBatchManager, InstanceDraw, InstanceInfoRecord};
use crate::model::{
    AssetDelta, AssetKind, ConstraintDelta, EntityDelta, InstanceInfoDelta, SceneSnapshot,
};
use crate::protocol::{
    DeleteData, FenceType, GetData, Header, Message, MessageBody, PollType, QueryKind,
    ResponseData, TextKind,
};
use crate::registry::{
    AssetImporter, EntityRegistry, LocalScene, MaterialHandle, MeshHandle, SceneObserver,
};
use crate::resolve::{self, ResolveWork};

use super::queue::MessageReceiver;
use super::ready::{ReadyToken, TokenRegistry};

/// Fence protocol state. Outside a fence pair the engine idles; between
/// SceneBegin and SceneEnd every delta message is buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingSceneBegin,
    Streaming,
}

enum BatchItem {
    Set(SceneSnapshot),
    Delete(DeleteData),
}

pub struct SyncEngine<S, I, O>
where
    S: LocalScene,
    I: AssetImporter,
    O: SceneObserver,
{
    config: SyncConfig,
    scene: S,
    importer: I,
    observer: O,
    registry: EntityRegistry,
    work: ResolveWork,
    instances: InstanceBatchManager,
    /// Material-id to host-handle table fed by asset deltas.
    materials: HashMap<i32, MaterialHandle>,
    constraints: HashMap<String, ConstraintDelta>,
    state: SessionState,
    pending: Vec<BatchItem>,
    /// Responses waiting for the transport to pick up.
    outbox: Vec<Message>,
    tokens: TokenRegistry,
    /// Local consumers blocked on the next scene update.
    scene_update_tokens: Vec<ReadyToken>,
    /// Remote long-polls answered at the next SceneEnd.
    pending_polls: Vec<Header>,
    /// Outstanding requests this side sent, keyed by message id.
    requests: HashMap<i32, ReadyToken>,
    responses: HashMap<i32, ResponseData>,
    session_id: i32,
    next_message_id: i32,
    open: bool,
}

impl<S, I, O> SyncEngine<S, I, O>
where
    S: LocalScene,
    I: AssetImporter,
    O: SceneObserver,
{
    pub fn new(scene: S, importer: I, observer: O, config: SyncConfig) -> Self {
        Self {
            config,
            scene,
            importer,
            observer,
            registry: EntityRegistry::new(),
            work: ResolveWork::new(),
            instances: InstanceBatchManager::new(),
            materials: HashMap::new(),
            constraints: HashMap::new(),
            state: SessionState::AwaitingSceneBegin,
            pending: Vec::new(),
            outbox: Vec::new(),
            tokens: TokenRegistry::new(),
            scene_update_tokens: Vec::new(),
            pending_polls: Vec::new(),
            requests: HashMap::new(),
            responses: HashMap::new(),
            session_id: 0,
            next_message_id: 1,
            open: false,
        }
    }

    pub fn open_session(&mut self, session_id: i32) {
        if self.open {
            self.close_session();
        }
        self.session_id = session_id;
        self.next_message_id = 1;
        self.open = true;
        info!("session {} opened", session_id);
    }

    /// Tears the session down: clears both registry tables, drops instance
    /// batches and cancels every outstanding readiness token.
    pub fn close_session(&mut self) {
        self.tokens.cancel_all();
        for token in self.scene_update_tokens.drain(..) {
            token.cancel();
        }
        for (_, token) in self.requests.drain() {
            token.cancel();
        }
        self.responses.clear();
        self.registry.clear();
        self.work.clear();
        self.instances.clear();
        self.materials.clear();
        self.constraints.clear();
        self.pending.clear();
        self.pending_polls.clear();
        self.outbox.clear();
        self.state = SessionState::AwaitingSceneBegin;
        self.open = false;
        info!("session {} closed", self.session_id);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceBatchManager {
        &self.instances
    }

    /// Latest constraint delta applied for a path, if any. Constraint
    /// evaluation itself is the host's concern.
    pub fn constraint(&self, path: &str) -> Option<&ConstraintDelta> {
        self.constraints.get(path)
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Messages this side produced (query responses, poll replies) for the
    /// transport to send.
    pub fn take_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    /// Issues the buffered instance draws.
    pub fn render_instances(&self, draw: &mut dyn InstanceDraw) {
        self.instances.render_all(draw);
    }

    fn next_header(&mut self, timestamp: f64) -> Header {
        let header = Header::new(self.session_id, self.next_message_id, timestamp);
        self.next_message_id += 1;
        header
    }

    fn tracked_request(&mut self, body: MessageBody, timestamp: f64) -> (Message, ReadyToken) {
        let header = self.next_header(timestamp);
        let token = ReadyToken::new();
        self.tokens.register(&token);
        self.requests.insert(header.message_id, token.clone());
        (Message::new(header, body), token)
    }

    /// Builds a pull request. The returned token becomes ready when the
    /// correlated response arrives; it cancels on session close.
    pub fn make_get(&mut self, data: GetData, timestamp: f64) -> (Message, ReadyToken) {
        self.tracked_request(MessageBody::Get(data), timestamp)
    }

    pub fn make_query(&mut self, kind: QueryKind, timestamp: f64) -> (Message, ReadyToken) {
        self.tracked_request(MessageBody::Query(kind), timestamp)
    }

    pub fn make_screenshot(&mut self, timestamp: f64) -> (Message, ReadyToken) {
        self.tracked_request(MessageBody::Screenshot, timestamp)
    }

    /// Response payload for a completed request, by message id.
    pub fn take_response(&mut self, message_id: i32) -> Option<ResponseData> {
        self.responses.remove(&message_id)
    }

    /// Blocks a local consumer on the next scene update without a full
    /// pull. The token becomes ready at the next SceneEnd.
    pub fn poll_scene_update(&mut self) -> ReadyToken {
        let token = ReadyToken::new();
        self.tokens.register(&token);
        self.scene_update_tokens.push(token.clone());
        token
    }

    /// Applies everything currently queued by the decode thread.
    pub fn pump(&mut self, rx: &MessageReceiver) -> SyncResult<usize> {
        let mut handled = 0;
        for msg in rx.drain() {
            self.handle_message(msg)?;
            handled += 1;
        }
        Ok(handled)
    }

    pub fn handle_message(&mut self, msg: Message) -> SyncResult<()> {
        if !self.open {
            return Err(SyncError::SessionClosed);
        }
        match msg.body {
            MessageBody::Set(snapshot) => {
                if self.state == SessionState::Streaming {
                    self.pending.push(BatchItem::Set(snapshot));
                } else {
                    // Unfenced set: a degenerate single-message batch.
                    self.observer.on_scene_update_begin();
                    self.apply_snapshot(&snapshot);
                    self.finish_batch();
                }
            }
            MessageBody::Delete(delete) => {
                if self.state == SessionState::Streaming {
                    self.pending.push(BatchItem::Delete(delete));
                } else {
                    self.observer.on_scene_update_begin();
                    self.apply_delete(&delete);
                    self.finish_batch();
                }
            }
            MessageBody::Fence(FenceType::SceneBegin) => {
                if self.state == SessionState::Streaming {
                    warn!("SceneBegin while already streaming, dropping buffered batch");
                    self.pending.clear();
                }
                self.state = SessionState::Streaming;
                self.observer.on_scene_update_begin();
            }
            MessageBody::Fence(FenceType::SceneEnd) => {
                if self.state != SessionState::Streaming {
                    warn!("SceneEnd without SceneBegin, ignoring");
                    return Ok(());
                }
                let items = std::mem::take(&mut self.pending);
                for item in &items {
                    match item {
                        BatchItem::Set(snapshot) => self.apply_snapshot(snapshot),
                        BatchItem::Delete(delete) => self.apply_delete(delete),
                    }
                }
                self.finish_batch();
                self.state = SessionState::AwaitingSceneBegin;
            }
            MessageBody::Text(text) => match text.kind {
                TextKind::Normal => info!("peer: {}", text.text),
                TextKind::Warning => warn!("peer: {}", text.text),
                TextKind::Error => error!("peer: {}", text.text),
            },
            MessageBody::Query(kind) => {
                let response = self.answer_query(kind);
                // Correlated by the requester's session and message ids.
                let header = Header::new(msg.header.session_id, msg.header.message_id, 0.0);
                self.outbox
                    .push(Message::new(header, MessageBody::Response(response)));
            }
            MessageBody::Response(data) => {
                if let Some(token) = self.requests.remove(&msg.header.message_id) {
                    self.responses.insert(msg.header.message_id, data);
                    token.set_ready();
                } else {
                    debug!(
                        "response for unknown message id {}, dropping",
                        msg.header.message_id
                    );
                }
            }
            MessageBody::Poll(PollType::SceneUpdate) => {
                self.pending_polls.push(msg.header);
            }
            MessageBody::Get(_) | MessageBody::Screenshot => {
                // This side consumes scenes; pull requests are served by
                // the exporting peer.
                debug!("ignoring inbound pull request");
            }
        }
        Ok(())
    }

    fn answer_query(&self, kind: QueryKind) -> ResponseData {
        let text = match kind {
            QueryKind::ClientName => vec![self.config.client_name.clone()],
            QueryKind::RootNodes => self.registry.root_paths(),
            QueryKind::AllNodes => self.registry.paths(),
        };
        ResponseData { text }
    }

    fn apply_snapshot(&mut self, snapshot: &SceneSnapshot) {
        self.apply_assets(&snapshot.assets);
        self.apply_entities(&snapshot.entities, false);
        self.apply_constraints(&snapshot.constraints);
        self.apply_entities(&snapshot.instanced_entities, true);
        self.apply_instance_infos(&snapshot.instance_infos);
    }

    fn apply_assets(&mut self, assets: &[AssetDelta]) {
        for asset in assets {
            match asset.kind {
                AssetKind::Material => {
                    match self.importer.import_material(&asset.ident, &asset.data) {
                        Ok(handle) => {
                            self.materials.insert(asset.ident.id, handle);
                            self.observer.on_update_material(&asset.ident);
                        }
                        Err(e) => warn!("{}", e),
                    }
                }
                AssetKind::Texture => {
                    match self.importer.import_texture(&asset.ident, &asset.data) {
                        Ok(_) => self.observer.on_update_texture(&asset.ident),
                        Err(e) => warn!("{}", e),
                    }
                }
                AssetKind::Audio => match self.importer.import_audio(&asset.ident, &asset.data) {
                    Ok(_) => self.observer.on_update_audio(&asset.ident),
                    Err(e) => warn!("{}", e),
                },
                AssetKind::AnimationClip => {
                    match self.importer.import_animation(&asset.ident, &asset.data) {
                        Ok(_) => self.observer.on_update_animation(&asset.ident),
                        Err(e) => warn!("{}", e),
                    }
                }
            }
        }
    }

    fn apply_entities(&mut self, deltas: &[EntityDelta], instanced: bool) {
        for delta in deltas {
            let rec = match delta {
                EntityDelta::Transform(t) => {
                    self.registry
                        .upsert_transform(t, &mut self.scene, &self.config)
                }
                EntityDelta::Camera(c) => {
                    self.registry.upsert_camera(c, &mut self.scene, &self.config)
                }
                EntityDelta::Light(l) => {
                    self.registry.upsert_light(l, &mut self.scene, &self.config)
                }
                EntityDelta::Mesh(m) => self.registry.upsert_mesh(
                    m,
                    &mut self.scene,
                    &mut self.importer,
                    &self.config,
                ),
                EntityDelta::Points(p) => {
                    self.registry.upsert_points(p, &mut self.scene, &self.config)
                }
            };
            let Some(rec) = rec else { continue };
            if instanced {
                rec.instanced_prototype = true;
            }
            let path = rec.ident.path.clone();
            let bones_pending = rec.pending_bones.is_some();
            let has_reference = rec.reference.is_some();

            if bones_pending {
                self.work.mark_bones(&path);
            }
            if has_reference {
                self.work.mark_reference(&path);
            } else {
                self.work.clear_reference(&path);
            }
            if instanced {
                self.observer.on_update_instanced_entity(&path, delta);
            } else {
                self.observer.on_update_entity(&path, delta);
            }
        }
    }

    fn apply_constraints(&mut self, constraints: &[ConstraintDelta]) {
        for constraint in constraints {
            if self.registry.get_path(&constraint.path).is_none() {
                debug!(
                    "constraint target '{}' not registered yet",
                    constraint.path
                );
            }
            self.constraints
                .insert(constraint.path.clone(), constraint.clone());
            self.observer.on_update_constraint(constraint);
        }
    }

    fn apply_instance_infos(&mut self, infos: &[InstanceInfoDelta]) {
        for info in infos {
            let parent = self.resolve_instance_parent(info);
            let (mesh, submesh_count, materials) = self.prototype_render_data(&info.entity_path);
            self.instances.set_instances(
                InstanceInfoRecord {
                    path: info.path.clone(),
                    entity_path: info.entity_path.clone(),
                    parent,
                },
                mesh,
                submesh_count,
                materials,
                &info.transforms,
            );
            self.observer.on_update_instance_info(info);
        }
    }

    fn resolve_instance_parent(
        &self,
        info: &InstanceInfoDelta,
    ) -> crate::registry::ObjectHandle {
        if info.parent_path.is_empty() {
            return self.scene.root();
        }
        let found = self
            .registry
            .get_path(&info.parent_path)
            .map(|r| r.handle)
            .filter(|h| self.scene.is_valid(*h));
        match found {
            Some(handle) => handle,
            None => {
                // May mask an upstream ordering bug; warn, never drop.
                warn!(
                    "{}",
                    SyncError::MissingParent {
                        path: info.path.clone(),
                        parent: info.parent_path.clone(),
                    }
                );
                self.scene.root()
            }
        }
    }

    fn prototype_render_data(
        &self,
        entity_path: &str,
    ) -> (Option<MeshHandle>, usize, Vec<MaterialHandle>) {
        let Some(mesh) = self.registry.get_path(entity_path).and_then(|r| r.mesh.as_ref())
        else {
            return (None, 0, Vec::new());
        };
        let mut ids = mesh.material_ids.clone();
        ids.sort_unstable();
        ids.dedup();
        let materials = ids
            .iter()
            .filter_map(|id| self.materials.get(id).copied())
            .collect();
        (mesh.handle, mesh.submesh_count(), materials)
    }

    fn apply_delete(&mut self, delete: &DeleteData) {
        for ident in &delete.entities {
            if let Some(removed) = self.registry.erase(ident, &mut self.scene) {
                self.work.forget(removed.path());
                if removed.instanced_prototype {
                    self.observer.on_delete_instanced_entity(ident);
                } else {
                    self.observer.on_delete_entity(ident);
                }
            }
        }
        for ident in &delete.materials {
            self.materials.remove(&ident.id);
        }
        for ident in &delete.instances {
            if self.instances.remove(&ident.path) {
                self.observer.on_delete_instance_info(ident);
            }
        }
    }

    /// Runs once at batch end: the two resolver passes, the instance
    /// refresh, the end callback, then readiness signals.
    fn finish_batch(&mut self) {
        resolve::run(&mut self.work, &mut self.registry, &self.scene);
        self.refresh_instance_meshes();
        self.observer.on_scene_update_end();

        for token in self.scene_update_tokens.drain(..) {
            token.set_ready();
        }
        for header in self.pending_polls.drain(..) {
            let reply = Header::new(header.session_id, header.message_id, 0.0);
            self.outbox.push(Message::new(
                reply,
                MessageBody::Response(ResponseData {
                    text: vec!["SceneUpdate".to_string()],
                }),
            ));
        }
    }

    /// Instance sets registered before their prototype mesh imported pick
    /// the mesh up here, after resolution.
    fn refresh_instance_meshes(&mut self) {
        for path in self.instances.paths_needing_mesh() {
            let Some(entity_path) = self.instances.record(&path).map(|r| r.entity_path.clone())
            else {
                continue;
            };
            let (mesh, submesh_count, materials) = self.prototype_render_data(&entity_path);
            if let Some(mesh) = mesh {
                self.instances.bind_mesh(&path, mesh, submesh_count, materials);
            }
        }
    }
}
