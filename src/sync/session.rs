//! Session controller: one context object, one event stream.
//!
//! Network callbacks, connection state changes and render frames are all
//! turned into `SessionEvent`s and pushed into a single channel. The
//! controller drains it on one task, so the connection set and the remote
//! avatars are only ever touched from one place. Events from one peer keep
//! their order; events from different peers interleave freely.

use std::collections::HashMap;
use std::time::Instant;

use glam::Vec3;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::broadcaster::PoseBroadcaster;
use super::connection::{CallHandle, ConnectionEvent, ConnectionRegistry, PeerId, PeerLink};
use super::interpolator::{AvatarView, RemoteAvatar};
use super::messages::PeerMessage;
use super::pose::PoseSample;
use super::reconnect::{ReconnectDecision, ReconnectPolicy, Reconnector, SignalingErrorKind};

pub type BoxedLink = Box<dyn PeerLink + Send>;

/// Everything the session reacts to.
pub enum SessionEvent {
    /// The signaling broker assigned us an id.
    SignalingOpen(PeerId),
    SignalingError(SignalingErrorKind),
    /// A data connection started handshaking.
    Connected(BoxedLink),
    Opened(PeerId),
    Data {
        peer: PeerId,
        text: String,
        at: Instant,
    },
    Closed(PeerId),
    Errored {
        peer: PeerId,
        reason: String,
    },
    CallAttached {
        peer: PeerId,
        call: Box<dyn CallHandle + Send>,
    },
    /// One render tick; `local` is the sampled local pose, if tracking is available.
    Frame {
        now: Instant,
        delta: f32,
        local: Option<PoseSample>,
    },
    /// A message produced locally (shot, screen toggle, prop placement).
    Local {
        msg: PeerMessage,
        now: Instant,
    },
    Shutdown,
}

/// What the loop should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The signaling link must be re-established.
    Retry(ReconnectDecision),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenState {
    pub show_content: bool,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prop {
    Pc,
    Robot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropPlacement {
    pub position: Vec3,
    /// Euler XYZ, radians.
    pub rotation: Vec3,
}

/// A shot fired by a remote peer, waiting for the renderer to spawn it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteShot {
    pub owner: PeerId,
    pub bullet_id: u64,
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

/// State owned by one session, from signaling open to teardown.
pub struct SessionContext {
    local_id: Option<PeerId>,
    registry: ConnectionRegistry<BoxedLink>,
    broadcaster: PoseBroadcaster,
    prop_broadcasters: HashMap<Prop, PoseBroadcaster>,
    reconnector: Reconnector,
    avatars: HashMap<PeerId, RemoteAvatar>,
    views: HashMap<PeerId, AvatarView>,
    screen: ScreenState,
    props: HashMap<Prop, PropPlacement>,
    shots: Vec<RemoteShot>,
    error: Option<String>,
}

impl SessionContext {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            local_id: None,
            registry: ConnectionRegistry::new(),
            broadcaster: PoseBroadcaster::default(),
            prop_broadcasters: HashMap::new(),
            reconnector: Reconnector::new(policy),
            avatars: HashMap::new(),
            views: HashMap::new(),
            screen: ScreenState::default(),
            props: HashMap::new(),
            shots: Vec::new(),
            error: None,
        }
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    /// User-visible error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn registry(&self) -> &ConnectionRegistry<BoxedLink> {
        &self.registry
    }

    pub fn avatar(&self, peer: &str) -> Option<&RemoteAvatar> {
        self.avatars.get(peer)
    }

    /// Avatars visible in the last frame, with their smoothed transforms.
    pub fn views(&self) -> &HashMap<PeerId, AvatarView> {
        &self.views
    }

    pub fn screen(&self) -> ScreenState {
        self.screen
    }

    pub fn prop(&self, prop: Prop) -> Option<&PropPlacement> {
        self.props.get(&prop)
    }

    /// Hands pending remote shots to the renderer.
    pub fn drain_shots(&mut self) -> Vec<RemoteShot> {
        std::mem::take(&mut self.shots)
    }

    /// Drops every connection, call and avatar.
    pub fn teardown(&mut self) {
        let links = self.registry.clear();
        info!("[Session] Teardown, {} connections dropped", links.len());
        self.avatars.clear();
        self.views.clear();
        self.shots.clear();
        self.props.clear();
        self.local_id = None;
    }

    fn handle_data(&mut self, peer: &str, text: &str, at: Instant) {
        if !self.registry.is_open(peer) {
            debug!("[Session] Ignoring data from {} (not open)", peer);
            return;
        }
        let msg = match PeerMessage::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("[Session] Dropping payload from {}: {}", peer, e);
                return;
            }
        };
        match msg {
            PeerMessage::Position { data } => match PoseSample::from_wire(&data) {
                Ok(sample) => self.avatars.entry(peer.to_string()).or_default().receive(sample, at),
                Err(e) => warn!("[Session] Dropping pose from {}: {}", peer, e),
            },
            PeerMessage::Shoot { bullet_id, position, direction } => {
                let Some(direction) = Vec3::from_array(direction).try_normalize() else {
                    warn!("[Session] Dropping shot from {}: degenerate direction", peer);
                    return;
                };
                self.shots.push(RemoteShot {
                    owner: peer.to_string(),
                    bullet_id,
                    origin: Vec3::from_array(position),
                    direction,
                });
            }
            other => self.apply_shared(&other),
        }
    }

    /// Applies state that every peer mirrors (screen, props).
    fn apply_shared(&mut self, msg: &PeerMessage) {
        match msg {
            PeerMessage::ScreenState { data } => self.screen.show_content = data.show_content,
            PeerMessage::PageChange { data } => self.screen.page = data.page,
            PeerMessage::PcState { position, rotation } => {
                self.props.insert(Prop::Pc, placement(position, rotation));
            }
            PeerMessage::RobotState { position, rotation } => {
                self.props.insert(Prop::Robot, placement(position, rotation));
            }
            PeerMessage::Position { .. } | PeerMessage::Shoot { .. } => {}
        }
    }

    fn handle_frame(&mut self, now: Instant, delta: f32, local: Option<PoseSample>) {
        self.views.clear();
        for (peer, avatar) in self.avatars.iter_mut() {
            if let Some(view) = avatar.tick(now, delta) {
                self.views.insert(peer.clone(), view);
            }
        }
        if let Some(sample) = local {
            if let Err(e) = self.broadcaster.broadcast_pose(now, &sample, &self.registry) {
                warn!("[Session] Failed to encode local pose: {}", e);
            }
        }
    }

    fn handle_local(&mut self, msg: PeerMessage, now: Instant) {
        self.apply_shared(&msg);
        let result = match prop_of(&msg) {
            Some(prop) => self
                .prop_broadcasters
                .entry(prop)
                .or_default()
                .broadcast_state(now, &msg, &self.registry)
                .map(|_| ()),
            None if msg.is_throttled() => self
                .broadcaster
                .broadcast_state(now, &msg, &self.registry)
                .map(|_| ()),
            None => self.broadcaster.broadcast_event(&msg, &self.registry).map(|_| ()),
        };
        if let Err(e) = result {
            warn!("[Session] Failed to send local {}: {}", msg.kind(), e);
        }
    }

    fn handle_signaling_error(&mut self, kind: SignalingErrorKind) -> Control {
        warn!("[Session] Signaling error: {:?}", kind);
        match self.reconnector.on_error(&kind) {
            decision @ (ReconnectDecision::ReconnectNow | ReconnectDecision::RetryAfter { .. }) => {
                Control::Retry(decision)
            }
            ReconnectDecision::GiveUp(message) | ReconnectDecision::Surface(message) => {
                self.error = Some(message);
                Control::Continue
            }
        }
    }

    fn remove_peer(&mut self, peer: &str, event: ConnectionEvent) {
        if self.registry.remove(peer, event).is_some() {
            self.avatars.remove(peer);
            self.views.remove(peer);
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

fn prop_of(msg: &PeerMessage) -> Option<Prop> {
    match msg {
        PeerMessage::PcState { .. } => Some(Prop::Pc),
        PeerMessage::RobotState { .. } => Some(Prop::Robot),
        _ => None,
    }
}

fn placement(position: &[f32; 3], rotation: &[f32; 3]) -> PropPlacement {
    PropPlacement {
        position: Vec3::from_array(*position),
        rotation: Vec3::from_array(*rotation),
    }
}

/// Owns the session context and drives it from the event stream.
pub struct SessionController {
    ctx: SessionContext,
    signaling: Option<mpsc::UnboundedSender<ReconnectDecision>>,
}

impl SessionController {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx, signaling: None }
    }

    /// Reconnect decisions are forwarded to whoever owns the signaling link.
    pub fn with_signaling(mut self, tx: mpsc::UnboundedSender<ReconnectDecision>) -> Self {
        self.signaling = Some(tx);
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.ctx
    }

    /// Handles one event.
    pub fn dispatch(&mut self, event: SessionEvent) -> Control {
        let ctx = &mut self.ctx;
        match event {
            SessionEvent::SignalingOpen(id) => {
                info!("[Session] Connected with id {}", id);
                ctx.local_id = Some(id);
                ctx.error = None;
                ctx.reconnector.on_open();
            }
            SessionEvent::SignalingError(kind) => return ctx.handle_signaling_error(kind),
            SessionEvent::Connected(link) => {
                let peer = link.peer_id().to_string();
                if ctx.registry.insert_pending(link).is_some() {
                    debug!("[Session] {} reconnected, previous link dropped", peer);
                }
            }
            SessionEvent::Opened(peer) => {
                if let Err(e) = ctx.registry.mark_open(&peer) {
                    warn!("[Session] Cannot open {}: {}", peer, e);
                }
            }
            SessionEvent::Data { peer, text, at } => ctx.handle_data(&peer, &text, at),
            SessionEvent::Closed(peer) => ctx.remove_peer(&peer, ConnectionEvent::Closed),
            SessionEvent::Errored { peer, reason } => {
                warn!("[Session] Connection error with {}: {}", peer, reason);
                ctx.remove_peer(&peer, ConnectionEvent::Errored(reason));
            }
            SessionEvent::CallAttached { peer, mut call } => {
                if ctx.registry.get(&peer).is_none() {
                    warn!("[Session] Dropping call from unknown peer {}", peer);
                    call.close();
                } else if let Err(e) = ctx.registry.attach_call(&peer, call) {
                    warn!("[Session] Dropping call: {}", e);
                }
            }
            SessionEvent::Frame { now, delta, local } => ctx.handle_frame(now, delta, local),
            SessionEvent::Local { msg, now } => ctx.handle_local(msg, now),
            SessionEvent::Shutdown => return Control::Stop,
        }
        Control::Continue
    }

    /// Drains `rx` until shutdown or until every sender is gone, then tears
    /// the context down and hands it back.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionEvent>) -> SessionContext {
        while let Some(event) = rx.recv().await {
            match self.dispatch(event) {
                Control::Continue => {}
                Control::Retry(decision) => {
                    if let Some(tx) = &self.signaling {
                        if tx.send(decision).is_err() {
                            debug!("[Session] Signaling driver gone, reconnect skipped");
                        }
                    }
                }
                Control::Stop => break,
            }
        }
        self.ctx.teardown();
        self.ctx
    }
}
