//! Peer connection lifecycle and the active connection set.
//!
//! A connection moves `Connecting -> Open -> (Closed | Errored)`. Only open
//! connections receive broadcasts. Removal happens once; a `close` that
//! follows an `error` for the same peer finds nothing left to remove.

use std::collections::HashMap;

use log::{debug, info};

use super::error::{SyncError, SyncResult};

pub type PeerId = String;

/// A bidirectional channel to one remote peer.
pub trait PeerLink {
    fn peer_id(&self) -> &str;
    /// Whether the underlying channel currently accepts sends.
    fn is_open(&self) -> bool;
    fn send(&self, text: &str) -> SyncResult<()>;
}

impl<T: PeerLink + ?Sized> PeerLink for Box<T> {
    fn peer_id(&self) -> &str {
        (**self).peer_id()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn send(&self, text: &str) -> SyncResult<()> {
        (**self).send(text)
    }
}

/// An audio call riding alongside a data connection.
pub trait CallHandle {
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    Closed,
    Errored(String),
}

impl ConnectionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Opened => "open",
            Self::Closed => "close",
            Self::Errored(_) => "error",
        }
    }
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Errored(_) => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored(_))
    }

    /// Next state after `event`, or an error if the event is not valid here.
    pub fn transition(&self, peer: &str, event: ConnectionEvent) -> SyncResult<ConnectionState> {
        match (self, event) {
            (Self::Connecting, ConnectionEvent::Opened) => Ok(Self::Open),
            (Self::Connecting | Self::Open, ConnectionEvent::Closed) => Ok(Self::Closed),
            (Self::Connecting | Self::Open, ConnectionEvent::Errored(reason)) => Ok(Self::Errored(reason)),
            (from, event) => Err(SyncError::InvalidTransition {
                peer: peer.to_string(),
                from: from.name(),
                event: event.name(),
            }),
        }
    }
}

struct Entry<L> {
    link: L,
    state: ConnectionState,
}

/// Connections known to one session, keyed by peer id.
pub struct ConnectionRegistry<L> {
    entries: HashMap<PeerId, Entry<L>>,
    calls: HashMap<PeerId, Box<dyn CallHandle + Send>>,
}

impl<L: PeerLink> ConnectionRegistry<L> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            calls: HashMap::new(),
        }
    }

    /// Tracks a connection that is still handshaking.
    ///
    /// A previous connection under the same peer id is dropped from the set
    /// (and its call closed) and handed back to the caller.
    pub fn insert_pending(&mut self, link: L) -> Option<L> {
        let peer = link.peer_id().to_string();
        let previous = self.remove(&peer, ConnectionEvent::Closed);
        debug!("[Connections] {} connecting", peer);
        self.entries.insert(peer, Entry {
            link,
            state: ConnectionState::Connecting,
        });
        previous
    }

    /// Moves a connecting peer into the active set.
    pub fn mark_open(&mut self, peer: &str) -> SyncResult<()> {
        let entry = self
            .entries
            .get_mut(peer)
            .ok_or_else(|| SyncError::PeerNotFound(peer.to_string()))?;
        entry.state = entry.state.transition(peer, ConnectionEvent::Opened)?;
        info!("[Connections] {} open ({} open)", peer, self.open_count());
        Ok(())
    }

    /// Removes a peer from the set and tears down its call.
    ///
    /// Returns the link the first time only.
    pub fn remove(&mut self, peer: &str, event: ConnectionEvent) -> Option<L> {
        let entry = self.entries.remove(peer)?;
        if let Some(mut call) = self.calls.remove(peer) {
            call.close();
        }
        let final_state = entry
            .state
            .transition(peer, event)
            .unwrap_or(ConnectionState::Closed);
        info!("[Connections] {} removed ({})", peer, final_state.name());
        Some(entry.link)
    }

    /// Attaches an audio call to a known peer, closing any call it replaces.
    pub fn attach_call(&mut self, peer: &str, call: Box<dyn CallHandle + Send>) -> SyncResult<()> {
        if !self.entries.contains_key(peer) {
            return Err(SyncError::PeerNotFound(peer.to_string()));
        }
        if let Some(mut old) = self.calls.insert(peer.to_string(), call) {
            old.close();
        }
        Ok(())
    }

    pub fn has_call(&self, peer: &str) -> bool {
        self.calls.contains_key(peer)
    }

    pub fn get(&self, peer: &str) -> Option<&L> {
        self.entries.get(peer).map(|e| &e.link)
    }

    pub fn state(&self, peer: &str) -> Option<&ConnectionState> {
        self.entries.get(peer).map(|e| &e.state)
    }

    pub fn is_open(&self, peer: &str) -> bool {
        self.entries
            .get(peer)
            .is_some_and(|e| e.state == ConnectionState::Open && e.link.is_open())
    }

    /// Links that are open both in our state machine and on the wire.
    pub fn open_links(&self) -> impl Iterator<Item = &L> {
        self.entries
            .values()
            .filter(|e| e.state == ConnectionState::Open && e.link.is_open())
            .map(|e| &e.link)
    }

    pub fn open_count(&self) -> usize {
        self.open_links().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.entries.keys().cloned().collect()
    }

    /// Closes every call and empties the set.
    pub fn clear(&mut self) -> Vec<L> {
        for (_, mut call) in self.calls.drain() {
            call.close();
        }
        self.entries.drain().map(|(_, e)| e.link).collect()
    }
}

impl<L: PeerLink> Default for ConnectionRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory link recording everything sent through it.
    #[derive(Clone)]
    pub(crate) struct MemoryLink {
        pub id: String,
        pub open: Arc<AtomicBool>,
        pub fail: Arc<AtomicBool>,
        pub sent: Arc<Mutex<Vec<String>>>,
    }

    impl MemoryLink {
        pub fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                open: Arc::new(AtomicBool::new(true)),
                fail: Arc::new(AtomicBool::new(false)),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl PeerLink for MemoryLink {
        fn peer_id(&self) -> &str {
            &self.id
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send(&self, text: &str) -> SyncResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::SendFailed(self.id.clone()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    pub(crate) struct CountingCall(pub Arc<AtomicUsize>);

    impl CallHandle for CountingCall {
        fn close(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn state_machine_follows_lifecycle() {
        let s = ConnectionState::Connecting;
        let s = s.transition("a", ConnectionEvent::Opened).unwrap();
        assert_eq!(s, ConnectionState::Open);
        let s = s.transition("a", ConnectionEvent::Errored("ice".into())).unwrap();
        assert!(s.is_terminal());
        assert!(s.transition("a", ConnectionEvent::Closed).is_err());
    }

    #[test]
    fn cannot_open_twice() {
        assert!(ConnectionState::Open.transition("a", ConnectionEvent::Opened).is_err());
    }

    #[test]
    fn pending_connections_are_not_broadcast_targets() {
        let mut registry = ConnectionRegistry::new();
        registry.insert_pending(MemoryLink::new("a"));
        registry.insert_pending(MemoryLink::new("b"));
        registry.mark_open("b").unwrap();

        let open: Vec<&str> = registry.open_links().map(|l| l.peer_id()).collect();
        assert_eq!(open, vec!["b"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn removal_happens_once_and_closes_call() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectionRegistry::new();
        registry.insert_pending(MemoryLink::new("a"));
        registry.mark_open("a").unwrap();
        registry.attach_call("a", Box::new(CountingCall(closed.clone()))).unwrap();

        assert!(registry.remove("a", ConnectionEvent::Errored("reset".into())).is_some());
        assert!(registry.remove("a", ConnectionEvent::Closed).is_none());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!registry.has_call("a"));
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn link_closed_on_the_wire_is_skipped() {
        let link = MemoryLink::new("a");
        let mut registry = ConnectionRegistry::new();
        registry.insert_pending(link.clone());
        registry.mark_open("a").unwrap();
        link.open.store(false, Ordering::SeqCst);
        assert_eq!(registry.open_count(), 0);
        assert!(!registry.is_open("a"));
    }

    #[test]
    fn reconnecting_peer_replaces_old_link() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectionRegistry::new();
        registry.insert_pending(MemoryLink::new("a"));
        registry.mark_open("a").unwrap();
        registry.attach_call("a", Box::new(CountingCall(closed.clone()))).unwrap();

        let old = registry.insert_pending(MemoryLink::new("a"));
        assert!(old.is_some());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("a"), Some(&ConnectionState::Connecting));
    }

    #[test]
    fn call_for_unknown_peer_is_rejected() {
        let mut registry: ConnectionRegistry<MemoryLink> = ConnectionRegistry::new();
        let closed = Arc::new(AtomicUsize::new(0));
        assert!(registry.attach_call("ghost", Box::new(CountingCall(closed))).is_err());
    }

    #[test]
    fn clear_closes_every_call() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectionRegistry::new();
        for id in ["a", "b"] {
            registry.insert_pending(MemoryLink::new(id));
            registry.mark_open(id).unwrap();
            registry.attach_call(id, Box::new(CountingCall(closed.clone()))).unwrap();
        }
        assert_eq!(registry.clear().len(), 2);
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }
}
