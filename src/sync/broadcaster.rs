//! Fan-out of local state to every open peer.

use std::time::Instant;

use log::debug;

use super::connection::{ConnectionRegistry, PeerLink};
use super::error::SyncResult;
use super::messages::PeerMessage;
use super::pose::PoseSample;
use super::throttle::SendThrottle;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOut {
    pub sent: usize,
    pub dropped: usize,
}

/// Sends the local pose at a bounded rate.
///
/// Sends are fire-and-forget: a failed send is counted and logged, never
/// retried, and the next tick carries a fresher pose anyway.
#[derive(Debug, Clone, Default)]
pub struct PoseBroadcaster {
    throttle: SendThrottle,
}

impl PoseBroadcaster {
    pub fn new(throttle: SendThrottle) -> Self {
        Self { throttle }
    }

    /// Broadcasts `sample` unless the previous broadcast is too recent.
    ///
    /// Returns `None` when the tick was throttled. An empty set still
    /// consumes the window, matching a tick that had nobody to talk to.
    pub fn broadcast_pose<L: PeerLink>(
        &mut self,
        now: Instant,
        sample: &PoseSample,
        registry: &ConnectionRegistry<L>,
    ) -> SyncResult<Option<FanOut>> {
        if !self.throttle.try_acquire(now) {
            return Ok(None);
        }
        let text = PeerMessage::position(sample).encode()?;
        Ok(Some(fan_out(&text, registry)))
    }

    /// Broadcasts a throttled state message (prop placement) on the same window as poses.
    pub fn broadcast_state<L: PeerLink>(
        &mut self,
        now: Instant,
        msg: &PeerMessage,
        registry: &ConnectionRegistry<L>,
    ) -> SyncResult<Option<FanOut>> {
        if !self.throttle.try_acquire(now) {
            return Ok(None);
        }
        let text = msg.encode()?;
        Ok(Some(fan_out(&text, registry)))
    }

    /// Sends a discrete event (shot, screen toggle, page change) immediately.
    pub fn broadcast_event<L: PeerLink>(
        &self,
        msg: &PeerMessage,
        registry: &ConnectionRegistry<L>,
    ) -> SyncResult<FanOut> {
        let text = msg.encode()?;
        Ok(fan_out(&text, registry))
    }
}

fn fan_out<L: PeerLink>(text: &str, registry: &ConnectionRegistry<L>) -> FanOut {
    let mut result = FanOut::default();
    for link in registry.open_links() {
        match link.send(text) {
            Ok(()) => result.sent += 1,
            Err(e) => {
                debug!("[Broadcast] Dropped message to {}: {}", link.peer_id(), e);
                result.dropped += 1;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::connection::ConnectionEvent;
    use crate::sync::connection::tests::MemoryLink;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn registry_with(ids: &[&str]) -> (ConnectionRegistry<MemoryLink>, Vec<MemoryLink>) {
        let mut registry = ConnectionRegistry::new();
        let mut links = Vec::new();
        for id in ids {
            let link = MemoryLink::new(id);
            registry.insert_pending(link.clone());
            registry.mark_open(id).unwrap();
            links.push(link);
        }
        (registry, links)
    }

    #[test]
    fn sends_to_every_open_peer() {
        let (registry, links) = registry_with(&["a", "b", "c"]);
        let mut broadcaster = PoseBroadcaster::default();
        let out = broadcaster
            .broadcast_pose(Instant::now(), &PoseSample::default(), &registry)
            .unwrap()
            .unwrap();
        assert_eq!(out, FanOut { sent: 3, dropped: 0 });
        assert!(links.iter().all(|l| l.sent_count() == 1));
        assert!(links[0].sent()[0].contains(r#""type":"position""#));
    }

    #[test]
    fn throttles_render_ticks() {
        let (registry, links) = registry_with(&["a"]);
        let mut broadcaster = PoseBroadcaster::default();
        let start = Instant::now();
        for ms in [0u64, 10, 20, 30, 40, 50, 60, 99, 100] {
            broadcaster
                .broadcast_pose(start + Duration::from_millis(ms), &PoseSample::default(), &registry)
                .unwrap();
        }
        // Sends at 0, 50 and 100.
        assert_eq!(links[0].sent_count(), 3);
    }

    #[test]
    fn failed_send_is_dropped_not_retried() {
        let (registry, links) = registry_with(&["a", "b"]);
        links[0].fail.store(true, Ordering::SeqCst);
        let mut broadcaster = PoseBroadcaster::default();
        let start = Instant::now();

        let out = broadcaster.broadcast_pose(start, &PoseSample::default(), &registry).unwrap();
        assert_eq!(out, Some(FanOut { sent: 1, dropped: 1 }));

        links[0].fail.store(false, Ordering::SeqCst);
        broadcaster
            .broadcast_pose(start + Duration::from_millis(50), &PoseSample::default(), &registry)
            .unwrap();
        assert_eq!(links[0].sent_count(), 1);
        assert_eq!(links[1].sent_count(), 2);
    }

    #[test]
    fn removed_peer_receives_nothing() {
        let (mut registry, links) = registry_with(&["a", "b"]);
        registry.remove("a", ConnectionEvent::Closed);
        let broadcaster = PoseBroadcaster::default();
        let shot = PeerMessage::Shoot {
            bullet_id: 1,
            position: [0.0, 1.5, 0.0],
            direction: [0.0, 0.0, -1.0],
        };
        let out = broadcaster.broadcast_event(&shot, &registry).unwrap();
        assert_eq!(out.sent, 1);
        assert_eq!(links[0].sent_count(), 0);
    }

    #[test]
    fn events_bypass_the_throttle() {
        let (registry, links) = registry_with(&["a"]);
        let mut broadcaster = PoseBroadcaster::default();
        broadcaster
            .broadcast_pose(Instant::now(), &PoseSample::default(), &registry)
            .unwrap();
        let page = PeerMessage::PageChange {
            data: crate::sync::messages::PageChangeData { page: 1 },
        };
        broadcaster.broadcast_event(&page, &registry).unwrap();
        assert_eq!(links[0].sent_count(), 2);
    }
}
