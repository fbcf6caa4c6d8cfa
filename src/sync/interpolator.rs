//! Smoothing of remote avatars toward their latest pose sample.
//!
//! Each render tick the displayed transform moves a fraction of the way to
//! the target: `lerp` for positions, `slerp` for rotations. The fraction
//! depends only on the frame delta, so smoothness does not depend on how
//! often samples arrive. There is no extrapolation; a stale target is held.

use std::time::{Duration, Instant};

use glam::Vec3;

use super::pose::{Controllers, Hand, PoseSample, Transform};
use crate::config::sync::{BLEND_RATE, LIVENESS_TIMEOUT_MS};

/// Fraction of the remaining distance covered in `delta` seconds.
///
/// Always in `[0, 1)`: the displayed value approaches the target but a
/// single finite tick never lands on it or past it.
pub fn blend_factor(delta: f32, rate: f32) -> f32 {
    if !(delta > 0.0) || !(rate > 0.0) {
        return 0.0;
    }
    let t = 1.0 - (-rate * delta).exp();
    t.clamp(0.0, 1.0 - f32::EPSILON)
}

/// Displayed state of one remote avatar for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarView {
    pub head: Transform,
    /// Aim transforms, positions relative to the avatar root.
    pub left: Option<Transform>,
    pub right: Option<Transform>,
}

impl AvatarView {
    pub fn controller(&self, hand: Hand) -> Option<&Transform> {
        match hand {
            Hand::Left => self.left.as_ref(),
            Hand::Right => self.right.as_ref(),
        }
    }
}

/// Latest sample and smoothed state for one remote peer.
#[derive(Debug, Clone)]
pub struct RemoteAvatar {
    target: Option<PoseSample>,
    head: Transform,
    left: Transform,
    right: Transform,
    last_update: Option<Instant>,
    visible: bool,
    rate: f32,
    timeout: Duration,
}

impl RemoteAvatar {
    pub fn new() -> Self {
        Self::with_params(BLEND_RATE, Duration::from_millis(LIVENESS_TIMEOUT_MS))
    }

    pub fn with_params(rate: f32, timeout: Duration) -> Self {
        Self {
            target: None,
            head: Transform::IDENTITY,
            left: Transform::IDENTITY,
            right: Transform::IDENTITY,
            last_update: None,
            visible: false,
            rate,
            timeout,
        }
    }

    /// Stores `sample` as the new target.
    ///
    /// The very first sample is shown as-is; there is nothing to blend from.
    pub fn receive(&mut self, sample: PoseSample, now: Instant) {
        if self.target.is_none() {
            self.head = sample.head();
            for hand in Hand::ALL {
                if let Some(target) = relative_aim(&sample, hand) {
                    *self.slot_mut(hand) = target;
                }
            }
        }
        self.target = Some(sample);
        self.last_update = Some(now);
        self.visible = true;
    }

    /// Advances smoothing by `delta` seconds.
    ///
    /// Returns `None` while the avatar is hidden: before its first sample or
    /// once no sample has arrived for the liveness timeout.
    pub fn tick(&mut self, now: Instant, delta: f32) -> Option<AvatarView> {
        let (Some(target), Some(last)) = (self.target, self.last_update) else {
            return None;
        };
        if now.saturating_duration_since(last) >= self.timeout {
            self.visible = false;
            return None;
        }
        self.visible = true;

        let t = blend_factor(delta, self.rate);
        self.head = blend(self.head, target.head(), t);
        for hand in Hand::ALL {
            if let Some(aim) = relative_aim(&target, hand) {
                let slot = self.slot_mut(hand);
                *slot = blend(*slot, aim, t);
            }
        }
        Some(self.view(&target.controllers))
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn target(&self) -> Option<&PoseSample> {
        self.target.as_ref()
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Currently displayed head transform.
    pub fn displayed_head(&self) -> Transform {
        self.head
    }

    fn view(&self, controllers: &Controllers) -> AvatarView {
        AvatarView {
            head: self.head,
            left: controllers.left.map(|_| self.left),
            right: controllers.right.map(|_| self.right),
        }
    }

    fn slot_mut(&mut self, hand: Hand) -> &mut Transform {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }
}

impl Default for RemoteAvatar {
    fn default() -> Self {
        Self::new()
    }
}

fn relative_aim(sample: &PoseSample, hand: Hand) -> Option<Transform> {
    sample.controllers.get(hand).map(|c| {
        Transform::new(c.aim.position - sample.position, c.aim.rotation)
    })
}

fn blend(from: Transform, to: Transform, t: f32) -> Transform {
    Transform::new(lerp(from.position, to.position, t), from.rotation.slerp(to.rotation, t))
}

fn lerp(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    from + (to - from) * t
}
