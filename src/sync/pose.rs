//! Pose types for the local user and remote avatars.
//!
//! A pose sample is what one peer broadcasts per tick: the avatar root
//! position, the head orientation and, when tracked, the aim and grip
//! transforms of each hand controller.

use glam::{Quat, Vec3, Vec4};

use super::error::{SyncError, SyncResult};
use super::messages::{ControllerData, ControllersData, PositionData};

/// Position and orientation of one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];
}

/// Aim (pointer ray) and grip (held object) transforms of a hand controller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerPose {
    pub aim: Transform,
    pub grip: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Controllers {
    pub left: Option<ControllerPose>,
    pub right: Option<ControllerPose>,
}

impl Controllers {
    pub fn get(&self, hand: Hand) -> Option<&ControllerPose> {
        match hand {
            Hand::Left => self.left.as_ref(),
            Hand::Right => self.right.as_ref(),
        }
    }

    pub fn set(&mut self, hand: Hand, pose: ControllerPose) {
        match hand {
            Hand::Left => self.left = Some(pose),
            Hand::Right => self.right = Some(pose),
        }
    }
}

/// One pose broadcast by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseSample {
    /// Avatar root position.
    pub position: Vec3,
    /// Head orientation.
    pub rotation: Quat,
    pub controllers: Controllers,
}

impl PoseSample {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            controllers: Controllers::default(),
        }
    }

    pub fn with_controller(mut self, hand: Hand, pose: ControllerPose) -> Self {
        self.controllers.set(hand, pose);
        self
    }

    pub fn head(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    /// Wire form of this sample, as carried by a `position` message.
    pub fn to_wire(&self) -> PositionData {
        PositionData {
            position: self.position.to_array(),
            rotation: self.rotation.to_array(),
            controllers: ControllersData {
                left: self.controllers.left.as_ref().map(controller_to_wire),
                right: self.controllers.right.as_ref().map(controller_to_wire),
            },
        }
    }

    /// Validates a wire payload and builds a sample from it.
    ///
    /// Every component must be finite and rotations must have a non-zero
    /// length; they are renormalized so later slerps stay well defined.
    pub fn from_wire(data: &PositionData) -> SyncResult<Self> {
        let controllers = Controllers {
            left: data.controllers.left.as_ref().map(controller_from_wire).transpose()?,
            right: data.controllers.right.as_ref().map(controller_from_wire).transpose()?,
        };
        Ok(Self {
            position: vec3(data.position, "position")?,
            rotation: unit_quat(data.rotation, "rotation")?,
            controllers,
        })
    }
}

fn controller_to_wire(pose: &ControllerPose) -> ControllerData {
    ControllerData {
        position: pose.aim.position.to_array(),
        rotation: pose.aim.rotation.to_array(),
        grip_position: pose.grip.position.to_array(),
        grip_rotation: pose.grip.rotation.to_array(),
    }
}

fn controller_from_wire(data: &ControllerData) -> SyncResult<ControllerPose> {
    Ok(ControllerPose {
        aim: Transform::new(
            vec3(data.position, "controller position")?,
            unit_quat(data.rotation, "controller rotation")?,
        ),
        grip: Transform::new(
            vec3(data.grip_position, "grip position")?,
            unit_quat(data.grip_rotation, "grip rotation")?,
        ),
    })
}

pub(crate) fn vec3(raw: [f32; 3], field: &str) -> SyncResult<Vec3> {
    let v = Vec3::from_array(raw);
    if !v.is_finite() {
        return Err(SyncError::InvalidPayload(format!("{} is not finite", field)));
    }
    Ok(v)
}

pub(crate) fn unit_quat(raw: [f32; 4], field: &str) -> SyncResult<Quat> {
    let v = Vec4::from_array(raw);
    if !v.is_finite() {
        return Err(SyncError::InvalidPayload(format!("{} is not finite", field)));
    }
    // None for zero length and for components whose length overflows f32.
    let unit = v
        .try_normalize()
        .ok_or_else(|| SyncError::InvalidPayload(format!("{} cannot be normalized", field)))?;
    Ok(Quat::from_vec4(unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_survives_wire_form() {
        let grip = Transform::new(Vec3::new(0.2, 1.0, -0.3), Quat::from_rotation_y(0.5));
        let aim = Transform::new(Vec3::new(0.25, 1.05, -0.35), Quat::from_rotation_x(-0.3));
        let sample = PoseSample::new(Vec3::new(1.0, 1.6, 2.0), Quat::from_rotation_y(1.0))
            .with_controller(Hand::Right, ControllerPose { aim, grip });

        let back = PoseSample::from_wire(&sample.to_wire()).unwrap();
        assert!(back.position.abs_diff_eq(sample.position, 1e-6));
        assert!(back.rotation.abs_diff_eq(sample.rotation, 1e-6));
        assert!(back.controllers.left.is_none());
        let right = back.controllers.right.unwrap();
        assert!(right.grip.position.abs_diff_eq(grip.position, 1e-6));
    }

    #[test]
    fn rotation_is_renormalized() {
        let q = unit_quat([0.0, 0.0, 0.0, 2.0], "rotation").unwrap();
        assert!((q.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_rotation_is_rejected() {
        assert!(unit_quat([0.0; 4], "rotation").is_err());
    }

    #[test]
    fn overflowing_rotation_is_rejected() {
        assert!(unit_quat([1e30; 4], "rotation").is_err());
        let q = unit_quat([1e18, 0.0, 0.0, 0.0], "rotation").unwrap();
        assert!((q.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_finite_position_is_rejected() {
        assert!(vec3([0.0, f32::NAN, 0.0], "position").is_err());
        assert!(vec3([f32::INFINITY, 0.0, 0.0], "position").is_err());
    }
}
