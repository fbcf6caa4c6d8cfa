//! Peer data-channel messages.
//!
//! Every payload exchanged between peers is one `PeerMessage`, tagged by its
//! `type` field. Unknown types fail to decode instead of being passed on.

use serde::{Deserialize, Serialize};

use super::error::{SyncError, SyncResult};
use super::pose::{vec3, PoseSample};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PositionData {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    #[serde(default)]
    pub controllers: ControllersData,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ControllersData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<ControllerData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<ControllerData>,
}

/// Aim transform in `position`/`rotation`, grip transform alongside.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerData {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub grip_position: [f32; 3],
    pub grip_rotation: [f32; 4],
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenStateData {
    pub show_content: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PageChangeData {
    pub page: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PeerMessage {
    Position {
        data: PositionData,
    },
    Shoot {
        #[serde(rename = "bulletId")]
        bullet_id: u64,
        position: [f32; 3],
        direction: [f32; 3],
    },
    ScreenState {
        data: ScreenStateData,
    },
    PageChange {
        data: PageChangeData,
    },
    /// Placement of the shared PC prop; rotation is Euler XYZ in radians.
    PcState {
        position: [f32; 3],
        rotation: [f32; 3],
    },
    /// Placement of the shared robot prop; rotation is Euler XYZ in radians.
    RobotState {
        position: [f32; 3],
        rotation: [f32; 3],
    },
}

impl PeerMessage {
    pub fn position(sample: &PoseSample) -> Self {
        Self::Position { data: sample.to_wire() }
    }

    /// Parses and validates one incoming payload.
    pub fn decode(text: &str) -> SyncResult<Self> {
        let msg: PeerMessage = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }

    pub fn encode(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Position { .. } => "position",
            Self::Shoot { .. } => "shoot",
            Self::ScreenState { .. } => "screen-state",
            Self::PageChange { .. } => "page-change",
            Self::PcState { .. } => "pc-state",
            Self::RobotState { .. } => "robot-state",
        }
    }

    /// True for the continuous state stream that is sent at most once per send interval.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            Self::Position { .. } | Self::PcState { .. } | Self::RobotState { .. }
        )
    }

    fn validate(&self) -> SyncResult<()> {
        match self {
            Self::Position { data } => {
                PoseSample::from_wire(data)?;
            }
            Self::Shoot { position, direction, .. } => {
                vec3(*position, "position")?;
                if vec3(*direction, "direction")?.try_normalize().is_none() {
                    return Err(SyncError::InvalidPayload("direction cannot be normalized".into()));
                }
            }
            Self::PcState { position, rotation } | Self::RobotState { position, rotation } => {
                vec3(*position, "position")?;
                vec3(*rotation, "rotation")?;
            }
            Self::ScreenState { .. } | Self::PageChange { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_position_with_one_controller() {
        let text = json!({
            "type": "position",
            "data": {
                "position": [0.0, 1.6, 0.0],
                "rotation": [0.0, 0.0, 0.0, 1.0],
                "controllers": {
                    "left": {
                        "position": [-0.2, 1.2, -0.3],
                        "rotation": [0.0, 0.0, 0.0, 1.0],
                        "gripPosition": [-0.2, 1.1, -0.3],
                        "gripRotation": [0.0, 0.0, 0.0, 1.0]
                    }
                }
            }
        })
        .to_string();

        match PeerMessage::decode(&text).unwrap() {
            PeerMessage::Position { data } => {
                assert_eq!(data.position, [0.0, 1.6, 0.0]);
                assert!(data.controllers.left.is_some());
                assert!(data.controllers.right.is_none());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn position_without_controllers_is_accepted() {
        let text = r#"{"type":"position","data":{"position":[1,2,3],"rotation":[0,0,0,1]}}"#;
        assert!(PeerMessage::decode(text).is_ok());
    }

    #[test]
    fn decodes_shoot_with_camel_case_id() {
        let text = r#"{"type":"shoot","bulletId":7,"position":[0,1,0],"direction":[0,0,-1]}"#;
        let msg = PeerMessage::decode(text).unwrap();
        assert_eq!(
            msg,
            PeerMessage::Shoot {
                bullet_id: 7,
                position: [0.0, 1.0, 0.0],
                direction: [0.0, 0.0, -1.0],
            }
        );
        assert!(!msg.is_throttled());
    }

    #[test]
    fn decodes_screen_messages() {
        let screen = PeerMessage::decode(r#"{"type":"screen-state","data":{"showContent":true}}"#).unwrap();
        assert_eq!(screen.kind(), "screen-state");
        let page = PeerMessage::decode(r#"{"type":"page-change","data":{"page":2}}"#).unwrap();
        assert_eq!(page, PeerMessage::PageChange { data: PageChangeData { page: 2 } });
    }

    #[test]
    fn prop_state_is_throttled() {
        let msg = PeerMessage::decode(r#"{"type":"pc-state","position":[3,0.95,-3],"rotation":[0,-0.785,0]}"#).unwrap();
        assert!(msg.is_throttled());
    }

    #[test]
    fn rejects_unknown_type() {
        let err = PeerMessage::decode(r#"{"type":"teleport","data":{}}"#).unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(PeerMessage::decode(r#"{"data":{"page":1}}"#).is_err());
    }

    #[test]
    fn rejects_zero_rotation() {
        let text = r#"{"type":"position","data":{"position":[0,0,0],"rotation":[0,0,0,0]}}"#;
        assert!(matches!(PeerMessage::decode(text), Err(SyncError::InvalidPayload(_))));
    }

    #[test]
    fn rejects_zero_shot_direction() {
        let text = r#"{"type":"shoot","bulletId":1,"position":[0,0,0],"direction":[0,0,0]}"#;
        assert!(PeerMessage::decode(text).is_err());
    }

    #[test]
    fn rejects_components_whose_length_overflows() {
        let rotation = r#"{"type":"position","data":{"position":[0,0,0],"rotation":[1e30,1e30,1e30,1e30]}}"#;
        assert!(matches!(PeerMessage::decode(rotation), Err(SyncError::InvalidPayload(_))));
        let shot = r#"{"type":"shoot","bulletId":2,"position":[0,1,0],"direction":[1e30,1e30,1e30]}"#;
        assert!(matches!(PeerMessage::decode(shot), Err(SyncError::InvalidPayload(_))));
    }

    #[test]
    fn encoded_position_uses_wire_field_names() {
        let sample = PoseSample::default();
        let text = PeerMessage::position(&sample).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "position");
        assert_eq!(value["data"]["rotation"], json!([0.0, 0.0, 0.0, 1.0]));
        assert!(value["data"]["controllers"].get("left").is_none());
    }
}
