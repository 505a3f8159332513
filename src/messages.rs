// Request and reply payloads exchanged with the transport layer
//
// Request fields are kept as raw integers (or absent) so the dispatcher can
// tell "out of range" apart from "missing" and report the right error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ControlError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ServoState {
    pub id: u8,
    pub angle: u16,
    pub min: u16,
    pub max: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServoList {
    pub servos: Vec<ServoState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetServoRequest {
    pub id: Option<i64>,
    pub angle: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetServoReply {
    pub success: bool,
    pub id: u8,
    pub angle: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrateServoRequest {
    pub id: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrateServoReply {
    pub success: bool,
    pub id: u8,
    pub min: u16,
    pub max: u16,
}

/// Speed of every motor, keyed by motor name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorSpeeds {
    pub success: bool,
    #[serde(flatten)]
    pub speeds: BTreeMap<String, i16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopReply {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisState {
    /// Last pulse written to the axis
    pub pulse: u16,
    /// Center (positional) or neutral/stop (continuous rotation) pulse
    pub center: u16,
    pub min: u16,
    pub max: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraState {
    pub success: bool,
    pub mode: String,
    pub pan_pwm: u16,
    pub tilt_pwm: u16,
    pub pan: AxisState,
    pub tilt: AxisState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraPwmRequest {
    pub pan_pwm: Option<i64>,
    pub tilt_pwm: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraStepRequest {
    pub pan_delta: Option<i64>,
    pub tilt_delta: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraCenterRequest {
    pub pan_center: Option<i64>,
    pub tilt_center: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraLimitsRequest {
    pub pan_min: Option<i64>,
    pub pan_max: Option<i64>,
    pub tilt_min: Option<i64>,
    pub tilt_max: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraPulseRequest {
    pub pan_pwm: Option<i64>,
    pub tilt_pwm: Option<i64>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReply {
    pub status: String,
    pub servos_count: usize,
    pub motors_count: usize,
    pub camera_mode: String,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirmwareReply {
    pub success: bool,
    pub message: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReply {
    pub success: bool,
    pub error: ErrorBody,
}

impl From<&ControlError> for ErrorReply {
    fn from(err: &ControlError) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }
}
