// Command errors reported back to the caller
//
// Every variant except Hardware is a caller error: the single command is
// rejected and no state changes.

use crate::hw::HwError;
use crate::ota::OtaError;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Invalid servo ID {0} (must be 0-15)")]
    InvalidServoId(i64),

    #[error("Invalid channel {0}")]
    InvalidChannelId(i64),

    #[error("Invalid angle {0} (must be 0-180)")]
    InvalidAngle(i64),

    #[error("Invalid pulse value {0} (must be 0-4095)")]
    InvalidPulseValue(i64),

    #[error("Invalid range: min {min} must be less than max {max}")]
    InvalidRange { min: i64, max: i64 },

    #[error("Invalid {motor} speed {speed} (must be -255 to 255)")]
    InvalidMotorSpeed { motor: String, speed: i64 },

    #[error("No data provided")]
    NoInputData,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Command '{0}' is not supported by the configured camera mode")]
    UnsupportedInMode(&'static str),

    #[error("Unknown route '{0}'")]
    UnknownRoute(String),

    #[error("Firmware update failed: {0}")]
    Firmware(#[from] OtaError),

    #[error("Hardware write failed: {0}")]
    Hardware(#[from] HwError),
}

impl ControlError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ControlError::InvalidServoId(_) => "INVALID_SERVO_ID",
            ControlError::InvalidChannelId(_) => "INVALID_CHANNEL_ID",
            ControlError::InvalidAngle(_) => "INVALID_ANGLE",
            ControlError::InvalidPulseValue(_) => "INVALID_PULSE_VALUE",
            ControlError::InvalidRange { .. } => "INVALID_RANGE",
            ControlError::InvalidMotorSpeed { .. } => "INVALID_MOTOR_SPEED",
            ControlError::NoInputData => "NO_INPUT_DATA",
            ControlError::MalformedInput(_) => "MALFORMED_INPUT",
            ControlError::UnsupportedInMode(_) => "UNSUPPORTED_IN_MODE",
            ControlError::UnknownRoute(_) => "UNKNOWN_ROUTE",
            ControlError::Firmware(_) => "FIRMWARE_UPDATE_FAILED",
            ControlError::Hardware(_) => "HARDWARE_ERROR",
        }
    }

    /// Whether the caller sent a bad request (as opposed to a board or disk fault)
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, ControlError::Hardware(_) | ControlError::Firmware(OtaError::Io(_)))
    }
}

impl From<serde_json::Error> for ControlError {
    fn from(e: serde_json::Error) -> Self {
        ControlError::MalformedInput(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;
