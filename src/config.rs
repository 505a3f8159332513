// Board limits, defaults, and the runtime configuration file
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

// Serial port for the actuator board
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUDRATE: u32 = crate::hw::link::DEFAULT_BAUDRATE;

// Zenoh key prefix: <prefix>/api/** (queries), <prefix>/cmd/motor (stream)
pub const DEFAULT_KEY_PREFIX: &str = "rover";

// Servo driver runs at 50 Hz (20 ms period, 4096 steps)
pub const SERVO_PWM_HZ: u16 = 50;

// Absolute pulse ceiling of the PWM driver
pub const PULSE_MAX: u16 = 4095;

// Number of angular actuator channels
pub const SERVO_CHANNELS: usize = 16;

// 102 ~ 500 us, 512 ~ 2500 us at 50 Hz
pub const DEFAULT_SERVO_MIN_PULSE: u16 = 102;
pub const DEFAULT_SERVO_MAX_PULSE: u16 = 512;

// Nominal logical angle domain
pub const ANGLE_DOMAIN_MAX: u16 = 180;

// Signed motor speed limit (duty magnitude)
pub const MOTOR_SPEED_MAX: i16 = 255;

// Camera axis defaults
pub const DEFAULT_CAMERA_CENTER: u16 = 300;
pub const DEFAULT_CAMERA_MIN: u16 = 150;
pub const DEFAULT_CAMERA_MAX: u16 = 450;
pub const DEFAULT_PAN_CHANNEL: u8 = 16;
pub const DEFAULT_TILT_CHANNEL: u8 = 17;

// Camera pulse-mode durations are capped, not rejected
pub const MAX_PULSE_DURATION_MS: u64 = 5000;

// Largest accepted firmware image
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HardwareConfig {
    /// Set to false to run against the simulated board
    pub enabled: bool,
    pub port: String,
    pub baudrate: u32,
    pub pwm_frequency_hz: u16,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            pwm_frequency_hz: SERVO_PWM_HZ,
        }
    }
}

/// Angle a servo is moved to at boot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HomePosition {
    pub channel: u8,
    pub angle: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServoConfig {
    pub default_min_pulse: u16,
    pub default_max_pulse: u16,
    /// Allowed logical angle sub-range, inside 0..=180
    pub angle_min: u16,
    pub angle_max: u16,
    /// Per-channel correction offsets in degrees; missing channels get 0
    pub corrections: Vec<i16>,
    pub home: Vec<HomePosition>,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            default_min_pulse: DEFAULT_SERVO_MIN_PULSE,
            default_max_pulse: DEFAULT_SERVO_MAX_PULSE,
            angle_min: 0,
            angle_max: ANGLE_DOMAIN_MAX,
            corrections: Vec::new(),
            home: Vec::new(),
        }
    }
}

impl ServoConfig {
    pub fn correction(&self, channel: usize) -> i16 {
        self.corrections.get(channel).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Positional servos hold an absolute pulse
    #[default]
    Positional,
    /// Continuous-rotation servos move while a pulse is held, neutral stops them
    ContinuousRotation,
}

impl CameraMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMode::Positional => "positional",
            CameraMode::ContinuousRotation => "continuous_rotation",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisConfig {
    pub channel: u8,
    pub center: u16,
    pub min: u16,
    pub max: u16,
}

impl AxisConfig {
    fn with_channel(channel: u8) -> Self {
        Self {
            channel,
            center: DEFAULT_CAMERA_CENTER,
            min: DEFAULT_CAMERA_MIN,
            max: DEFAULT_CAMERA_MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub mode: CameraMode,
    pub pan: AxisConfig,
    pub tilt: AxisConfig,
    pub max_pulse_duration_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: CameraMode::default(),
            pan: AxisConfig::with_channel(DEFAULT_PAN_CHANNEL),
            tilt: AxisConfig::with_channel(DEFAULT_TILT_CHANNEL),
            max_pulse_duration_ms: MAX_PULSE_DURATION_MS,
        }
    }
}

/// Forward/reverse pin pair of one drive motor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotorPinConfig {
    pub name: String,
    pub forward_pin: u8,
    pub reverse_pin: u8,
}

impl MotorPinConfig {
    pub fn new(name: &str, forward_pin: u8, reverse_pin: u8) -> Self {
        Self {
            name: name.to_string(),
            forward_pin,
            reverse_pin,
        }
    }
}

/// Board wiring: A 14/13, B 12/11, C 18/17, D 16/15
pub fn default_motors() -> Vec<MotorPinConfig> {
    vec![
        MotorPinConfig::new("motorA", 14, 13),
        MotorPinConfig::new("motorB", 12, 11),
        MotorPinConfig::new("motorC", 18, 17),
        MotorPinConfig::new("motorD", 16, 15),
    ]
}

/// How a request that sets several motors at once treats an invalid field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotorBatchPolicy {
    /// Apply fields in motor order, stop at the first invalid one
    /// (earlier fields stay applied)
    #[default]
    FailFast,
    /// Validate every field first, apply only if all are valid
    ValidateAll,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OtaConfig {
    pub staging_path: PathBuf,
    pub max_image_bytes: usize,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            staging_path: PathBuf::from("firmware/pending.bin"),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub key_prefix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub hardware: HardwareConfig,
    pub servos: ServoConfig,
    pub camera: CameraConfig,
    pub motors: Vec<MotorPinConfig>,
    pub motor_batch_policy: MotorBatchPolicy,
    pub ota: OtaConfig,
    pub transport: TransportConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            hardware: HardwareConfig::default(),
            servos: ServoConfig::default(),
            camera: CameraConfig::default(),
            motors: default_motors(),
            motor_batch_policy: MotorBatchPolicy::default(),
            ota: OtaConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl RobotConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants the actuator layer relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let servos = &self.servos;
        if servos.default_min_pulse >= servos.default_max_pulse
            || servos.default_max_pulse > PULSE_MAX
        {
            return Err(invalid(
                "servos.default_min_pulse",
                format!(
                    "bounds {}..{} must satisfy min < max <= {}",
                    servos.default_min_pulse, servos.default_max_pulse, PULSE_MAX
                ),
            ));
        }
        if servos.angle_min >= servos.angle_max || servos.angle_max > ANGLE_DOMAIN_MAX {
            return Err(invalid(
                "servos.angle_min",
                format!(
                    "range {}..{} must satisfy min < max <= {}",
                    servos.angle_min, servos.angle_max, ANGLE_DOMAIN_MAX
                ),
            ));
        }
        if servos.corrections.len() > SERVO_CHANNELS {
            return Err(invalid(
                "servos.corrections",
                format!("at most {} entries", SERVO_CHANNELS),
            ));
        }
        if let Some(home) = servos
            .home
            .iter()
            .find(|h| h.channel as usize >= SERVO_CHANNELS || h.angle > ANGLE_DOMAIN_MAX)
        {
            return Err(invalid(
                "servos.home",
                format!("channel {} angle {} out of range", home.channel, home.angle),
            ));
        }

        for (field, axis) in [("camera.pan", &self.camera.pan), ("camera.tilt", &self.camera.tilt)] {
            if (axis.channel as usize) < SERVO_CHANNELS {
                return Err(invalid(
                    field,
                    format!("channel {} overlaps servo channels 0-15", axis.channel),
                ));
            }
            if !(axis.min < axis.max && axis.min <= axis.center && axis.center <= axis.max)
                || axis.max > PULSE_MAX
            {
                return Err(invalid(
                    field,
                    format!(
                        "bounds must satisfy min <= center <= max <= {} with min < max, got {}/{}/{}",
                        PULSE_MAX, axis.min, axis.center, axis.max
                    ),
                ));
            }
        }
        if self.camera.pan.channel == self.camera.tilt.channel {
            return Err(invalid("camera.tilt", "pan and tilt share a channel"));
        }

        if !(2..=4).contains(&self.motors.len()) {
            return Err(invalid(
                "motors",
                format!("expected 2-4 motors, got {}", self.motors.len()),
            ));
        }
        let mut pins = HashSet::new();
        let mut names = HashSet::new();
        for motor in &self.motors {
            // Motor names share the reply object with "success"
            if motor.name.is_empty() || motor.name == "success" {
                return Err(invalid(
                    "motors",
                    format!("'{}' is not a usable motor name", motor.name),
                ));
            }
            if !names.insert(motor.name.as_str()) {
                return Err(invalid("motors", format!("duplicate motor name '{}'", motor.name)));
            }
            for pin in [motor.forward_pin, motor.reverse_pin] {
                if !pins.insert(pin) {
                    return Err(invalid("motors", format!("pin {} used twice", pin)));
                }
            }
        }

        if self.transport.key_prefix.is_empty() {
            return Err(invalid("transport.key_prefix", "must not be empty"));
        }
        Ok(())
    }
}
