// Angular actuators: servo channels and the pan/tilt camera mount
//
// Provides:
// - Angle -> pulse mapping with per-unit correction
// - ActuatorRegistry: calibration and live state of 16 servos plus the camera
// - CameraMount: positional or continuous-rotation pan/tilt variants

pub mod camera;
pub mod pulse;
mod registry;

pub use camera::{CameraAxis, CameraMount, PanTilt};
pub use pulse::map_angle_to_pulse;
pub use registry::{ActuatorRegistry, ServoChannel};
