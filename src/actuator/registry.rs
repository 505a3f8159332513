// Servo channels and the camera mount
//
// The registry is the only writer of pulse outputs. Every operation validates
// fully before touching state, and state is only updated after the hardware
// write succeeded.

use std::time::Duration;
use tracing::{debug, info};

use super::camera::CameraMount;
use super::pulse::map_angle_to_pulse;
use crate::config::{CameraConfig, HomePosition, PULSE_MAX, SERVO_CHANNELS, ServoConfig};
use crate::error::{ControlError, Result};
use crate::hw::PwmOutput;
use crate::messages::{CameraState, ServoState};

/// Calibration and live state of one servo channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoChannel {
    pub min_pulse: u16,
    pub max_pulse: u16,
    /// Last commanded angle, 0 until the first command
    pub angle: u16,
    /// Fixed per-unit bias in degrees
    pub correction: i16,
    /// Last pulse written, if any
    pub pulse: Option<u16>,
}

pub struct ActuatorRegistry<P: PwmOutput> {
    out: P,
    channels: [ServoChannel; SERVO_CHANNELS],
    angle_min: u16,
    angle_max: u16,
    camera: CameraMount,
}

impl<P: PwmOutput> ActuatorRegistry<P> {
    /// Create the registry with default bounds; nothing is written yet
    pub fn new(out: P, servos: &ServoConfig, camera: &CameraConfig) -> Self {
        let channels = std::array::from_fn(|channel| ServoChannel {
            min_pulse: servos.default_min_pulse,
            max_pulse: servos.default_max_pulse,
            angle: 0,
            correction: servos.correction(channel),
            pulse: None,
        });
        Self {
            out,
            channels,
            angle_min: servos.angle_min,
            angle_max: servos.angle_max,
            camera: CameraMount::new(camera),
        }
    }

    /// Configure the PWM frequency, center the camera and move servos home
    pub fn initialize(&mut self, pwm_hz: u16, home: &[HomePosition]) -> Result<()> {
        info!("Initializing servo outputs at {} Hz", pwm_hz);
        self.out.set_frequency(pwm_hz)?;
        self.camera.center(&mut self.out)?;
        for position in home {
            self.set_angle(position.channel as usize, position.angle)?;
        }
        info!("Servo outputs initialized");
        Ok(())
    }

    fn channel(&self, channel: usize) -> Result<&ServoChannel> {
        self.channels
            .get(channel)
            .ok_or(ControlError::InvalidServoId(channel as i64))
    }

    /// Allowed logical angle range
    pub fn angle_range(&self) -> (u16, u16) {
        (self.angle_min, self.angle_max)
    }

    /// Pulse an angle maps to on a channel with its current calibration
    pub fn pulse_for(&self, channel: usize, angle: u16) -> Result<u16> {
        let ch = self.channel(channel)?;
        Ok(map_angle_to_pulse(
            angle,
            self.angle_min,
            self.angle_max,
            ch.min_pulse,
            ch.max_pulse,
            ch.correction,
        ))
    }

    /// Move a servo; the angle is clamped to the allowed range
    pub fn set_angle(&mut self, channel: usize, angle: u16) -> Result<u16> {
        let pulse = self.pulse_for(channel, angle)?;
        let angle = angle.clamp(self.angle_min, self.angle_max);

        self.out.set_pulse(channel as u8, pulse)?;
        let ch = &mut self.channels[channel];
        ch.angle = angle;
        ch.pulse = Some(pulse);
        debug!("Servo {} set to {} degrees, pulse: {}", channel, angle, pulse);
        Ok(pulse)
    }

    /// Last commanded angle; 0 for an unknown channel
    pub fn angle(&self, channel: usize) -> u16 {
        self.channels.get(channel).map_or(0, |ch| ch.angle)
    }

    /// Last pulse written to a channel
    pub fn pulse(&self, channel: usize) -> Option<u16> {
        self.channels.get(channel).and_then(|ch| ch.pulse)
    }

    pub fn limits(&self, channel: usize) -> Option<(u16, u16)> {
        self.channels
            .get(channel)
            .map(|ch| (ch.min_pulse, ch.max_pulse))
    }

    /// Replace a channel's pulse bounds.
    ///
    /// A channel holding a nonzero angle is moved to the same angle under
    /// the new bounds before the bounds are committed.
    pub fn set_limits(&mut self, channel: usize, min: u16, max: u16) -> Result<()> {
        let ch = *self.channel(channel)?;
        if min >= max || max > PULSE_MAX {
            return Err(ControlError::InvalidRange {
                min: min as i64,
                max: max as i64,
            });
        }

        let mut pulse = ch.pulse;
        if ch.angle != 0 {
            let reapplied = map_angle_to_pulse(
                ch.angle,
                self.angle_min,
                self.angle_max,
                min,
                max,
                ch.correction,
            );
            self.out.set_pulse(channel as u8, reapplied)?;
            pulse = Some(reapplied);
        }

        let ch = &mut self.channels[channel];
        ch.min_pulse = min;
        ch.max_pulse = max;
        ch.pulse = pulse;
        info!("Servo {} calibrated: min={} max={}", channel, min, max);
        Ok(())
    }

    /// `{id, angle, min, max}` for every servo channel
    pub fn servo_states(&self) -> Vec<ServoState> {
        self.channels
            .iter()
            .enumerate()
            .map(|(id, ch)| ServoState {
                id: id as u8,
                angle: ch.angle,
                min: ch.min_pulse,
                max: ch.max_pulse,
            })
            .collect()
    }

    pub fn camera(&self) -> &CameraMount {
        &self.camera
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.state()
    }

    pub fn camera_set_absolute(&mut self, pan: Option<u16>, tilt: Option<u16>) -> Result<()> {
        self.camera.set_absolute(&mut self.out, pan, tilt)
    }

    pub fn camera_step(&mut self, pan_delta: i32, tilt_delta: i32) -> Result<()> {
        self.camera.step(&mut self.out, pan_delta, tilt_delta)
    }

    pub fn camera_center(&mut self) -> Result<()> {
        self.camera.center(&mut self.out)
    }

    pub fn camera_calibrate_center(&mut self, pan: Option<u16>, tilt: Option<u16>) -> Result<()> {
        self.camera.calibrate_center(&mut self.out, pan, tilt)
    }

    pub fn camera_calibrate_limits(
        &mut self,
        pan: Option<(u16, u16)>,
        tilt: Option<(u16, u16)>,
    ) -> Result<()> {
        self.camera.calibrate_limits(&mut self.out, pan, tilt)
    }

    /// Blocks for `duration`
    pub fn camera_pulse(&mut self, pan: u16, tilt: u16, duration: Duration) -> Result<()> {
        self.camera.pulse(&mut self.out, pan, tilt, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_PAN_CHANNEL, DEFAULT_SERVO_MAX_PULSE, DEFAULT_SERVO_MIN_PULSE};
    use crate::hw::sim::SimBackend;

    fn registry_with(servos: ServoConfig) -> (ActuatorRegistry<SimBackend>, SimBackend) {
        let board = SimBackend::new();
        let registry = ActuatorRegistry::new(board.clone(), &servos, &CameraConfig::default());
        (registry, board)
    }

    fn registry() -> (ActuatorRegistry<SimBackend>, SimBackend) {
        registry_with(ServoConfig {
            corrections: vec![4, 0, 0, -3],
            ..ServoConfig::default()
        })
    }

    #[test]
    fn test_initialize_sets_frequency_centers_camera_and_homes() {
        let (mut registry, board) = registry();
        registry
            .initialize(50, &[HomePosition { channel: 2, angle: 90 }])
            .unwrap();
        assert_eq!(board.frequency(), Some(50));
        assert_eq!(board.pulse(DEFAULT_PAN_CHANNEL), Some(300));
        assert_eq!(registry.angle(2), 90);
        assert_eq!(board.pulse(2), Some(307));
    }

    #[test]
    fn test_set_angle_writes_mapped_pulse() {
        let (mut registry, board) = registry();
        let pulse = registry.set_angle(0, 90).unwrap();
        let expected = map_angle_to_pulse(
            90,
            0,
            180,
            DEFAULT_SERVO_MIN_PULSE,
            DEFAULT_SERVO_MAX_PULSE,
            4,
        );
        assert_eq!(pulse, expected);
        assert_eq!(board.pulse(0), Some(expected));
        assert_eq!(registry.angle(0), 90);
    }

    #[test]
    fn test_set_angle_is_idempotent() {
        let (mut registry, board) = registry();
        let first = registry.set_angle(5, 120).unwrap();
        assert_eq!(registry.angle(5), 120);
        let second = registry.set_angle(5, 120).unwrap();
        assert_eq!(first, second);
        assert_eq!(board.pulse(5), Some(second));
        assert_eq!(registry.angle(5), 120);
    }

    #[test]
    fn test_set_angle_rejects_unknown_channel() {
        let (mut registry, board) = registry();
        assert!(matches!(
            registry.set_angle(16, 90),
            Err(ControlError::InvalidServoId(16))
        ));
        assert!(board.log().is_empty());
    }

    #[test]
    fn test_angle_clamped_to_allowed_sub_range() {
        let (mut registry, _board) = registry_with(ServoConfig {
            angle_min: 20,
            angle_max: 160,
            ..ServoConfig::default()
        });
        registry.set_angle(1, 175).unwrap();
        assert_eq!(registry.angle(1), 160);
        registry.set_angle(1, 3).unwrap();
        assert_eq!(registry.angle(1), 20);
    }

    #[test]
    fn test_unknown_channel_reads_zero() {
        let (registry, _board) = registry();
        assert_eq!(registry.angle(42), 0);
        assert_eq!(registry.limits(42), None);
    }

    #[test]
    fn test_set_limits_reapplies_current_angle() {
        let (mut registry, board) = registry();
        let before = registry.set_angle(3, 45).unwrap();
        registry.set_limits(3, 150, 450).unwrap();

        let after = board.pulse(3).unwrap();
        assert_ne!(before, after);
        assert_eq!(after, map_angle_to_pulse(45, 0, 180, 150, 450, -3));
        assert_eq!(registry.limits(3), Some((150, 450)));
        assert_eq!(registry.angle(3), 45);
    }

    #[test]
    fn test_set_limits_on_idle_channel_does_not_write() {
        let (mut registry, board) = registry();
        registry.set_limits(7, 120, 480).unwrap();
        assert!(board.log().is_empty());
        assert_eq!(registry.limits(7), Some((120, 480)));
    }

    #[test]
    fn test_set_limits_rejects_inverted_range_without_change() {
        let (mut registry, board) = registry();
        registry.set_angle(3, 60).unwrap();
        board.clear_log();

        let err = registry.set_limits(3, 500, 100).unwrap_err();
        assert!(matches!(err, ControlError::InvalidRange { min: 500, max: 100 }));
        assert_eq!(
            registry.limits(3),
            Some((DEFAULT_SERVO_MIN_PULSE, DEFAULT_SERVO_MAX_PULSE))
        );
        assert_eq!(registry.angle(3), 60);
        assert!(board.log().is_empty());
    }

    #[test]
    fn test_set_limits_rejects_above_ceiling_and_equal_bounds() {
        let (mut registry, _board) = registry();
        assert!(registry.set_limits(0, 100, 5000).is_err());
        assert!(registry.set_limits(0, 300, 300).is_err());
        assert!(matches!(
            registry.set_limits(99, 100, 200),
            Err(ControlError::InvalidServoId(99))
        ));
    }

    #[test]
    fn test_servo_states_cover_every_channel() {
        let (mut registry, _board) = registry();
        registry.set_angle(4, 30).unwrap();
        let states = registry.servo_states();
        assert_eq!(states.len(), SERVO_CHANNELS);
        assert_eq!(
            states[4],
            ServoState {
                id: 4,
                angle: 30,
                min: DEFAULT_SERVO_MIN_PULSE,
                max: DEFAULT_SERVO_MAX_PULSE
            }
        );
    }

    #[test]
    fn test_camera_step_through_registry() {
        let (mut registry, board) = registry();
        registry.camera_center().unwrap();
        registry.camera_step(50, 0).unwrap();
        registry.camera_step(200, 0).unwrap();
        assert_eq!(registry.camera_state().pan_pwm, 450);
        assert_eq!(board.pulse(DEFAULT_PAN_CHANNEL), Some(450));
    }
}
