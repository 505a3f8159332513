// Differential (tank) drive mixing for the four-wheel base
// Converts joystick-style throttle/steering into per-side motor speeds.

use serde_json::{Map, Value};

use crate::config::MOTOR_SPEED_MAX;

/// Joystick axis range: -100..=100
pub const STICK_MAX: i16 = 100;

/// Motors on each side of the base (board wiring)
pub const LEFT_MOTORS: [&str; 2] = ["motorB", "motorC"];
pub const RIGHT_MOTORS: [&str; 2] = ["motorA", "motorD"];

/// Signed speed for each side of the base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideSpeeds {
    pub left: i16,
    pub right: i16,
}

impl SideSpeeds {
    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Motor multi-field payload, e.g. `{"motorA": 120, "motorB": 80, ...}`
    pub fn to_motor_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        for name in LEFT_MOTORS {
            payload.insert(name.to_string(), Value::from(self.left));
        }
        for name in RIGHT_MOTORS {
            payload.insert(name.to_string(), Value::from(self.right));
        }
        payload
    }
}

/// Scale a stick fraction to a motor speed, rounding to nearest
fn scale(value: i32) -> i16 {
    let max = MOTOR_SPEED_MAX as i32;
    let scaled = (value * max * 2 + STICK_MAX as i32 * value.signum()) / (STICK_MAX as i32 * 2);
    scaled.clamp(-max, max) as i16
}

/// Tank mixing: left = throttle - steering, right = throttle + steering
///
/// # Arguments
/// * `throttle` - Forward/backward in -100..=100 (positive = forward)
/// * `steering` - Turn in -100..=100 (positive = right side faster, turns left)
pub fn tank_mix(throttle: i16, steering: i16) -> SideSpeeds {
    let throttle = throttle.clamp(-STICK_MAX, STICK_MAX) as i32;
    let steering = steering.clamp(-STICK_MAX, STICK_MAX) as i32;
    SideSpeeds {
        left: scale(throttle - steering),
        right: scale(throttle + steering),
    }
}

/// All wheels at the same speed
pub fn sync_drive(throttle: i16) -> SideSpeeds {
    tank_mix(throttle, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_stick() {
        assert_eq!(tank_mix(0, 0), SideSpeeds::zero());
    }

    #[test]
    fn test_full_forward() {
        assert_eq!(tank_mix(100, 0), SideSpeeds::new(255, 255));
        assert_eq!(tank_mix(-100, 0), SideSpeeds::new(-255, -255));
    }

    #[test]
    fn test_spin_in_place() {
        let speeds = tank_mix(0, 100);
        assert_eq!(speeds, SideSpeeds::new(-255, 255));
    }

    #[test]
    fn test_saturates_at_speed_limit() {
        // 100 + 100 would be 510 without the clamp
        assert_eq!(tank_mix(100, 100), SideSpeeds::new(0, 255));
        // Out-of-range stick input is clamped first
        assert_eq!(tank_mix(500, 0), SideSpeeds::new(255, 255));
    }

    #[test]
    fn test_half_throttle_rounds() {
        // 50 * 255 / 100 = 127.5
        assert_eq!(sync_drive(50), SideSpeeds::new(128, 128));
        assert_eq!(sync_drive(-50), SideSpeeds::new(-128, -128));
    }

    #[test]
    fn test_payload_follows_wiring() {
        let payload = SideSpeeds::new(-40, 90).to_motor_payload();
        assert_eq!(payload["motorA"], 90);
        assert_eq!(payload["motorD"], 90);
        assert_eq!(payload["motorB"], -40);
        assert_eq!(payload["motorC"], -40);
    }
}
