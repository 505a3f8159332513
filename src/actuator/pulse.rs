// Logical angle -> hardware pulse conversion
use crate::config::ANGLE_DOMAIN_MAX;

/// Map a logical angle to a pulse value between `pulse_min` and `pulse_max`
///
/// The angle is clamped to `[angle_min, angle_max]`, shifted by the
/// per-unit `correction`, clamped again to the nominal 0-180 domain and then
/// interpolated linearly (truncating) over that domain. The result never
/// leaves `[pulse_min, pulse_max]` when `pulse_min <= pulse_max`.
pub fn map_angle_to_pulse(
    angle: u16,
    angle_min: u16,
    angle_max: u16,
    pulse_min: u16,
    pulse_max: u16,
    correction: i16,
) -> u16 {
    let clamped = angle.clamp(angle_min, angle_max.max(angle_min));
    let effective = (clamped as i32 + correction as i32).clamp(0, ANGLE_DOMAIN_MAX as i32);

    let span = pulse_max as i32 - pulse_min as i32;
    let pulse = pulse_min as i32 + effective * span / ANGLE_DOMAIN_MAX as i32;

    pulse.clamp(0, u16::MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_hit_bounds() {
        assert_eq!(map_angle_to_pulse(0, 0, 180, 102, 512, 0), 102);
        assert_eq!(map_angle_to_pulse(180, 0, 180, 102, 512, 0), 512);
        // 102 + 90 * 410 / 180 = 102 + 205
        assert_eq!(map_angle_to_pulse(90, 0, 180, 102, 512, 0), 307);
    }

    #[test]
    fn test_truncates() {
        // 45 * 410 / 180 = 102.5
        assert_eq!(map_angle_to_pulse(45, 0, 180, 102, 512, 0), 204);
    }

    #[test]
    fn test_clamps_to_allowed_sub_range() {
        let at_20 = map_angle_to_pulse(20, 20, 160, 102, 512, 0);
        assert_eq!(map_angle_to_pulse(0, 20, 160, 102, 512, 0), at_20);
        let at_160 = map_angle_to_pulse(160, 20, 160, 102, 512, 0);
        assert_eq!(map_angle_to_pulse(180, 20, 160, 102, 512, 0), at_160);
    }

    #[test]
    fn test_correction_shifts_then_clamps_to_domain() {
        assert_eq!(
            map_angle_to_pulse(90, 0, 180, 102, 512, 10),
            map_angle_to_pulse(100, 0, 180, 102, 512, 0)
        );
        // Pushed past either end of the domain
        assert_eq!(map_angle_to_pulse(175, 0, 180, 102, 512, 20), 512);
        assert_eq!(map_angle_to_pulse(5, 0, 180, 102, 512, -20), 102);
    }

    #[test]
    fn test_output_within_bounds_for_every_angle() {
        for &(min, max) in &[(0u16, 1u16), (102, 512), (150, 450), (0, 4095), (4000, 4095)] {
            for correction in [-200i16, -7, 0, 7, 200] {
                for angle in 0..=180u16 {
                    let pulse = map_angle_to_pulse(angle, 0, 180, min, max, correction);
                    assert!(
                        (min..=max).contains(&pulse),
                        "angle {} correction {} -> {} outside {}..={}",
                        angle,
                        correction,
                        pulse,
                        min,
                        max
                    );
                }
            }
        }
    }

    #[test]
    fn test_monotonic_in_angle() {
        for correction in [-30i16, 0, 30] {
            let mut previous = 0;
            for angle in 0..=180u16 {
                let pulse = map_angle_to_pulse(angle, 0, 180, 150, 450, correction);
                assert!(pulse >= previous, "pulse decreased at angle {}", angle);
                previous = pulse;
            }
        }
    }
}
