// Pan/tilt camera mount
//
// Two variants, selected by configuration and never active together:
// - Positional: each axis holds an absolute pulse, bounded by its calibration
// - ContinuousRotation: each axis turns while a pulse is held, the neutral
//   (center) pulse stops it

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{AxisConfig, CameraConfig, CameraMode, PULSE_MAX};
use crate::error::{ControlError, Result};
use crate::hw::PwmOutput;
use crate::messages::{AxisState, CameraState};

/// One camera axis: calibration plus the last pulse written
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraAxis {
    channel: u8,
    center: u16,
    min: u16,
    max: u16,
    current: u16,
}

impl CameraAxis {
    pub fn new(config: &AxisConfig) -> Self {
        Self {
            channel: config.channel,
            center: config.center,
            min: config.min,
            max: config.max,
            current: config.center,
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn current(&self) -> u16 {
        self.current
    }

    pub fn center(&self) -> u16 {
        self.center
    }

    pub fn bounds(&self) -> (u16, u16) {
        (self.min, self.max)
    }

    fn limit(&self, pulse: i64) -> u16 {
        pulse.clamp(self.min as i64, self.max as i64) as u16
    }

    fn write<P: PwmOutput>(&mut self, out: &mut P, pulse: u16) -> Result<()> {
        out.set_pulse(self.channel, pulse)?;
        self.current = pulse;
        Ok(())
    }

    fn state(&self) -> AxisState {
        AxisState {
            pulse: self.current,
            center: self.center,
            min: self.min,
            max: self.max,
        }
    }
}

/// Both axes of the mount
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanTilt {
    pub pan: CameraAxis,
    pub tilt: CameraAxis,
}

impl PanTilt {
    fn new(config: &CameraConfig) -> Self {
        Self {
            pan: CameraAxis::new(&config.pan),
            tilt: CameraAxis::new(&config.tilt),
        }
    }

    /// Both axes are attempted even if the first write fails
    fn write_center<P: PwmOutput>(&mut self, out: &mut P) -> Result<()> {
        let (pan, tilt) = (self.pan.center, self.tilt.center);
        let pan_result = self.pan.write(out, pan);
        let tilt_result = self.tilt.write(out, tilt);
        pan_result.and(tilt_result)
    }

    /// Replace the centers after checking both lie within their axis bounds
    fn set_centers(&mut self, pan: Option<u16>, tilt: Option<u16>) -> Result<()> {
        for (axis, center) in [(&self.pan, pan), (&self.tilt, tilt)] {
            if let Some(center) = center
                && !(axis.min..=axis.max).contains(&center)
            {
                return Err(ControlError::InvalidRange {
                    min: axis.min as i64,
                    max: axis.max as i64,
                });
            }
        }
        if let Some(center) = pan {
            self.pan.center = center;
        }
        if let Some(center) = tilt {
            self.tilt.center = center;
        }
        Ok(())
    }

    /// Replace bounds on the given axes, then pull center and current pulse
    /// inside them and rewrite the current pulse
    fn set_limits<P: PwmOutput>(
        &mut self,
        out: &mut P,
        pan: Option<(u16, u16)>,
        tilt: Option<(u16, u16)>,
    ) -> Result<()> {
        for (min, max) in [pan, tilt].into_iter().flatten() {
            if max > PULSE_MAX {
                return Err(ControlError::InvalidPulseValue(max as i64));
            }
            if min >= max {
                return Err(ControlError::InvalidRange {
                    min: min as i64,
                    max: max as i64,
                });
            }
        }

        // Work on copies; nothing is committed unless every write succeeds
        let (mut new_pan, mut new_tilt) = (self.pan, self.tilt);
        for (axis, limits) in [(&mut new_pan, pan), (&mut new_tilt, tilt)] {
            let Some((min, max)) = limits else { continue };
            let pulse = axis.current.clamp(min, max);
            out.set_pulse(axis.channel, pulse)?;
            axis.min = min;
            axis.max = max;
            axis.center = axis.center.clamp(min, max);
            axis.current = pulse;
        }

        self.pan = new_pan;
        self.tilt = new_tilt;
        for (axis, limits) in [(&self.pan, pan), (&self.tilt, tilt)] {
            if limits.is_none() {
                continue;
            }
            info!(
                "Camera channel {} limits: min={} center={} max={}",
                axis.channel, axis.min, axis.center, axis.max
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMount {
    Positional(PanTilt),
    ContinuousRotation(PanTilt),
}

impl CameraMount {
    pub fn new(config: &CameraConfig) -> Self {
        let axes = PanTilt::new(config);
        match config.mode {
            CameraMode::Positional => CameraMount::Positional(axes),
            CameraMode::ContinuousRotation => CameraMount::ContinuousRotation(axes),
        }
    }

    pub fn mode(&self) -> CameraMode {
        match self {
            CameraMount::Positional(_) => CameraMode::Positional,
            CameraMount::ContinuousRotation(_) => CameraMode::ContinuousRotation,
        }
    }

    pub fn axes(&self) -> &PanTilt {
        match self {
            CameraMount::Positional(axes) | CameraMount::ContinuousRotation(axes) => axes,
        }
    }

    fn axes_mut(&mut self) -> &mut PanTilt {
        match self {
            CameraMount::Positional(axes) | CameraMount::ContinuousRotation(axes) => axes,
        }
    }

    pub fn state(&self) -> CameraState {
        let axes = self.axes();
        CameraState {
            success: true,
            mode: self.mode().as_str().to_string(),
            pan_pwm: axes.pan.current,
            tilt_pwm: axes.tilt.current,
            pan: axes.pan.state(),
            tilt: axes.tilt.state(),
        }
    }

    /// Move (positional) or stop (continuous rotation) at the center pulse
    pub fn center<P: PwmOutput>(&mut self, out: &mut P) -> Result<()> {
        debug!("Camera to center");
        self.axes_mut().write_center(out)
    }

    /// Set absolute pulses, clamped to each axis' bounds; absent axes are untouched
    pub fn set_absolute<P: PwmOutput>(
        &mut self,
        out: &mut P,
        pan: Option<u16>,
        tilt: Option<u16>,
    ) -> Result<()> {
        let CameraMount::Positional(axes) = self else {
            return Err(ControlError::UnsupportedInMode("pwm"));
        };
        if let Some(pan) = pan {
            let pulse = axes.pan.limit(pan as i64);
            axes.pan.write(out, pulse)?;
        }
        if let Some(tilt) = tilt {
            let pulse = axes.tilt.limit(tilt as i64);
            axes.tilt.write(out, pulse)?;
        }
        Ok(())
    }

    /// Add deltas to the last applied pulses, clamped to each axis' bounds
    pub fn step<P: PwmOutput>(&mut self, out: &mut P, pan_delta: i32, tilt_delta: i32) -> Result<()> {
        let CameraMount::Positional(axes) = self else {
            return Err(ControlError::UnsupportedInMode("step"));
        };
        if pan_delta != 0 {
            let pulse = axes.pan.limit(axes.pan.current as i64 + pan_delta as i64);
            axes.pan.write(out, pulse)?;
        }
        if tilt_delta != 0 {
            let pulse = axes.tilt.limit(axes.tilt.current as i64 + tilt_delta as i64);
            axes.tilt.write(out, pulse)?;
        }
        Ok(())
    }

    /// Drive both axes with a pulse for `duration`, then return to neutral.
    /// Blocks the caller for the whole duration.
    pub fn pulse<P: PwmOutput>(
        &mut self,
        out: &mut P,
        pan: u16,
        tilt: u16,
        duration: Duration,
    ) -> Result<()> {
        let CameraMount::ContinuousRotation(axes) = self else {
            return Err(ControlError::UnsupportedInMode("pulse"));
        };
        let pan = axes.pan.limit(pan as i64);
        let tilt = axes.tilt.limit(tilt as i64);
        debug!("Camera pulse pan={} tilt={} for {:?}", pan, tilt, duration);

        let driven = axes
            .pan
            .write(out, pan)
            .and_then(|()| axes.tilt.write(out, tilt));
        if let Err(e) = driven {
            // Never leave an axis turning
            if let Err(stop) = axes.write_center(out) {
                warn!("Failed to return camera to neutral: {}", stop);
            }
            return Err(e);
        }
        out.hold(duration);
        axes.write_center(out)
    }

    /// Recalibrate center (positional) or neutral (continuous rotation)
    pub fn calibrate_center<P: PwmOutput>(
        &mut self,
        out: &mut P,
        pan: Option<u16>,
        tilt: Option<u16>,
    ) -> Result<()> {
        match self {
            CameraMount::Positional(axes) => axes.set_centers(pan, tilt)?,
            CameraMount::ContinuousRotation(axes) => {
                axes.set_centers(pan, tilt)?;
                // Keep the axes stopped at the new neutral
                axes.write_center(out)?;
            }
        }
        let axes = self.axes();
        info!(
            "Camera center calibrated: pan={} tilt={}",
            axes.pan.center, axes.tilt.center
        );
        Ok(())
    }

    pub fn calibrate_limits<P: PwmOutput>(
        &mut self,
        out: &mut P,
        pan: Option<(u16, u16)>,
        tilt: Option<(u16, u16)>,
    ) -> Result<()> {
        self.axes_mut().set_limits(out, pan, tilt)
    }
}
