// Command validation and routing, independent of the transport
//
// The transport hands over a route and the raw request body; the dispatcher
// checks every field against the actuator's domain before calling into the
// registry or the motor bank, and turns the result into a JSON reply.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::actuator::ActuatorRegistry;
use crate::config::{
    ANGLE_DOMAIN_MAX, MotorBatchPolicy, PULSE_MAX, RobotConfig, SERVO_CHANNELS,
};
use crate::error::{ControlError, Result};
use crate::hw::{MotorPins, PwmOutput};
use crate::messages::{
    CalibrateServoReply, CalibrateServoRequest, CameraCenterRequest, CameraLimitsRequest,
    CameraPulseRequest, CameraPwmRequest, CameraState, CameraStepRequest, ErrorReply,
    FirmwareReply, MotorSpeeds, ServoList, SetServoReply, SetServoRequest, StatusReply, StopReply,
};
use crate::motor::MotorBank;
use crate::ota::FirmwareUpdater;

/// Operations exposed to the transport, addressed by a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Status,
    ServoList,
    ServoSet,
    ServoCalibrate,
    MotorGet,
    MotorSet,
    MotorStop,
    CameraGet,
    CameraPwm,
    CameraStep,
    CameraCenter,
    CameraCalibrateCenter,
    CameraCalibrateLimits,
    CameraPulse,
    FirmwareUpload,
}

impl Route {
    pub const ALL: [Route; 15] = [
        Route::Status,
        Route::ServoList,
        Route::ServoSet,
        Route::ServoCalibrate,
        Route::MotorGet,
        Route::MotorSet,
        Route::MotorStop,
        Route::CameraGet,
        Route::CameraPwm,
        Route::CameraStep,
        Route::CameraCenter,
        Route::CameraCalibrateCenter,
        Route::CameraCalibrateLimits,
        Route::CameraPulse,
        Route::FirmwareUpload,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Status => "status",
            Route::ServoList => "servo/list",
            Route::ServoSet => "servo/set",
            Route::ServoCalibrate => "servo/calibrate",
            Route::MotorGet => "motor/get",
            Route::MotorSet => "motor/set",
            Route::MotorStop => "motor/stop",
            Route::CameraGet => "camera/get",
            Route::CameraPwm => "camera/pwm",
            Route::CameraStep => "camera/step",
            Route::CameraCenter => "camera/center",
            Route::CameraCalibrateCenter => "camera/calibrate/center",
            Route::CameraCalibrateLimits => "camera/calibrate/limits",
            Route::CameraPulse => "camera/pulse",
            Route::FirmwareUpload => "ota/upload",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim_matches('/');
        Route::ALL.into_iter().find(|route| route.path() == path)
    }
}

/// JSON reply plus whether the process must restart once it is delivered
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub body: Value,
    pub restart: bool,
}

impl Reply {
    fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(value)?,
            restart: false,
        })
    }
}

fn parse<T: DeserializeOwned>(body: Option<&[u8]>) -> Result<T> {
    match body {
        None | Some([]) => Err(ControlError::NoInputData),
        Some(bytes) => Ok(serde_json::from_slice(bytes)?),
    }
}

fn servo_id(id: Option<i64>) -> Result<usize> {
    match id {
        Some(id) if (0..SERVO_CHANNELS as i64).contains(&id) => Ok(id as usize),
        other => Err(ControlError::InvalidServoId(other.unwrap_or(-1))),
    }
}

fn servo_angle(angle: Option<i64>) -> Result<u16> {
    match angle {
        Some(angle) if (0..=ANGLE_DOMAIN_MAX as i64).contains(&angle) => Ok(angle as u16),
        other => Err(ControlError::InvalidAngle(other.unwrap_or(-1))),
    }
}

fn pulse_value(value: i64) -> Result<u16> {
    if (0..=PULSE_MAX as i64).contains(&value) {
        Ok(value as u16)
    } else {
        Err(ControlError::InvalidPulseValue(value))
    }
}

fn required_pulse(value: Option<i64>) -> Result<u16> {
    pulse_value(value.unwrap_or(-1))
}

fn optional_pulse(value: Option<i64>) -> Result<Option<u16>> {
    value.map(pulse_value).transpose()
}

fn pulse_delta(value: Option<i64>) -> Result<i32> {
    let delta = value.unwrap_or(0);
    if (-(PULSE_MAX as i64)..=PULSE_MAX as i64).contains(&delta) {
        Ok(delta as i32)
    } else {
        Err(ControlError::InvalidPulseValue(delta))
    }
}

fn pulse_pair(axis: &str, min: Option<i64>, max: Option<i64>) -> Result<Option<(u16, u16)>> {
    match (min, max) {
        (None, None) => Ok(None),
        (Some(min), Some(max)) => {
            let (min, max) = (pulse_value(min)?, pulse_value(max)?);
            if min >= max {
                return Err(ControlError::InvalidRange {
                    min: min as i64,
                    max: max as i64,
                });
            }
            Ok(Some((min, max)))
        }
        _ => Err(ControlError::MalformedInput(format!(
            "{axis}_min and {axis}_max must be given together"
        ))),
    }
}

pub struct CommandDispatcher<P: PwmOutput, M: MotorPins> {
    servos: ActuatorRegistry<P>,
    motors: MotorBank<M>,
    firmware: FirmwareUpdater,
    batch_policy: MotorBatchPolicy,
    max_pulse_duration: Duration,
    simulated: bool,
}

impl<P: PwmOutput, M: MotorPins> CommandDispatcher<P, M> {
    /// Build the actuator layer and bring the hardware to a known state:
    /// motors stopped first, then servo outputs and camera.
    pub fn start(pwm: P, pins: M, config: &RobotConfig, simulated: bool) -> Result<Self> {
        let mut motors = MotorBank::new(pins, &config.motors);
        motors.initialize()?;

        let mut servos = ActuatorRegistry::new(pwm, &config.servos, &config.camera);
        servos.initialize(config.hardware.pwm_frequency_hz, &config.servos.home)?;

        Ok(Self {
            servos,
            motors,
            firmware: FirmwareUpdater::new(&config.ota),
            batch_policy: config.motor_batch_policy,
            max_pulse_duration: Duration::from_millis(config.camera.max_pulse_duration_ms),
            simulated,
        })
    }

    pub fn servos(&self) -> &ActuatorRegistry<P> {
        &self.servos
    }

    pub fn motors(&self) -> &MotorBank<M> {
        &self.motors
    }

    /// Route a request by path; errors become an error reply
    pub fn handle_path(&mut self, path: &str, body: Option<&[u8]>) -> Reply {
        let result = match Route::from_path(path) {
            Some(route) => self.handle(route, body),
            None => Err(ControlError::UnknownRoute(path.to_string())),
        };
        result.unwrap_or_else(|err| {
            if err.is_caller_error() {
                warn!("Rejected '{}': {}", path, err);
            } else {
                error!("Failed '{}': {}", path, err);
            }
            Reply {
                body: serde_json::to_value(ErrorReply::from(&err)).unwrap_or(Value::Null),
                restart: false,
            }
        })
    }

    pub fn handle(&mut self, route: Route, body: Option<&[u8]>) -> Result<Reply> {
        debug!("Handling {:?}", route);
        match route {
            Route::Status => Reply::json(&self.status()),
            Route::ServoList => Reply::json(&self.servo_list()),
            Route::ServoSet => {
                let reply = self.set_servo(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::ServoCalibrate => {
                let reply = self.calibrate_servo(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::MotorGet => Reply::json(&self.motor_speeds()),
            Route::MotorSet => {
                let fields: Map<String, Value> = parse(body)?;
                let reply = self.set_motors(&fields)?;
                Reply::json(&reply)
            }
            Route::MotorStop => Reply::json(&self.stop_motors()?),
            Route::CameraGet => Reply::json(&self.camera_state()),
            Route::CameraPwm => {
                let reply = self.camera_pwm(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::CameraStep => {
                let reply = self.camera_step(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::CameraCenter => Reply::json(&self.camera_center()?),
            Route::CameraCalibrateCenter => {
                let reply = self.camera_calibrate_center(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::CameraCalibrateLimits => {
                let reply = self.camera_calibrate_limits(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::CameraPulse => {
                let reply = self.camera_pulse(parse(body)?)?;
                Reply::json(&reply)
            }
            Route::FirmwareUpload => {
                let image = match body {
                    None | Some([]) => return Err(ControlError::NoInputData),
                    Some(image) => image,
                };
                let reply = self.upload_firmware(image)?;
                Ok(Reply {
                    body: serde_json::to_value(&reply)?,
                    restart: true,
                })
            }
        }
    }

    pub fn status(&self) -> StatusReply {
        StatusReply {
            status: "ok".to_string(),
            servos_count: SERVO_CHANNELS,
            motors_count: self.motors.len(),
            camera_mode: self.servos.camera().mode().as_str().to_string(),
            simulated: self.simulated,
        }
    }

    pub fn servo_list(&self) -> ServoList {
        ServoList {
            servos: self.servos.servo_states(),
        }
    }

    pub fn set_servo(&mut self, req: SetServoRequest) -> Result<SetServoReply> {
        let id = servo_id(req.id)?;
        let angle = servo_angle(req.angle)?;
        self.servos.set_angle(id, angle)?;
        Ok(SetServoReply {
            success: true,
            id: id as u8,
            angle: self.servos.angle(id),
        })
    }

    pub fn calibrate_servo(&mut self, req: CalibrateServoRequest) -> Result<CalibrateServoReply> {
        let id = servo_id(req.id)?;
        let min = required_pulse(req.min)?;
        let max = required_pulse(req.max)?;
        if min >= max {
            return Err(ControlError::InvalidRange {
                min: min as i64,
                max: max as i64,
            });
        }
        self.servos.set_limits(id, min, max)?;
        Ok(CalibrateServoReply {
            success: true,
            id: id as u8,
            min,
            max,
        })
    }

    pub fn motor_speeds(&self) -> MotorSpeeds {
        MotorSpeeds {
            success: true,
            speeds: self.motors.speeds(),
        }
    }

    /// Apply any subset of named motor speeds.
    ///
    /// Fields are visited in motor order; absent fields leave that motor
    /// untouched. With `FailFast` the first invalid field aborts the rest and
    /// earlier fields stay applied; with `ValidateAll` nothing is applied
    /// unless every field is valid.
    pub fn set_motors(&mut self, fields: &Map<String, Value>) -> Result<MotorSpeeds> {
        let requested: Vec<(usize, &Value)> = self
            .motors
            .channels()
            .iter()
            .enumerate()
            .filter_map(|(index, ch)| fields.get(&ch.name).map(|value| (index, value)))
            .collect();

        match self.batch_policy {
            MotorBatchPolicy::FailFast => {
                for (index, value) in requested {
                    let speed = self.motor_speed(index, value)?;
                    self.motors.set_speed(index, speed)?;
                }
            }
            MotorBatchPolicy::ValidateAll => {
                let mut speeds = Vec::with_capacity(requested.len());
                for (index, value) in requested {
                    let speed = self.motor_speed(index, value)?;
                    self.motors.check_speed(index, speed)?;
                    speeds.push((index, speed));
                }
                for (index, speed) in speeds {
                    self.motors.set_speed(index, speed)?;
                }
            }
        }
        Ok(self.motor_speeds())
    }

    fn motor_speed(&self, index: usize, value: &Value) -> Result<i64> {
        value.as_i64().ok_or_else(|| {
            let name = self.motors.channels().get(index).map_or("motor", |ch| ch.name.as_str());
            ControlError::MalformedInput(format!("{} must be an integer", name))
        })
    }

    pub fn stop_motors(&mut self) -> Result<StopReply> {
        self.motors.stop_all()?;
        Ok(StopReply {
            success: true,
            message: "All motors stopped".to_string(),
        })
    }

    pub fn camera_state(&self) -> CameraState {
        self.servos.camera_state()
    }

    pub fn camera_pwm(&mut self, req: CameraPwmRequest) -> Result<CameraState> {
        if req.pan_pwm.is_none() && req.tilt_pwm.is_none() {
            return Err(ControlError::NoInputData);
        }
        let pan = optional_pulse(req.pan_pwm)?;
        let tilt = optional_pulse(req.tilt_pwm)?;
        self.servos.camera_set_absolute(pan, tilt)?;
        Ok(self.camera_state())
    }

    pub fn camera_step(&mut self, req: CameraStepRequest) -> Result<CameraState> {
        if req.pan_delta.is_none() && req.tilt_delta.is_none() {
            return Err(ControlError::NoInputData);
        }
        let pan = pulse_delta(req.pan_delta)?;
        let tilt = pulse_delta(req.tilt_delta)?;
        self.servos.camera_step(pan, tilt)?;
        Ok(self.camera_state())
    }

    pub fn camera_center(&mut self) -> Result<CameraState> {
        self.servos.camera_center()?;
        Ok(self.camera_state())
    }

    pub fn camera_calibrate_center(&mut self, req: CameraCenterRequest) -> Result<CameraState> {
        if req.pan_center.is_none() && req.tilt_center.is_none() {
            return Err(ControlError::NoInputData);
        }
        let pan = optional_pulse(req.pan_center)?;
        let tilt = optional_pulse(req.tilt_center)?;
        self.servos.camera_calibrate_center(pan, tilt)?;
        Ok(self.camera_state())
    }

    pub fn camera_calibrate_limits(&mut self, req: CameraLimitsRequest) -> Result<CameraState> {
        let pan = pulse_pair("pan", req.pan_min, req.pan_max)?;
        let tilt = pulse_pair("tilt", req.tilt_min, req.tilt_max)?;
        if pan.is_none() && tilt.is_none() {
            return Err(ControlError::NoInputData);
        }
        self.servos.camera_calibrate_limits(pan, tilt)?;
        Ok(self.camera_state())
    }

    /// Blocks for the (capped) duration
    pub fn camera_pulse(&mut self, req: CameraPulseRequest) -> Result<CameraState> {
        let axes = *self.servos.camera().axes();
        let pan = optional_pulse(req.pan_pwm)?.unwrap_or(axes.pan.center());
        let tilt = optional_pulse(req.tilt_pwm)?.unwrap_or(axes.tilt.center());
        let duration_ms = req
            .duration_ms
            .ok_or_else(|| ControlError::MalformedInput("duration_ms is required".to_string()))?;
        let duration = Duration::from_millis(duration_ms.max(0) as u64).min(self.max_pulse_duration);

        self.servos.camera_pulse(pan, tilt, duration)?;
        Ok(self.camera_state())
    }

    pub fn upload_firmware(&mut self, image: &[u8]) -> Result<FirmwareReply> {
        let bytes = self.firmware.stage(image)?;
        Ok(FirmwareReply {
            success: true,
            message: "Firmware uploaded successfully. Rebooting...".to_string(),
            bytes,
        })
    }

    /// Stop all motors before the process exits
    pub fn shutdown(&mut self) {
        info!("Shutting down actuator layer");
        if let Err(e) = self.motors.stop_all() {
            warn!("Failed to stop motors on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::map_angle_to_pulse;
    use crate::config::{
        CameraMode, DEFAULT_PAN_CHANNEL, DEFAULT_SERVO_MAX_PULSE, DEFAULT_SERVO_MIN_PULSE,
    };
    use crate::hw::sim::{SimBackend, SimWrite};
    use serde_json::json;

    type SimDispatcher = CommandDispatcher<SimBackend, SimBackend>;

    fn dispatcher_with(config: RobotConfig) -> (SimDispatcher, SimBackend) {
        let board = SimBackend::new();
        let dispatcher =
            CommandDispatcher::start(board.clone(), board.clone(), &config, true).unwrap();
        board.clear_log();
        (dispatcher, board)
    }

    fn dispatcher() -> (SimDispatcher, SimBackend) {
        dispatcher_with(RobotConfig::default())
    }

    fn call(d: &mut SimDispatcher, path: &str, body: Value) -> Value {
        let bytes = serde_json::to_vec(&body).unwrap();
        d.handle_path(path, Some(&bytes)).body
    }

    fn error_code(reply: &Value) -> &str {
        reply["error"]["code"].as_str().unwrap()
    }

    #[test]
    fn test_route_paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/servo/set/"), Some(Route::ServoSet));
        assert_eq!(Route::from_path("servo"), None);
    }

    #[test]
    fn test_start_stops_motors_and_centers_camera() {
        let board = SimBackend::new();
        let _d = CommandDispatcher::start(board.clone(), board.clone(), &RobotConfig::default(), true)
            .unwrap();
        assert_eq!(board.duty(14), Some(0));
        assert_eq!(board.duty(13), Some(0));
        assert_eq!(board.pulse(DEFAULT_PAN_CHANNEL), Some(300));
        assert_eq!(board.frequency(), Some(50));
    }

    #[test]
    fn test_set_then_get_angle() {
        let (mut d, board) = dispatcher();
        let reply = call(&mut d, "servo/set", json!({ "id": 0, "angle": 90 }));
        assert_eq!(reply, json!({ "success": true, "id": 0, "angle": 90 }));

        let expected =
            map_angle_to_pulse(90, 0, 180, DEFAULT_SERVO_MIN_PULSE, DEFAULT_SERVO_MAX_PULSE, 0);
        assert_eq!(board.pulse(0), Some(expected));

        let list = d.handle_path("servo/list", None).body;
        assert_eq!(
            list["servos"][0],
            json!({ "id": 0, "angle": 90, "min": DEFAULT_SERVO_MIN_PULSE, "max": DEFAULT_SERVO_MAX_PULSE })
        );
        assert_eq!(list["servos"].as_array().unwrap().len(), 16);
    }

    #[test]
    fn test_servo_validation_errors() {
        let (mut d, board) = dispatcher();
        let cases = [
            (json!({ "id": 16, "angle": 90 }), "INVALID_SERVO_ID"),
            (json!({ "id": -1, "angle": 90 }), "INVALID_SERVO_ID"),
            (json!({ "angle": 90 }), "INVALID_SERVO_ID"),
            (json!({ "id": 2, "angle": 181 }), "INVALID_ANGLE"),
            (json!({ "id": 2, "angle": -5 }), "INVALID_ANGLE"),
            (json!({ "id": 2 }), "INVALID_ANGLE"),
            (json!({ "id": "two", "angle": 5 }), "MALFORMED_INPUT"),
        ];
        for (body, code) in cases {
            let reply = call(&mut d, "servo/set", body.clone());
            assert_eq!(reply["success"], false, "{body}");
            assert_eq!(error_code(&reply), code, "{body}");
        }
        assert!(board.log().is_empty());
    }

    #[test]
    fn test_missing_and_malformed_body() {
        let (mut d, _board) = dispatcher();
        let reply = d.handle_path("servo/set", None).body;
        assert_eq!(error_code(&reply), "NO_INPUT_DATA");
        let reply = d.handle_path("servo/calibrate", Some(b"{ nope".as_slice())).body;
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
        let reply = d.handle_path("servo/spin", None).body;
        assert_eq!(error_code(&reply), "UNKNOWN_ROUTE");
    }

    #[test]
    fn test_calibrate_validation_order() {
        let (mut d, _board) = dispatcher();
        let reply = call(&mut d, "servo/calibrate", json!({ "id": 3, "min": 100, "max": 5000 }));
        assert_eq!(error_code(&reply), "INVALID_PULSE_VALUE");
        let reply = call(&mut d, "servo/calibrate", json!({ "id": 3, "min": -1, "max": 300 }));
        assert_eq!(error_code(&reply), "INVALID_PULSE_VALUE");
        let reply = call(&mut d, "servo/calibrate", json!({ "id": 3, "min": 500, "max": 100 }));
        assert_eq!(error_code(&reply), "INVALID_RANGE");
        let reply = call(&mut d, "servo/calibrate", json!({ "id": 30, "min": 100, "max": 500 }));
        assert_eq!(error_code(&reply), "INVALID_SERVO_ID");
        assert_eq!(
            d.servos().limits(3),
            Some((DEFAULT_SERVO_MIN_PULSE, DEFAULT_SERVO_MAX_PULSE))
        );
    }

    #[test]
    fn test_recalibration_moves_servo() {
        let (mut d, board) = dispatcher();
        call(&mut d, "servo/set", json!({ "id": 3, "angle": 45 }));
        let before = board.pulse(3).unwrap();

        let reply = call(&mut d, "servo/calibrate", json!({ "id": 3, "min": 150, "max": 450 }));
        assert_eq!(reply, json!({ "success": true, "id": 3, "min": 150, "max": 450 }));
        let after = board.pulse(3).unwrap();
        assert_ne!(before, after);
        assert_eq!(after, map_angle_to_pulse(45, 0, 180, 150, 450, 0));
    }

    #[test]
    fn test_motor_partial_update_leaves_others() {
        let (mut d, _board) = dispatcher();
        call(&mut d, "motor/set", json!({ "motorA": 100, "motorB": -100 }));
        let reply = call(&mut d, "motor/set", json!({ "motorB": 30, "unknown": 9 }));
        assert_eq!(
            reply,
            json!({ "success": true, "motorA": 100, "motorB": 30, "motorC": 0, "motorD": 0 })
        );
    }

    #[test]
    fn test_motor_fail_fast_keeps_earlier_fields() {
        let (mut d, _board) = dispatcher();
        let reply = call(
            &mut d,
            "motor/set",
            json!({ "motorA": 120, "motorB": 300, "motorC": 50 }),
        );
        assert_eq!(error_code(&reply), "INVALID_MOTOR_SPEED");
        let speeds = d.motors().speeds();
        assert_eq!(speeds["motorA"], 120);
        assert_eq!(speeds["motorB"], 0);
        assert_eq!(speeds["motorC"], 0);
    }

    #[test]
    fn test_motor_fail_fast_keeps_earlier_fields_before_non_integer() {
        let (mut d, _board) = dispatcher();
        let reply = call(&mut d, "motor/set", json!({ "motorA": 120, "motorB": "x", "motorC": 40 }));
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
        let speeds = d.motors().speeds();
        assert_eq!(speeds["motorA"], 120);
        assert_eq!(speeds["motorB"], 0);
        assert_eq!(speeds["motorC"], 0);
    }

    #[test]
    fn test_motor_validate_all_rejects_non_integer_without_applying() {
        let config = RobotConfig {
            motor_batch_policy: MotorBatchPolicy::ValidateAll,
            ..RobotConfig::default()
        };
        let (mut d, board) = dispatcher_with(config);
        let reply = call(&mut d, "motor/set", json!({ "motorA": 120, "motorB": "x" }));
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
        assert!(d.motors().speeds().values().all(|&s| s == 0));
        assert!(board.log().is_empty());
    }

    #[test]
    fn test_motor_validate_all_applies_nothing_on_error() {
        let config = RobotConfig {
            motor_batch_policy: MotorBatchPolicy::ValidateAll,
            ..RobotConfig::default()
        };
        let (mut d, board) = dispatcher_with(config);
        let reply = call(&mut d, "motor/set", json!({ "motorA": 120, "motorB": -256 }));
        assert_eq!(error_code(&reply), "INVALID_MOTOR_SPEED");
        assert!(d.motors().speeds().values().all(|&s| s == 0));
        assert!(board.log().is_empty());
    }

    #[test]
    fn test_motor_non_integer_field() {
        let (mut d, _board) = dispatcher();
        let reply = call(&mut d, "motor/set", json!({ "motorA": "fast" }));
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
        let reply = call(&mut d, "motor/set", json!({ "motorA": 12.5 }));
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
    }

    #[test]
    fn test_stop_all() {
        let (mut d, board) = dispatcher();
        call(&mut d, "motor/set", json!({ "motorA": 200, "motorB": -150 }));
        let reply = d.handle_path("motor/stop", None).body;
        assert_eq!(reply, json!({ "success": true, "message": "All motors stopped" }));
        let speeds = d.handle_path("motor/get", None).body;
        assert_eq!(speeds["motorA"], 0);
        assert_eq!(speeds["motorB"], 0);
        for pin in [14, 13, 12, 11] {
            assert_eq!(board.duty(pin), Some(0));
        }
    }

    #[test]
    fn test_camera_step_and_clamp() {
        let (mut d, board) = dispatcher();
        let reply = call(&mut d, "camera/step", json!({ "pan_delta": 50 }));
        assert_eq!(reply["pan_pwm"], 350);
        let reply = call(&mut d, "camera/step", json!({ "pan_delta": 200 }));
        assert_eq!(reply["pan_pwm"], 450);
        assert_eq!(board.pulse(DEFAULT_PAN_CHANNEL), Some(450));
        let reply = d.handle_path("camera/center", None).body;
        assert_eq!(reply["pan_pwm"], 300);
    }

    #[test]
    fn test_camera_field_validation() {
        let (mut d, _board) = dispatcher();
        let reply = call(&mut d, "camera/pwm", json!({ "pan_pwm": 5000 }));
        assert_eq!(error_code(&reply), "INVALID_PULSE_VALUE");
        let reply = call(&mut d, "camera/pwm", json!({}));
        assert_eq!(error_code(&reply), "NO_INPUT_DATA");
        let reply = call(&mut d, "camera/step", json!({ "tilt_delta": -5000 }));
        assert_eq!(error_code(&reply), "INVALID_PULSE_VALUE");
        let reply = call(&mut d, "camera/calibrate/limits", json!({ "pan_min": 100 }));
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
        let reply = call(
            &mut d,
            "camera/calibrate/limits",
            json!({ "pan_min": 400, "pan_max": 200 }),
        );
        assert_eq!(error_code(&reply), "INVALID_RANGE");
        let reply = call(&mut d, "camera/pulse", json!({ "pan_pwm": 350, "duration_ms": 100 }));
        assert_eq!(error_code(&reply), "UNSUPPORTED_IN_MODE");
    }

    #[test]
    fn test_camera_pulse_duration_is_capped() {
        let mut config = RobotConfig::default();
        config.camera.mode = CameraMode::ContinuousRotation;
        let (mut d, board) = dispatcher_with(config);

        let reply = call(
            &mut d,
            "camera/pulse",
            json!({ "pan_pwm": 380, "tilt_pwm": 300, "duration_ms": 60000 }),
        );
        assert_eq!(reply["success"], true);
        assert!(board.log().contains(&SimWrite::Hold(Duration::from_millis(5000))));

        let reply = call(&mut d, "camera/pulse", json!({ "pan_pwm": 380 }));
        assert_eq!(error_code(&reply), "MALFORMED_INPUT");
        let reply = call(&mut d, "camera/step", json!({ "pan_delta": 10 }));
        assert_eq!(error_code(&reply), "UNSUPPORTED_IN_MODE");
    }

    #[test]
    fn test_status() {
        let (mut d, _board) = dispatcher();
        let reply = d.handle_path("status", None).body;
        assert_eq!(
            reply,
            json!({
                "status": "ok",
                "servos_count": 16,
                "motors_count": 4,
                "camera_mode": "positional",
                "simulated": true
            })
        );
    }

    #[test]
    fn test_firmware_upload_requests_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RobotConfig::default();
        config.ota.staging_path = dir.path().join("pending.bin");
        config.ota.max_image_bytes = 16;
        let (mut d, _board) = dispatcher_with(config);

        let reply = d.handle_path("ota/upload", Some(&[0xE9u8, 0, 1][..]));
        assert!(reply.restart);
        assert_eq!(reply.body["bytes"], 3);

        let reply = d.handle_path("ota/upload", Some(&[0u8; 17][..]));
        assert!(!reply.restart);
        assert_eq!(error_code(&reply.body), "FIRMWARE_UPDATE_FAILED");

        let reply = d.handle_path("ota/upload", None);
        assert_eq!(error_code(&reply.body), "NO_INPUT_DATA");
    }
}
