// Zenoh binding for the command dispatcher
//
// Queries on <prefix>/api/** are routed by their key suffix and answered with
// a JSON document. Samples on <prefix>/cmd/motor are fire-and-forget motor
// commands. Everything runs in this one task, so commands are applied one at
// a time in arrival order.

use tokio::task::block_in_place;
use tracing::{info, warn};

use crate::config::{HardwareConfig, RobotConfig};
use crate::dispatch::{CommandDispatcher, Route};
use crate::hw::{MotorPins, PwmLink, PwmOutput, SimBackend};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type BoardDispatcher =
    CommandDispatcher<Box<dyn PwmOutput + Send>, Box<dyn MotorPins + Send>>;

/// Why the runtime loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// A firmware image was staged; the process must restart to apply it
    Restart,
    /// Interrupted, or the Zenoh session went away
    Stopped,
}

/// Open the actuator board, or the simulated one when hardware is disabled.
/// Returns the servo output, the motor pins, and whether it is simulated.
fn open_board(
    config: &HardwareConfig,
) -> Result<(Box<dyn PwmOutput + Send>, Box<dyn MotorPins + Send>, bool), BoxError> {
    if !config.enabled {
        info!("Hardware disabled, using simulated board");
        let board = SimBackend::new();
        return Ok((Box::new(board.clone()), Box::new(board), true));
    }

    info!(
        "Opening serial port {} at {} baud...",
        config.port, config.baudrate
    );
    let mut link = PwmLink::open_with_baudrate(&config.port, config.baudrate)?;
    for addr in 0..2 {
        if !link.ping(addr)? {
            return Err(format!("PWM board {} not responding on {}", addr, config.port).into());
        }
        info!("PWM board {} responding", addr);
    }
    let pins = link.try_clone()?;
    Ok((Box::new(link), Box::new(pins), false))
}

pub async fn run(config: RobotConfig) -> Result<Shutdown, BoxError> {
    let (pwm, pins, simulated) = open_board(&config.hardware)?;
    let mut dispatcher: BoardDispatcher =
        CommandDispatcher::start(pwm, pins, &config, simulated)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let prefix = config.transport.key_prefix.as_str();
    let api_key = format!("{prefix}/api/**");
    let api_root = format!("{prefix}/api/");
    let motor_key = format!("{prefix}/cmd/motor");

    let queryable = session.declare_queryable(api_key.as_str()).await?;
    let subscriber = session.declare_subscriber(motor_key.as_str()).await?;

    info!(
        "Runtime started ({}), camera mode: {}",
        if simulated { "simulated" } else { "hardware" },
        config.camera.mode.as_str()
    );
    info!("Serving queries on: {}", api_key);
    info!("Subscribed to: {}", motor_key);

    // Created once so a Ctrl-C during a blocking hold is still seen
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let shutdown = loop {
        tokio::select! {
            query = queryable.recv_async() => {
                let Ok(query) = query else {
                    warn!("Queryable closed");
                    break Shutdown::Stopped;
                };
                let path = query
                    .key_expr()
                    .as_str()
                    .strip_prefix(api_root.as_str())
                    .unwrap_or_default()
                    .to_string();
                let body = query.payload().map(|payload| payload.to_bytes());

                // Camera pulse mode blocks for its hold duration
                let reply = block_in_place(|| dispatcher.handle_path(&path, body.as_deref()));

                if let Err(e) = query
                    .reply(query.key_expr().clone(), reply.body.to_string())
                    .await
                {
                    warn!("Failed to reply to '{}': {}", path, e);
                }
                if reply.restart {
                    info!("Firmware staged, restarting");
                    break Shutdown::Restart;
                }
            }
            sample = subscriber.recv_async() => {
                let Ok(sample) = sample else {
                    warn!("Motor command subscriber closed");
                    break Shutdown::Stopped;
                };
                let payload = sample.payload().to_bytes();
                if let Err(e) =
                    block_in_place(|| dispatcher.handle(Route::MotorSet, Some(payload.as_ref())))
                {
                    warn!("Rejected motor command: {}", e);
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break Shutdown::Stopped;
            }
        }
    };

    dispatcher.shutdown();
    Ok(shutdown)
}
