// Keyboard teleop: W/S throttle, A/D steer, R/F speed, Space stop, Q quit
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

use rover_actuator_runtime::config::DEFAULT_KEY_PREFIX;
use rover_actuator_runtime::motor::{SideSpeeds, tank_mix};

const SPEED_LEVELS: [i16; 3] = [30, 60, 100]; // stick units, -100..=100
const SPEED_LABELS: [&str; 3] = ["LOW", "MED", "HIGH"];
const PUBLISH_PERIOD: Duration = Duration::from_millis(50); // ~20 Hz
const INPUT_TIMEOUT: Duration = Duration::from_millis(250); // Stop after this long with no key

#[derive(Parser, Debug)]
#[command(about = "Drive the rover from the keyboard")]
struct Args {
    /// Zenoh key prefix of the runtime
    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let key = format!("{}/cmd/motor", args.prefix);
    let publisher = session.declare_publisher(key.clone()).await?;

    info!("Publishing to: {}", key);
    info!("Controls: W/S=throttle, A/D=steer, R/F=speed, Space=stop, Q=quit");
    print_speed(0);

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the base stopped
    publisher
        .put(Value::Object(SideSpeeds::zero().to_motor_payload()).to_string())
        .await?;
    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut level: usize = 0;
    let mut throttle: i16 = 0;
    let mut steering: i16 = 0;
    let mut last_input = Instant::now();
    let mut last_publish = Instant::now();

    loop {
        if event::poll(Duration::from_millis(10))?
            && let Event::Key(KeyEvent { code, kind, .. }) = event::read()?
        {
            let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
            let speed = SPEED_LEVELS[level];

            match code {
                KeyCode::Char('w') if pressed => {
                    throttle = speed;
                    last_input = Instant::now();
                }
                KeyCode::Char('s') if pressed => {
                    throttle = -speed;
                    last_input = Instant::now();
                }
                // Positive steering speeds up the right side, turning left
                KeyCode::Char('a') if pressed => {
                    steering = speed;
                    last_input = Instant::now();
                }
                KeyCode::Char('d') if pressed => {
                    steering = -speed;
                    last_input = Instant::now();
                }
                KeyCode::Char(' ') if pressed => {
                    throttle = 0;
                    steering = 0;
                }

                KeyCode::Char('r') if pressed => {
                    level = (level + 1).min(SPEED_LEVELS.len() - 1);
                    print_speed(level);
                }
                KeyCode::Char('f') if pressed => {
                    level = level.saturating_sub(1);
                    print_speed(level);
                }

                KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                _ => {}
            }
        }

        if last_input.elapsed() > INPUT_TIMEOUT {
            throttle = 0;
            steering = 0;
        }

        if last_publish.elapsed() >= PUBLISH_PERIOD {
            let payload = tank_mix(throttle, steering).to_motor_payload();
            publisher.put(Value::Object(payload).to_string()).await?;
            last_publish = Instant::now();
        }
    }

    Ok(())
}

fn print_speed(level: usize) {
    info!("Speed: {}", SPEED_LABELS[level]);
}
