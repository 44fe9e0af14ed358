//! Standalone tick-loop binary: parse args, load config, build the
//! controller, and run the RUNNING pipeline against a loopback adapter
//! set (§6 "external adapters ... spec only their contracts" — this
//! binary is the minimal concrete wiring, not a hardware driver).

use anyhow::Result;
use clap::Parser;
use hexapod_locomotion::adapters::{ActuatorAdapter, LoopbackActuatorAdapter};
use hexapod_locomotion::body_config::BodyGeometry;
use hexapod_locomotion::model::joint_targets::commands_for_body;
use hexapod_locomotion::parameters::ParameterFile;
use hexapod_locomotion::state_controller::{ControlInputs, StateController, SystemState};
use hexapod_locomotion::utilities::{self, RateTracker};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Hexapod locomotion control core, standalone tick loop.
#[derive(Parser, Debug)]
#[command(name = "hexctl")]
#[command(about = "Run the hexapod locomotion control pipeline against a loopback adapter set")]
struct Args {
    /// Path to a body geometry TOML file. Falls back to literal defaults.
    #[arg(long)]
    body_config: Option<PathBuf>,

    /// Path to a parameter TOML file. Falls back to literal defaults.
    #[arg(long)]
    parameters: Option<PathBuf>,

    /// Number of ticks to run before exiting (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Verbosity: repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utilities::start_loggers(args.verbose)?;

    if args.body_config.is_none() {
        info!("no --body-config given; using literal defaults (HEXAPOD_ env overrides still apply)");
    }
    if args.parameters.is_none() {
        info!("no --parameters given; using literal defaults (HEXAPOD_ env overrides still apply)");
    }
    let body_config = BodyGeometry::load_layered(args.body_config.as_deref())?;
    let parameters = ParameterFile::load_layered(args.parameters.as_deref())?;

    let mut controller = StateController::new(body_config, parameters);
    let time_delta = controller.parameters.time_delta;
    let mut inputs = ControlInputs {
        new_system_state: Some(SystemState::Running),
        ..Default::default()
    };

    let mut interval = tokio::time::interval(Duration::from_secs_f32(time_delta));
    let mut rate_tracker = RateTracker::new(50, Duration::from_secs(5));
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut actuators = LoopbackActuatorAdapter::default();
    actuators.init(&controller.model, controller.parameters.time_to_start).await?;

    let mut tick_count: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(error) = controller.tick(&mut inputs) {
                    warn!(%error, "fatal controller error; shutting down");
                    break;
                }
                inputs.new_system_state = None;
                let commands = commands_for_body(&controller.body_config.legs, &controller.model.joint_targets());
                actuators.publish(&commands).await?;
                rate_tracker.tick();
                if let Some(hz) = rate_tracker.report().await? {
                    info!(hz, "control loop tick rate");
                }
                tick_count += 1;
                if args.ticks != 0 && tick_count >= args.ticks {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("received ctrl-c, shutting down");
                break;
            }
        }
    }

    Ok(())
}
