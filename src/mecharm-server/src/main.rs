// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use mecharm_app::{init_logging, ConfigFile};
use mecharm_backend::{register_builtin_backends_on, RegistrationContext};
use mecharm_bus::{Bus, BusMessage, LocalBus};
use mecharm_client::Controller;
use mecharm_core::arm::ArmAccess;
use mecharm_core::motion::MoveTarget;
use mecharm_core::DynResult;
use mecharm_protocol::{decode_event, TopicRouter};

use mecharm_server::{run_engine, ArmWorker, EngineConfig, ServerConfig};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - robot arm session daemon");
const DEMO_READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Arm backend to use (e.g. mycobot, sim)
    #[arg(short = 'a', long = "arm")]
    arm: Option<String>,
    /// Access method to reach the arm
    #[arg(long = "access", value_enum)]
    access: Option<AccessKind>,
    /// Device id this arm answers to on the bus
    #[arg(short = 'd', long = "device-id")]
    device_id: Option<String>,
    /// Run a scripted demo controller against the local bus, then exit
    #[arg(long = "demo")]
    demo: bool,
    /// Arm serial address: <path> <baud>
    #[arg(value_name = "ARM_ADDR")]
    arm_addr: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AccessKind {
    Serial,
    Sim,
}

/// Parse a serial arm address of the form "<path> <baud>".
fn parse_serial_addr(addr: &str) -> DynResult<(String, u32)> {
    let mut parts = addr.split_whitespace();
    let path = parts
        .next()
        .ok_or("Serial arm address must be '<path> <baud>'")?;
    let baud_str = parts
        .next()
        .ok_or("Serial arm address must be '<path> <baud>'")?;
    if parts.next().is_some() {
        return Err("Serial arm address must be '<path> <baud>' (got extra data)".into());
    }
    let baud: u32 = baud_str
        .parse()
        .map_err(|e| format!("Invalid baud '{}': {}", baud_str, e))?;
    Ok((path.to_string(), baud))
}

/// Resolved configuration after merging config file and CLI arguments.
struct ResolvedConfig {
    arm: String,
    access: ArmAccess,
    device_id: String,
}

fn resolve_config(
    cli: &Cli,
    cfg: &ServerConfig,
    registry: &RegistrationContext,
) -> DynResult<ResolvedConfig> {
    let arm_str = cli.arm.clone().or_else(|| cfg.arm.model.clone());
    let arm = match arm_str {
        Some(name) => name,
        None if cli.demo => "sim".to_string(),
        None => {
            return Err("Arm model not specified. Use --arm or set [arm].model in config.".into())
        }
    };
    if !registry.is_backend_registered(&arm) {
        return Err(format!(
            "Unknown arm model: {} (available: {})",
            arm,
            registry.registered_backends().join(", ")
        )
        .into());
    }

    let access_type = cli
        .access
        .map(|a| match a {
            AccessKind::Serial => "serial",
            AccessKind::Sim => "sim",
        })
        .or(cfg.arm.access.access_type.as_deref());
    let access = match access_type {
        Some("sim") => ArmAccess::Sim,
        Some("serial") => serial_access(cli, cfg)?,
        Some(other) => return Err(format!("Unknown access type: {}", other).into()),
        None => {
            let has_serial_config =
                cfg.arm.access.port.is_some() && cfg.arm.access.baud.is_some();
            if cli.arm_addr.is_some() || has_serial_config {
                serial_access(cli, cfg)?
            } else if arm == "sim" {
                ArmAccess::Sim
            } else {
                return Err("Serial access requires port and baud. Use '<path> <baud>' argument or set [arm.access].port and .baud in config.".into());
            }
        }
    };

    let device_id = cli
        .device_id
        .clone()
        .unwrap_or_else(|| cfg.general.device_id.clone());

    Ok(ResolvedConfig {
        arm,
        access,
        device_id,
    })
}

fn serial_access(cli: &Cli, cfg: &ServerConfig) -> DynResult<ArmAccess> {
    let (path, baud) = if let Some(ref addr) = cli.arm_addr {
        parse_serial_addr(addr)?
    } else if let (Some(port), Some(baud)) = (&cfg.arm.access.port, cfg.arm.access.baud) {
        (port.clone(), baud)
    } else {
        return Err("Serial access requires port and baud. Use '<path> <baud>' argument or set [arm.access].port and .baud in config.".into());
    };
    Ok(ArmAccess::Serial { path, baud })
}

/// Scripted demo controller: take the lease, sweep the joints, put them
/// back and close the session. Exercises the whole action/event path on
/// the local bus without any hardware.
async fn run_demo(
    bus: Arc<dyn Bus>,
    device_id: &str,
    mut ready_rx: broadcast::Receiver<BusMessage>,
) -> DynResult<()> {
    // The engine announces itself with a device_status broadcast.
    let msg = tokio::time::timeout(DEMO_READY_TIMEOUT, ready_rx.recv()).await??;
    let event = decode_event(&msg.payload)?;
    info!("Demo: device announced itself ({})", event.name());

    let controller = Controller::with_client_id(bus, device_id, "demo".to_string());
    let mut session = controller.begin_session().await?;
    info!("Demo: session {} created", session.session_id());

    let target = MoveTarget::Angles {
        degrees: [30.0, -20.0, 15.0, 0.0, 10.0, -5.0],
    };
    let position = session
        .move_observed(target, Some(40), |obs| {
            info!(
                "Demo: progress {} (joint 1 at {:.1} deg)",
                obs.progress_seq, obs.current_position.joints[0]
            );
        })
        .await?;
    info!("Demo: sweep complete (joint 1 at {:.1} deg)", position.joints[0]);

    let position = session.move_joint(1, 0.0, 60).await?;
    info!("Demo: joint 1 back at {:.1} deg", position.joints[0]);

    let exit_code = session.exit(0).await?;
    info!("Demo: session closed with exit code {}", exit_code);
    Ok(())
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let mut bootstrap_ctx = RegistrationContext::new();
    register_builtin_backends_on(&mut bootstrap_ctx);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml());
        return Ok(());
    }

    let (cfg, config_path) = ServerConfig::resolve(cli.config.as_deref())?;
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let resolved = resolve_config(&cli, &cfg, &bootstrap_ctx)?;

    match &resolved.access {
        ArmAccess::Serial { path, baud } => {
            info!(
                "Starting mecharm-server (arm: {}, device: {}, access: serial {} @ {} baud)",
                resolved.arm, resolved.device_id, path, baud
            );
        }
        ArmAccess::Sim => {
            info!(
                "Starting mecharm-server (arm: {}, device: {}, access: sim)",
                resolved.arm, resolved.device_id
            );
        }
    }

    let driver = bootstrap_ctx.build_arm(&resolved.arm, resolved.access.clone())?;
    let (worker, updates) = ArmWorker::spawn(
        driver,
        Duration::from_millis(cfg.behavior.progress_poll_ms),
    );

    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let topics = TopicRouter::new(resolved.device_id.clone());

    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine_config = EngineConfig {
        bus: Arc::clone(&bus),
        device_id: resolved.device_id.clone(),
        default_speed: cfg.arm.default_speed,
        inactivity_timeout: Duration::from_millis(cfg.behavior.inactivity_timeout_ms),
        queue_warn_depth: cfg.behavior.queue_warn_depth,
    };

    // The demo subscribes before the engine starts, so the engine's boot
    // broadcast cannot slip past it.
    let demo_ready = cli.demo.then(|| bus.subscribe(&topics.device_up()));

    let engine_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) = run_engine(engine_config, worker, updates, engine_shutdown_rx).await {
            error!("Engine task error: {:?}", e);
        }
    }));

    if let Some(ready_rx) = demo_ready {
        if let Err(e) = run_demo(Arc::clone(&bus), &resolved.device_id, ready_rx).await {
            error!("Demo error: {:?}", e);
        }
        info!("Demo finished, shutting down");
    } else {
        signal::ctrl_c().await?;
        info!("Ctrl+C received, shutting down");
    }

    let _ = shutdown_tx.send(true);
    tokio::time::sleep(Duration::from_millis(400)).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    Ok(())
}
