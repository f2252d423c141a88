// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Retargeting monitor
//!
//! Runs a retargeting client against a fixed robot state and logs the
//! smoothed targets, for checking operator streams without a robot.
//!
//! Per-crate debug flags (`--debug-retarget-core`, `--debug-all`) and
//! `RETARGET_DEBUG` are honoured alongside the regular options.

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::UnitQuaternion;
use retarget::config::{load_config, validate_config};
use retarget::observability::{debug_flags_help, init_logging, parse_debug_flags};
use retarget::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Retargeting monitor - drive a retargeting client and log its targets
#[derive(Parser, Debug)]
#[command(name = "retarget_monitor", version, long_about = None)]
struct Args {
    /// Path to retarget_configuration.toml (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a configuration key, e.g. `--set control_period=0.02`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Number of control ticks to run (0 = until killed)
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Robot CoM height used to seed the client (meters)
    #[arg(long, default_value_t = 0.6)]
    com_height: f64,

    /// Log the targets every N ticks
    #[arg(long, default_value_t = 100)]
    report_every: u64,

    /// Attempts at `reset` while the CoM stream is not up yet
    #[arg(long, default_value_t = 10)]
    reset_attempts: u32,

    /// Print the per-crate debug flags and exit
    #[arg(long, default_value_t = false)]
    list_debug_flags: bool,
}

fn parse_overrides(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => Ok((key.trim().to_string(), value.trim().to_string())),
            None => bail!("Invalid override '{}', expected KEY=VALUE", pair),
        })
        .collect()
}

fn main() -> Result<()> {
    let debug_flags = parse_debug_flags();
    let args = Args::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));

    if args.list_debug_flags {
        println!("{}", debug_flags_help());
        return Ok(());
    }

    let overrides = parse_overrides(&args.overrides)?;
    let config = load_config(args.config.as_deref(), Some(&overrides))
        .context("Failed to load retargeting configuration")?;
    validate_config(&config).context("Invalid retargeting configuration")?;

    let _logging = init_logging(&debug_flags, retarget::logging_config(&config.logging))?;

    info!("🦀 Retarget monitor v{}", retarget::retargeting::VERSION);
    info!("  Module: {}", config.control.module_name);
    info!("  Period: {}s", config.control.period);
    info!("  Backend: {:?}", config.transport.backend);

    let transports = retarget::open_transports(&config.transport)?;
    let mut client =
        retarget::client_from_config(&config, transports.as_ref(), Arc::new(SystemClock::new()))?;

    let state = StaticKinematics::new(config.control.controlled_joints.len())
        .with_com_height(args.com_height);
    reset_with_retries(&mut client, &state, args.reset_attempts)?;
    client.start_approaching_phase();

    let period = Duration::from_secs_f64(config.control.period);
    let mut deadline = Instant::now();
    let mut tick: u64 = 0;
    while args.ticks == 0 || tick < args.ticks {
        client.tick();
        client.set_robot_base_orientation(&UnitQuaternion::identity());
        tick += 1;

        if args.report_every > 0 && tick % args.report_every == 0 {
            report(&client, tick);
        }

        deadline += period;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        } else {
            deadline = now;
        }
    }

    client.close();
    info!("Stopped after {} ticks", tick);
    Ok(())
}

fn reset_with_retries(
    client: &mut RetargetingClient,
    state: &StaticKinematics,
    attempts: u32,
) -> Result<()> {
    for attempt in 1..=attempts.max(1) {
        match client.reset(state) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!("Reset attempt {}/{} failed: {}", attempt, attempts, e);
            }
            Err(e) => return Err(e).context("Failed to reset the retargeting client"),
        }
    }
    bail!("Failed to reset the retargeting client")
}

fn report(client: &RetargetingClient, tick: u64) {
    let features = client.features();
    info!(
        "[tick {}] phase={} com={:.4}m ({:+.4}m/s)",
        tick,
        client.phase(),
        client.com_height(),
        client.com_height_velocity()
    );
    if features.hand {
        let left = client.left_hand_transform().translation.vector;
        let right = client.right_hand_transform().translation.vector;
        info!(
            "  hands: left=[{:.3}, {:.3}, {:.3}] right=[{:.3}, {:.3}, {:.3}]",
            left.x, left.y, left.z, right.x, right.y, right.z
        );
    }
    if features.joint {
        info!("  joints: {:.3?}", client.joint_values().as_slice());
    }
}
