// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the hydrobridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the water network Modbus bridge

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use log::{error, info};

use hydrobridge::config::Config;
use hydrobridge::orchestrator::CycleOrchestrator;
use hydrobridge::simulation::{AssetClass, SimulationAdapter};

/// Run a simulated water network against Modbus field controls
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// EPANET-style network description file (.inp)
    network: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    match run(args).await {
        Ok(()) => println!("Stopped by user"),
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    if args.network.extension().and_then(|e| e.to_str()) != Some("inp") {
        bail!(
            "network file must be an EPANET .inp file: {}",
            args.network.display()
        );
    }

    let config = Config::default();
    let sim = SimulationAdapter::load(&args.network, config.hydraulic_step_seconds)?;
    print_overview(&sim);

    // The handler only raises the flag; the orchestrator picks it up at the
    // next cycle boundary.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing the current cycle");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let mut orchestrator = CycleOrchestrator::new(config, sim, shutdown);
    orchestrator.run().await?;
    Ok(())
}

fn print_overview(sim: &SimulationAdapter) {
    println!("Network overview:");
    println!("{}", "-".repeat(32));
    for class in AssetClass::ALL {
        println!("{:>10} : {}", class.plural(), sim.asset_count(class));
    }
}
