use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mycobot_controller::{
    cobot_driver::SimulatedConnector, component_config::MachineConfig, kinematics,
    resource::Registry,
};
use mycobot_module::{
    logging,
    machine::Machine,
    simulation::{self, PickCycle},
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a machine config and print implicit dependencies
    Validate {
        /// JSON or YAML machine config
        config: PathBuf,
    },
    /// List the supported api and model pairs
    Models,
    /// Write the arm's URDF
    Kinematics {
        /// Output file, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a pick cycle against a simulated arm
    Simulate {
        /// Machine config, the packaged one if omitted
        config: Option<PathBuf>,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbose, args.json_logs);

    let registry = Registry::with_connector(Arc::new(SimulatedConnector::new()));

    match args.command {
        Command::Validate { config } => validate(&registry, &config)?,
        Command::Models => {
            for (api, model) in registry.models() {
                println!("{} {}", api, model);
            }
        }
        Command::Kinematics { output } => {
            let (_format, urdf) = kinematics::included_kinematics();
            match output {
                Some(path) => std::fs::write(&path, urdf)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => print!("{}", String::from_utf8_lossy(&urdf)),
            }
        }
        Command::Simulate { config, cycles } => {
            let config = match config {
                Some(path) => MachineConfig::load(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => MachineConfig::included()?,
            };
            simulate(&registry, &config, cycles).await?;
        }
    }
    Ok(())
}

fn validate(registry: &Registry, path: &Path) -> Result<()> {
    let config = MachineConfig::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let order = Machine::validate(&config, registry)?;
    for (name, dependencies) in order {
        println!("{}: {}", name, serde_json::to_string(&dependencies)?);
    }
    tracing::info!("{} is valid", path.display());
    Ok(())
}

async fn simulate(registry: &Registry, config: &MachineConfig, cycles: Option<u32>) -> Result<()> {
    let machine = Machine::build(config, registry).await?;

    let keep_running = Arc::new(AtomicBool::new(true));

    tokio::spawn({
        let keep_running = keep_running.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Detected Ctrl+c");
                keep_running.store(false, Ordering::Relaxed);
            }
        }
    });

    let settings = PickCycle {
        cycles,
        pause: Duration::from_secs(1),
    };
    let completed = simulation::run(machine, settings, keep_running).await?;
    tracing::info!("Completed {} pick cycles", completed);
    Ok(())
}
