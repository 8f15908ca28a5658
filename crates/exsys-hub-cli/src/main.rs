//! Command-line control for Exsys managed USB hubs

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use exsys_hub_core::config::HubConfig;
use exsys_hub_core::demo::SimulatedHub;
use exsys_hub_core::hub::{HubIdentity, HubSession, PortState};
use exsys_hub_core::protocol::{list_ports, probe, SerialTransport, Transport};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEMO_PORTS: u8 = 8;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON hub configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overrides the config file
    #[arg(short, long)]
    port: Option<String>,

    /// Talk to a simulated hub instead of a serial port
    #[arg(long)]
    demo: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: HubCommand,
}

#[derive(Subcommand, Debug)]
enum HubCommand {
    /// List serial ports that may have a hub attached
    ListPorts,
    /// Check that the port answers like an Exsys hub
    Probe,
    /// Show hub identity and port states
    Status,
    /// Power a port on (ports are numbered from 1)
    On { port: usize },
    /// Power a port off (ports are numbered from 1)
    Off { port: usize },
    /// Reset the hub
    Reset,
    /// Restore factory defaults
    RestoreDefaults,
    /// Store the current port states as start-up states
    Save,
}

#[derive(Serialize)]
struct StatusReport {
    name: String,
    address: String,
    identity: Option<HubIdentity>,
    ports: Option<PortState>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    match args.command {
        HubCommand::ListPorts => {
            let ports = list_ports();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&ports)?);
            } else if ports.is_empty() {
                println!("No serial ports found");
            } else {
                for port in ports {
                    match port.product {
                        Some(product) => println!("{}\t{}", port.name, product),
                        None => println!("{}", port.name),
                    }
                }
            }
            Ok(())
        }
        HubCommand::Probe => {
            let mut transport = open_transport(&config, args.demo)?;
            let identity = probe(transport.as_mut()).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&identity)?);
            } else {
                println!("{}", identity);
            }
            Ok(())
        }
        command => {
            let hub = connect(&config, args.demo).await?;
            run(&hub, command).await?;
            report(&hub, args.json)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<HubConfig> {
    let mut config = match &args.config {
        Some(path) => HubConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => HubConfig::default(),
    };
    if let Some(port) = &args.port {
        config.port = Some(port.clone());
    }
    config.validate()?;
    Ok(config)
}

fn open_transport(config: &HubConfig, demo: bool) -> Result<Box<dyn Transport>> {
    if demo {
        return Ok(Box::new(SimulatedHub::new(DEMO_PORTS)));
    }
    let port = config
        .port
        .as_deref()
        .context("No serial port given (use --port or a config file)")?;
    Ok(Box::new(
        SerialTransport::new(port, config.baud_rate)
            .with_timeout(Duration::from_millis(config.timeout_ms)),
    ))
}

async fn connect(config: &HubConfig, demo: bool) -> Result<HubSession> {
    let hub = if demo {
        HubSession::new(
            config.name.clone(),
            "demo",
            Box::new(SimulatedHub::new(DEMO_PORTS)),
        )
    } else {
        HubSession::from_config(config)?
    };
    hub.setup()
        .await
        .with_context(|| format!("Hub on {} is not ready", hub.address()))?;
    Ok(hub)
}

async fn run(hub: &HubSession, command: HubCommand) -> Result<()> {
    let ok = match command {
        HubCommand::Status => true,
        HubCommand::On { port } => hub.set_port_state(port_index(hub, port)?, true).await,
        HubCommand::Off { port } => hub.set_port_state(port_index(hub, port)?, false).await,
        HubCommand::Reset => hub.reset_hub().await,
        HubCommand::RestoreDefaults => hub.restore_factory_defaults().await,
        HubCommand::Save => hub.save_port_states().await,
        other => bail!("{:?} does not run against a hub session", other),
    };
    if !ok {
        bail!("Hub did not accept the command");
    }
    Ok(())
}

/// Convert a 1-based port number into a checked index
fn port_index(hub: &HubSession, port: usize) -> Result<usize> {
    let count = usize::from(hub.port_count().unwrap_or(0));
    if port == 0 || port > count {
        bail!("Port {} does not exist (hub has {} ports)", port, count);
    }
    Ok(port - 1)
}

fn report(hub: &HubSession, json: bool) -> Result<()> {
    let status = StatusReport {
        name: hub.name().to_string(),
        address: hub.address().to_string(),
        identity: hub.identity(),
        ports: hub.cached_ports(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{} on {}", status.name, status.address);
    if let Some(identity) = &status.identity {
        println!("  {}", identity);
    }
    if let Some(ports) = &status.ports {
        println!("  {}", ports);
    }
    Ok(())
}
