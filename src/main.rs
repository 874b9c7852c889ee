//! fmd: Find My Device.
//!
//! Announces this device on the local network and listens for the
//! announcements of others.

mod advertise;
mod cli;
mod listen;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use fmd::{Config, GeneralOverrides, Message, device, load_config};

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG, with the CLI flag as fallback
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let overrides = cli.overrides();
    let config_path = cli.config;

    match cli.command {
        Some(Commands::Advertise {
            interval,
            group,
            device_name,
        }) => {
            let mut config = read_config(config_path, &overrides)?;
            if let Some(interval) = interval {
                config.advertise.interval = interval;
            }
            if let Some(group) = group {
                config.advertise.group = group;
            }
            if let Some(device_name) = device_name {
                config.advertise.device_name = device_name;
            }
            block_on(advertise::run(config))
        }
        Some(Commands::Listen { timeout }) => {
            let mut config = read_config(config_path, &overrides)?;
            if let Some(timeout) = timeout {
                config.listen.timeout = timeout;
            }
            block_on(listen::run(config))
        }
        Some(Commands::Info { json }) => {
            let config = read_config(config_path, &overrides)?;
            cmd_info(&config, json)
        }
        Some(Commands::GenerateConfig) => cmd_generate_config(),
        None => {
            // Default: show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn read_config(path: Option<PathBuf>, overrides: &GeneralOverrides) -> Result<Config> {
    let config = load_config(path.as_deref(), overrides)?;
    tracing::debug!(?config, "Effective configuration");
    Ok(config)
}

fn block_on<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    rt.block_on(future)
}

fn cmd_info(config: &Config, json: bool) -> Result<()> {
    let information = device::information(&config.advertise);

    if json {
        let message = Message::from(information);
        println!("{}", serde_json::to_string_pretty(&message)?);
        return Ok(());
    }

    println!("Device:           {}", information.device_name);
    println!("Host:             {}", information.host_name);
    if !information.group.is_empty() {
        println!("Group:            {}", information.group);
    }
    println!("Operating system: {}", information.operating_system);

    for iface in &information.network_interfaces {
        println!();
        match &iface.interface.hardware_addr {
            Some(mac) => println!("{} (index {}, {})", iface.interface.name, iface.interface.index, mac),
            None => println!("{} (index {})", iface.interface.name, iface.interface.index),
        }
        for address in &iface.addresses {
            println!("  {}", address.address);
        }
    }

    Ok(())
}

fn cmd_generate_config() -> Result<()> {
    let config = Config::default();
    println!("{}", config.to_json()?);
    Ok(())
}
