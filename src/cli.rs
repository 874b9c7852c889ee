//! CLI definitions for the fmd command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fmd::{GeneralOverrides, VERSION};

/// Find devices on the local network
#[derive(Parser)]
#[command(name = "fmd")]
#[command(author, version = VERSION, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, short = 'L', default_value = "info", global = true, env = "FMD_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Path to a JSON configuration file
    #[arg(long, short = 'c', global = true, env = "FMD_CONFIG")]
    pub config: Option<PathBuf>,

    /// IPv4 multicast address (empty string disables IPv4)
    #[arg(long, global = true, env = "FMD_MULTICAST_IP4")]
    pub multicast_ip4: Option<String>,

    /// IPv6 multicast address (empty string disables IPv6)
    #[arg(long, global = true, env = "FMD_MULTICAST_IP6")]
    pub multicast_ip6: Option<String>,

    /// Comma-separated network interfaces for IPv6 multicast
    #[arg(long, global = true, env = "FMD_INTERFACE_IP6")]
    pub interface_ip6: Option<String>,

    /// UDP port
    #[arg(long, short = 'p', global = true, env = "FMD_PORT")]
    pub port: Option<u16>,
}

impl Cli {
    /// Command line overrides of the `General` configuration section.
    pub fn overrides(&self) -> GeneralOverrides {
        GeneralOverrides {
            multicast_ip4: self.multicast_ip4.clone(),
            multicast_ip6: self.multicast_ip6.clone(),
            interface_ip6: self.interface_ip6.clone(),
            port: self.port,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send device announcements on the local network
    Advertise {
        /// Seconds between advertisements
        #[arg(short = 'i', long)]
        interval: Option<u64>,

        /// Name to group related devices
        #[arg(short = 'g', long)]
        group: Option<String>,

        /// Device name (defaults to the host name)
        #[arg(short = 'n', long = "device-name")]
        device_name: Option<String>,
    },

    /// Listen for device announcements on the local network
    Listen {
        /// Stop after this many seconds (0 = until interrupted)
        #[arg(short = 't', long)]
        timeout: Option<u64>,
    },

    /// Show information about this device
    #[command(alias = "deviceinfo")]
    Info {
        /// Output as JSON
        #[arg(short = 'j', long)]
        json: bool,
    },

    /// Print the default configuration
    #[command(alias = "genconf")]
    GenerateConfig,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fmd",
            "advertise",
            "--device-name",
            "desk1",
            "--multicast-ip6",
            "",
            "--port",
            "6000",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.multicast_ip6.as_deref(), Some(""));
        assert_eq!(overrides.port, Some(6000));
        assert!(matches!(
            cli.command,
            Some(Commands::Advertise { device_name: Some(ref name), .. }) if name == "desk1"
        ));
    }
}
