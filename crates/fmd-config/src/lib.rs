//! Configuration for fmd.
//!
//! This crate provides the configuration structures shared by all commands,
//! their defaults, and JSON parsing.

mod config;
mod defaults;

pub use config::{
    AdvertiseConfig, Config, ConfigError, GeneralConfig, ListenConfig, parse_interface_list,
};
pub use defaults::{
    DEFAULT_ADVERTISE_INTERVAL, DEFAULT_MULTICAST_IP4, DEFAULT_MULTICAST_IP6, DEFAULT_PORT,
};
