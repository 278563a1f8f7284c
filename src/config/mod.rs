//! Configuration for the registry bridge.
//!
//! Sources, lowest to highest priority:
//! 1. Hardcoded defaults
//! 2. `config/bridge.toml` (optional)
//! 3. An explicit path handed to [`Settings::load`]
//! 4. The file named by `BRIDGE_CONFIG`
//! 5. `BRIDGE__*` environment variables

mod bridge;
mod monitoring;
mod network;

pub use bridge::*;
pub use monitoring::*;
pub use network::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::errors::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Bridge identity: namespace scope and RPC listen address
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Metrics endpoint settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// gRPC transport tuning
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::with_name("config/bridge").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        if let Ok(path) = env::var("BRIDGE_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }
        builder = builder.add_source(Environment::with_prefix("BRIDGE").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.monitoring.validate()?;
        Ok(settings)
    }
}
