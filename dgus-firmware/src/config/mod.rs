//! Configuration loading
//!
//! The port configuration is `bridge.toml`, embedded at build time and
//! validated by `build.rs`. It is parsed again at boot with the no_std
//! parser from `dgus-core`.

use defmt::*;

use dgus_core::config::{parse_config, BridgeConfig};

/// Embedded configuration (compiled into firmware)
/// Edit bridge.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../../bridge.toml");

/// Parse the embedded configuration, falling back to defaults
pub fn load_config() -> BridgeConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Loaded bridge.toml: {} ports", config.ports.len());
            config
        }
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using default configuration");
            BridgeConfig::default()
        }
    }
}
