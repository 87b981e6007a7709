//! Build script for dgus-firmware
//!
//! - Sets up linker search paths and scripts for memory.x
//! - Validates bridge.toml at compile time

use std::collections::HashSet;
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ports this board wires to a UART
const BOARD_PORTS: [i64; 2] = [2, 3];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate bridge.toml configuration at compile time
fn validate_config() {
    // Re-run if bridge.toml changes
    println!("cargo:rerun-if-changed=bridge.toml");

    let config_path = Path::new("bridge.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: bridge.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds bridge.toml as its port configuration.      ║\n\
            ║  Please create one in the dgus-firmware directory.               ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bridge.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    // Parse and validate TOML syntax
    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in bridge.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_bridge(&config, &mut errors);
    validate_ports(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid settings in bridge.toml                          ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=bridge.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validate the optional [bridge] section
fn validate_bridge(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(bridge) = config.get("bridge") else {
        return;
    };
    for key in ["poll_interval_ms", "tx_spin_budget"] {
        if let Some(value) = bridge.get(key) {
            match value.as_integer() {
                Some(n) if (0..=u32::MAX as i64).contains(&n) => {}
                _ => errors.push(format!("bridge.{} must be a non-negative integer", key)),
            }
        }
    }
}

/// Validate [uart.N] sections
fn validate_ports(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(uarts) = config.get("uart").and_then(|u| u.as_table()) else {
        errors.push("Missing [uart.N] section - at least one port is required".into());
        return;
    };

    let mut seen = HashSet::new();
    for (name, port) in uarts {
        let id: i64 = match name.parse() {
            Ok(id) if (2..=5).contains(&id) => id,
            _ => {
                errors.push(format!("[uart.{}]: port must be 2, 3, 4 or 5", name));
                continue;
            }
        };
        if !seen.insert(id) {
            errors.push(format!("[uart.{}]: duplicate port", id));
        }
        if !BOARD_PORTS.contains(&id) {
            println!(
                "cargo:warning=[uart.{}] has no UART on this board and will be idle",
                id
            );
        }

        // Optional, the firmware falls back to 115200
        if let Some(baud) = port.get("baudrate") {
            match baud.as_integer() {
                Some(b) if b > 0 && b <= u32::MAX as i64 => {}
                _ => errors.push(format!("[uart.{}]: baudrate out of range", id)),
            }
        }

        if let Some(bits) = port.get("data_bits") {
            if !matches!(bits.as_integer(), Some(7 | 8)) {
                errors.push(format!("[uart.{}]: data_bits must be 7 or 8", id));
            }
        }
        if let Some(parity) = port.get("parity") {
            if !matches!(parity.as_str(), Some("none" | "even" | "odd")) {
                errors.push(format!("[uart.{}]: parity must be \"none\", \"even\" or \"odd\"", id));
            }
        }
        if let Some(bits) = port.get("stop_bits") {
            if !matches!(bits.as_integer(), Some(1 | 2)) {
                errors.push(format!("[uart.{}]: stop_bits must be 1 or 2", id));
            }
        }

        for key in ["response", "crc", "upload"] {
            if let Some(value) = port.get(key) {
                if value.as_bool().is_none() {
                    errors.push(format!("[uart.{}]: {} must be true or false", id, key));
                }
            }
        }

        if let Some(settle) = port.get("settle_ms") {
            match settle.as_integer() {
                Some(n) if (0..=u32::MAX as i64).contains(&n) => {}
                _ => errors.push(format!("[uart.{}]: settle_ms must be a non-negative integer", id)),
            }
        }
    }
}
