//! Minimal parser for `bridge.toml`
//!
//! Handles only the subset the bridge configuration uses:
//! - `[bridge]` for bridge-wide settings
//! - `[uart.N]` for one port each (N = 2..=5)
//! - `key = value` with integer, boolean or quoted string values
//! - Comments (`# ...`), full-line or trailing
//!
//! Unknown keys are ignored. Integers may be written in decimal, as `0x..`
//! hex, or with `_` separators. A port without `baudrate` runs at
//! 115200; line settings default to 8N1.

use dgus_hal::{DataBits, Parity, StopBits};

use super::types::{BridgeConfig, ConfigError, PortConfig};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid or unknown section header
    InvalidSection,
    /// Invalid value type
    InvalidValue,
    /// Line is neither a section header nor `key = value`
    InvalidLine,
    /// Resulting configuration is not usable
    Config(ConfigError),
}

impl From<ConfigError> for ParseError {
    fn from(e: ConfigError) -> Self {
        ParseError::Config(e)
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Bridge,
    Uart(u8),
}

/// Parse `bridge.toml` text
///
/// Ports appear in the order of their sections. A file without any
/// `[uart.N]` section yields a bridge with no ports.
pub fn parse_config(input: &str) -> Result<BridgeConfig, ParseError> {
    let mut config = BridgeConfig::new();
    let mut section = Section::Root;
    let mut current_port: Option<PortConfig> = None;

    for line in input.lines() {
        let line = strip_comment(line).trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            save_section(&mut config, &mut current_port)?;
            section = parse_section_header(&line[1..line.len() - 1])?;
            if let Section::Uart(id) = section {
                current_port = Some(PortConfig {
                    id,
                    ..PortConfig::default()
                });
            }
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::InvalidLine)?;
        apply_value(section, key, value, &mut config, &mut current_port)?;
    }

    save_section(&mut config, &mut current_port)?;
    config.validate()?;

    Ok(config)
}

/// Parse a section header like "bridge" or "uart.3"
fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    let header = header.trim();
    if header == "bridge" {
        return Ok(Section::Bridge);
    }

    let (kind, id) = header.split_once('.').ok_or(ParseError::InvalidSection)?;
    if kind.trim() != "uart" {
        return Err(ParseError::InvalidSection);
    }
    let id = id.trim().parse().map_err(|_| ParseError::InvalidSection)?;
    Ok(Section::Uart(id))
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn parse_int(value: &str) -> Result<u32, ParseError> {
    let mut digits: heapless::String<16> = heapless::String::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseError::InvalidValue)?;
    }

    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => digits.parse(),
    };
    parsed.map_err(|_| ParseError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_str(value: &str) -> Result<&str, ParseError> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .ok_or(ParseError::InvalidValue)
}

fn parse_data_bits(value: &str) -> Result<DataBits, ParseError> {
    match parse_int(value)? {
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_parity(value: &str) -> Result<Parity, ParseError> {
    match parse_str(value)? {
        "none" => Ok(Parity::None),
        "even" => Ok(Parity::Even),
        "odd" => Ok(Parity::Odd),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_stop_bits(value: &str) -> Result<StopBits, ParseError> {
    match parse_int(value)? {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(ParseError::InvalidValue),
    }
}

fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut BridgeConfig,
    current_port: &mut Option<PortConfig>,
) -> Result<(), ParseError> {
    match section {
        Section::Root => {} // Nothing lives at the top level
        Section::Bridge => match key {
            "poll_interval_ms" => config.poll_interval_ms = parse_int(value)?,
            "tx_spin_budget" => config.tx_spin_budget = parse_int(value)?,
            _ => {} // Ignore unknown keys
        },
        Section::Uart(_) => {
            let port = current_port.as_mut().ok_or(ParseError::InvalidSection)?;
            match key {
                "baudrate" => port.baudrate = parse_int(value)?,
                "response" => port.response = parse_bool(value)?,
                "crc" => port.crc = parse_bool(value)?,
                "upload" => port.upload = parse_bool(value)?,
                "settle_ms" => port.settle_ms = parse_int(value)?,
                "data_bits" => port.data_bits = parse_data_bits(value)?,
                "parity" => port.parity = parse_parity(value)?,
                "stop_bits" => port.stop_bits = parse_stop_bits(value)?,
                _ => {} // Ignore unknown keys
            }
        }
    }
    Ok(())
}

fn save_section(
    config: &mut BridgeConfig,
    current_port: &mut Option<PortConfig>,
) -> Result<(), ParseError> {
    if let Some(port) = current_port.take() {
        config.add_port(port)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Bridge between the HMI and two hosts
[bridge]
poll_interval_ms = 20

[uart.2]
baudrate = 115_200
response = true
crc = false

[uart.3]
baudrate = 1612800   # high-speed link
crc = true
upload = false
settle_ms = 0
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.ports.len(), 2);

        let uart2 = config.find_port(2).unwrap();
        assert_eq!(uart2.baudrate, 115200);
        assert!(uart2.response);
        assert!(!uart2.crc);
        assert!(uart2.upload);
        assert_eq!(uart2.settle_ms, 5);

        let uart3 = config.find_port(3).unwrap();
        assert_eq!(uart3.baudrate, 1612800);
        assert!(uart3.crc);
        assert!(!uart3.upload);
        assert_eq!(uart3.settle_ms, 0);
    }

    #[test]
    fn test_parse_section_header() {
        assert_eq!(parse_section_header("bridge"), Ok(Section::Bridge));
        assert_eq!(parse_section_header("uart.4"), Ok(Section::Uart(4)));
        assert_eq!(parse_section_header(" uart . 5 "), Ok(Section::Uart(5)));
        assert_eq!(
            parse_section_header("stepper.spin"),
            Err(ParseError::InvalidSection)
        );
        assert_eq!(
            parse_section_header("uart.x"),
            Err(ParseError::InvalidSection)
        );
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Ok(42));
        assert_eq!(parse_int("1_612_800"), Ok(1_612_800));
        assert_eq!(parse_int("0x0F00"), Ok(0x0F00));
        assert_eq!(parse_int("-1"), Err(ParseError::InvalidValue));
        assert_eq!(parse_int("fast"), Err(ParseError::InvalidValue));
    }

    #[test]
    fn test_bad_port_id() {
        let input = "[uart.7]\nbaudrate = 9600\n";
        assert_eq!(
            parse_config(input),
            Err(ParseError::Config(ConfigError::InvalidPortId(7)))
        );
    }

    #[test]
    fn test_duplicate_port() {
        let input = "[uart.2]\n[uart.2]\n";
        assert_eq!(
            parse_config(input),
            Err(ParseError::Config(ConfigError::DuplicatePort(2)))
        );
    }

    #[test]
    fn test_bad_bool() {
        let input = "[uart.2]\ncrc = yes\n";
        assert_eq!(parse_config(input), Err(ParseError::InvalidValue));
    }

    #[test]
    fn test_garbage_line() {
        assert_eq!(parse_config("[bridge]\nnonsense\n"), Err(ParseError::InvalidLine));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config = parse_config("[uart.2]\nflow_control = \"rts\"\n").unwrap();
        assert_eq!(config.ports.len(), 1);
    }

    #[test]
    fn test_missing_baudrate_defaults() {
        let config = parse_config("[uart.4]\ncrc = true\n").unwrap();
        assert_eq!(config.find_port(4).unwrap().baudrate, 115200);
    }

    #[test]
    fn test_line_settings() {
        let input = "[uart.2]\ndata_bits = 7\nparity = \"even\"\nstop_bits = 2\n[uart.3]\n";
        let config = parse_config(input).unwrap();

        let uart = config.find_port(2).unwrap().uart();
        assert_eq!(uart.data_bits, DataBits::Seven);
        assert_eq!(uart.parity, Parity::Even);
        assert_eq!(uart.stop_bits, StopBits::Two);

        let uart = config.find_port(3).unwrap().uart();
        assert_eq!(uart.data_bits, DataBits::Eight);
        assert_eq!(uart.parity, Parity::None);
        assert_eq!(uart.stop_bits, StopBits::One);
    }

    #[test]
    fn test_bad_line_settings() {
        for input in [
            "[uart.2]\ndata_bits = 9\n",
            "[uart.2]\nparity = \"mark\"\n",
            "[uart.2]\nparity = odd\n",
            "[uart.2]\nstop_bits = 0\n",
        ] {
            assert_eq!(parse_config(input), Err(ParseError::InvalidValue), "{}", input);
        }
    }
}
