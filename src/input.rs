//! Provides a means to read, parse and hold configuration options for scans.
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::interface::Subnet;

const LOWEST_PORT_NUMBER: u16 = 1;
const TOP_PORT_NUMBER: u16 = 65535;

/// Default port range of a port scan, ports 1 through 1024.
pub const DEFAULT_PORT_RANGE: PortRange = PortRange {
    start: 1,
    end: 1024,
};

/// An inclusive range of TCP ports to scan.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    /// First port probed.
    pub start: u16,
    /// Last port probed.
    pub end: u16,
}

impl PortRange {
    /// Number of ports in the range. A reversed range counts as empty.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            usize::from(self.end - self.start) + 1
        }
    }

    /// True when the range covers no ports at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses `"80"` or `"1-1024"` into a [`PortRange`].
pub fn parse_port_range(input: &str) -> Result<PortRange, String> {
    let input = input.trim();

    if let Some((start_str, end_str)) = input.split_once('-') {
        let start = parse_single_port(start_str.trim())?;
        let end = parse_single_port(end_str.trim())?;
        if start > end {
            return Err(format!(
                "Start port {start} is greater than end port {end} in range '{input}'",
            ));
        }
        return Ok(PortRange { start, end });
    }

    let port = parse_single_port(input)?;
    Ok(PortRange {
        start: port,
        end: port,
    })
}

fn parse_single_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str
        .parse()
        .map_err(|_| format!("Invalid port number '{port_str}'"))?;

    if port < LOWEST_PORT_NUMBER {
        return Err(format!(
            "Port {port} must be between {LOWEST_PORT_NUMBER} and {TOP_PORT_NUMBER}",
        ));
    }

    Ok(port)
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lansweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
/// Local subnet host discovery and TCP port scanner.
/// Without a target it sweeps the local /24 for live hosts, repeating every
/// few seconds until stopped; with --target it enumerates open TCP ports on
/// that host. Either result set can be saved as a CSV file.
pub struct Opts {
    /// IPv4 address to port scan. When omitted, the local /24 subnet is swept
    /// for live hosts instead.
    #[arg(short, long)]
    pub target: Option<String>,

    /// The port range to scan on the target. Examples: 1-1024 or 8080
    #[arg(short, long, value_parser = parse_port_range)]
    pub ports: Option<PortRange>,

    /// Subnet prefix to sweep, e.g. 192.168.1. Overrides the prefix derived
    /// from the local interface address.
    #[arg(short, long)]
    pub subnet: Option<Subnet>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// The timeout in milliseconds before a host is assumed to be down.
    #[arg(long, default_value = "500")]
    pub host_timeout: u64,

    /// The timeout in milliseconds before a port is assumed to be closed.
    #[arg(long, default_value = "200")]
    pub port_timeout: u64,

    /// Seconds to wait between discovery sweeps.
    #[arg(long, default_value = "10")]
    pub sweep_interval: u64,

    /// Save results to CSV without asking.
    #[arg(long, conflicts_with = "no_save")]
    pub save: bool,

    /// Never save results to CSV, and never ask.
    #[arg(long)]
    pub no_save: bool,

    /// Directory CSV exports are written to. Defaults to the current directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Plain output. Turns off colored host and port reporting.
    #[arg(long)]
    pub plain: bool,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    /// Reads the command line arguments into an Opts struct.
    #[must_use]
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges values found within the user configuration file into the
    /// command line arguments.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(host_timeout, port_timeout, sweep_interval, save, plain);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(ports, subnet, output_dir);
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            target: None,
            ports: None,
            subnet: None,
            no_config: true,
            config_path: None,
            host_timeout: 500,
            port_timeout: 200,
            sweep_interval: 10,
            save: false,
            no_save: false,
            output_dir: None,
            plain: false,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize)]
pub struct Config {
    ports: Option<PortRange>,
    subnet: Option<Subnet>,
    host_timeout: Option<u64>,
    port_timeout: Option<u64>,
    sweep_interval: Option<u64>,
    save: Option<bool>,
    output_dir: Option<PathBuf>,
    plain: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// ports = { start = 1, end = 1024 }
    /// subnet = "192.168.1."
    /// host_timeout = 500
    /// sweep_interval = 10
    /// save = false
    ///
    #[must_use]
    pub fn read(custom_config_path: Option<PathBuf>) -> Self {
        let mut content = String::new();
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if config_path.exists() {
            content = fs::read_to_string(config_path).unwrap_or_default();
        }

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Found {e} in configuration file.\nAborting scan.\n");
                std::process::exit(1);
            }
        }
    }
}

/// Constructs default path to config toml
#[must_use]
pub fn default_config_path() -> PathBuf {
    let Some(mut config_path) = dirs::home_dir() else {
        panic!("Could not infer config file path.");
    };
    config_path.push(".lansweep.toml");
    config_path
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use parameterized::parameterized;

    use super::{parse_port_range, Config, Opts, PortRange, DEFAULT_PORT_RANGE};
    use crate::interface::Subnet;

    impl Config {
        fn default() -> Self {
            Self {
                ports: None,
                subnet: Some(Subnet::DEFAULT),
                host_timeout: Some(250),
                port_timeout: Some(100),
                sweep_interval: Some(5),
                save: Some(true),
                output_dir: None,
                plain: Some(true),
            }
        }
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn opts_no_merge_when_config_is_ignored() {
        let mut opts = Opts::default();
        let config = Config::default();

        opts.merge(&config);

        assert_eq!(opts.host_timeout, 500);
        assert_eq!(opts.port_timeout, 200);
        assert_eq!(opts.sweep_interval, 10);
        assert!(!opts.save);
        assert!(!opts.plain);
        assert_eq!(opts.subnet, None);
    }

    #[test]
    fn opts_merge_required_arguments() {
        let mut opts = Opts::default();
        let config = Config::default();

        opts.merge_required(&config);

        assert_eq!(opts.host_timeout, 250);
        assert_eq!(opts.port_timeout, 100);
        assert_eq!(opts.sweep_interval, 5);
        assert!(opts.save);
        assert!(opts.plain);
    }

    #[test]
    fn opts_merge_optional_arguments() {
        let mut opts = Opts::default();
        let mut config = Config::default();
        config.ports = Some(PortRange { start: 1, end: 100 });

        opts.merge_optional(&config);

        assert_eq!(opts.ports, Some(PortRange { start: 1, end: 100 }));
        assert_eq!(opts.subnet, Some(Subnet::DEFAULT));
    }

    #[test]
    fn parse_target_and_range_from_cli() {
        let opts = Opts::parse_from(["lansweep", "--target", "10.0.0.9", "-p", "1-1024"]);

        assert_eq!(opts.target.as_deref(), Some("10.0.0.9"));
        assert_eq!(opts.ports, Some(DEFAULT_PORT_RANGE));
    }

    #[parameterized(input = {
        "80", "1-1024", " 22 - 25 ", "65535",
    }, expected = {
        PortRange { start: 80, end: 80 },
        PortRange { start: 1, end: 1024 },
        PortRange { start: 22, end: 25 },
        PortRange { start: 65535, end: 65535 },
    })]
    fn parse_valid_port_ranges(input: &str, expected: PortRange) {
        assert_eq!(parse_port_range(input), Ok(expected));
    }

    #[test]
    fn parse_port_range_invalid_port() {
        let result = parse_port_range("abc");
        assert!(result.unwrap_err().contains("Invalid port number 'abc'"));
    }

    #[test]
    fn parse_port_range_reverse_range() {
        let result = parse_port_range("5-1");
        assert!(result
            .unwrap_err()
            .contains("Start port 5 is greater than end port 1"));
    }

    #[test]
    fn parse_port_range_zero_port() {
        let result = parse_port_range("0");
        assert!(result
            .unwrap_err()
            .contains("Port 0 must be between 1 and 65535"));
    }

    #[test]
    fn parse_port_range_out_of_bounds() {
        let result = parse_port_range("1-70000");
        assert!(result.unwrap_err().contains("Invalid port number '70000'"));
    }

    #[test]
    fn port_range_len() {
        assert_eq!(DEFAULT_PORT_RANGE.len(), 1024);
        assert_eq!(PortRange { start: 80, end: 80 }.len(), 1);
        assert!(PortRange { start: 2, end: 1 }.is_empty());
    }
}
