//! Serializes scan results to CSV and writes them through a caller-supplied
//! sink.
//!
//! Unlike probe failures, export failures are never swallowed: the caller
//! gets an explicit [`ExportError`] and still holds the in-memory results.

use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use log::info;
use thiserror::Error;

use crate::scanner::PortRecord;

/// Header row of a host discovery export.
pub const HOST_HEADER: &str = "IP Address";

/// Header row of a port scan export.
pub const PORT_HEADER: &str = "Port,Service";

/// Raised when the export destination cannot be written.
#[derive(Debug, Error)]
#[error("failed to write export '{destination}': {source}")]
pub struct ExportError {
    /// Destination name the write was attempted against.
    pub destination: String,
    /// Underlying I/O failure.
    pub source: io::Error,
}

/// Storage write primitive. Abstracts over whatever the platform offers —
/// a directory on disk in the CLI, an in-memory buffer in tests.
pub trait WriteSink {
    /// Writes `bytes` to the named destination, creating or truncating it.
    fn write_bytes(&mut self, destination: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Writes exports as files inside a directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates a sink rooted at `dir`.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        DirectorySink { dir }
    }
}

impl WriteSink for DirectorySink {
    fn write_bytes(&mut self, destination: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.dir.join(destination), bytes)
    }
}

/// Joins a header and data rows into CSV text.
///
/// Fields come from controlled vocabularies (addresses, port numbers, service
/// labels), so no quoting or escaping is applied. The output has exactly
/// `rows.len() + 1` lines and no trailing newline.
#[must_use]
pub fn render(header: &str, rows: &[String]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.to_owned());
    lines.extend_from_slice(rows);
    lines.join("\n")
}

/// One CSV row per discovered host, in the set's ascending order.
#[must_use]
pub fn host_rows(hosts: &[Ipv4Addr]) -> Vec<String> {
    hosts.iter().map(Ipv4Addr::to_string).collect()
}

/// One `port,service` CSV row per open port, in ascending port order.
#[must_use]
pub fn port_rows(ports: &[PortRecord]) -> Vec<String> {
    ports
        .iter()
        .map(|record| format!("{},{}", record.port, record.service))
        .collect()
}

/// File name for a host discovery export: `network_scan_<epochMillis>.csv`.
#[must_use]
pub fn discovery_file_name(epoch_millis: i64) -> String {
    format!("network_scan_{epoch_millis}.csv")
}

/// File name for a port scan export:
/// `port_scan_<ip_with_dots_as_underscores>_<epochMillis>.csv`.
#[must_use]
pub fn port_scan_file_name(target: Ipv4Addr, epoch_millis: i64) -> String {
    let ip = target.to_string().replace('.', "_");
    format!("port_scan_{ip}_{epoch_millis}.csv")
}

/// Runs the export confirmation protocol.
///
/// The decision belongs to the caller: when `confirmed` is false nothing is
/// written and the returned file name is empty, so completion reporting can
/// still fire. When confirmed, the rendered CSV is written through the sink
/// and the file name is returned.
pub fn export_if_confirmed<S: WriteSink>(
    sink: &mut S,
    confirmed: bool,
    file_name: &str,
    header: &str,
    rows: &[String],
) -> Result<String, ExportError> {
    if !confirmed {
        return Ok(String::new());
    }

    let content = render(header, rows);
    sink.write_bytes(file_name, content.as_bytes())
        .map_err(|source| ExportError {
            destination: file_name.to_owned(),
            source,
        })?;

    info!("exported {} rows to {file_name}", rows.len());
    Ok(file_name.to_owned())
}
