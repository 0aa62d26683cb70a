//! CLI frontend: consumes engine events on the foreground context, prints
//! incremental results and runs the export confirmation protocol.

use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use colored::Colorize;
use log::debug;
use tokio::sync::mpsc;

use lansweep::export::{
    self, export_if_confirmed, DirectorySink, HOST_HEADER, PORT_HEADER,
};
use lansweep::input::{Config, Opts, DEFAULT_PORT_RANGE};
use lansweep::interface::{self, Subnet};
use lansweep::probe::TcpProbe;
use lansweep::scanner::{
    DiscoveryConfig, DiscoveryEvent, HostDiscovery, PortScan, PortScanConfig, PortScanEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts = Opts::read();
    let config = Config::read(opts.config_path.clone());
    opts.merge(&config);
    debug!("main() `opts` arguments are {opts:?}");

    if opts.plain {
        colored::control::set_override(false);
    }

    match opts.target.clone() {
        Some(target) => run_port_scan(&opts, &target).await,
        None => run_discovery(&opts).await,
    }
}

async fn run_discovery(opts: &Opts) -> anyhow::Result<()> {
    let local_addr = interface::local_ipv4();
    let subnet = opts
        .subnet
        .unwrap_or_else(|| local_addr.map_or(Subnet::DEFAULT, Subnet::of));

    let engine = HostDiscovery::new(
        TcpProbe::new(),
        DiscoveryConfig {
            subnet,
            local_addr,
            probe_timeout: Duration::from_millis(opts.host_timeout),
            sweep_interval: Duration::from_secs(opts.sweep_interval),
        },
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = engine.start(tx);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(DiscoveryEvent::SweepStarted { subnet }) => {
                    println!("Starting scan on {subnet}...");
                }
                Some(DiscoveryEvent::HostFound { addr }) => {
                    println!("Open host {}", addr.to_string().purple());
                }
                Some(DiscoveryEvent::Progress(progress)) => {
                    println!(
                        "Scanning {subnet} {}/{} ({}%), discovered so far: {}",
                        progress.processed,
                        progress.total,
                        progress.percent(),
                        progress.found
                    );
                }
                Some(DiscoveryEvent::SweepComplete(summary)) => {
                    println!(
                        "Found {} devices on network, waiting {}s before next sweep",
                        summary.hosts.len(),
                        opts.sweep_interval
                    );

                    if summary.all_hosts_new() {
                        let confirmed =
                            confirm_export(opts, "Save the initial scan result as a CSV file?")
                                .await;
                        let file_name =
                            export::discovery_file_name(Utc::now().timestamp_millis());
                        let rows = export::host_rows(&summary.hosts);
                        match export_if_confirmed(
                            &mut output_sink(opts),
                            confirmed,
                            &file_name,
                            HOST_HEADER,
                            &rows,
                        ) {
                            Ok(written) => report_scan_complete(summary.hosts.len(), &written),
                            // The discovered set is intact; keep sweeping.
                            Err(e) => eprintln!("{e}"),
                        }
                    }
                }
                Some(DiscoveryEvent::Stopped) => println!("Scan stopped."),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => handle.stop(),
        }
    }

    handle.join().await;
    Ok(())
}

async fn run_port_scan(opts: &Opts, target: &str) -> anyhow::Result<()> {
    let target: Ipv4Addr = target
        .parse()
        .with_context(|| format!("invalid target address '{target}'"))?;
    let range = opts.ports.unwrap_or(DEFAULT_PORT_RANGE);

    let engine = PortScan::new(
        TcpProbe::new(),
        PortScanConfig {
            target,
            range,
            probe_timeout: Duration::from_millis(opts.port_timeout),
        },
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = engine.start(tx);
    let mut result = None;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(PortScanEvent::Started { target, range }) => {
                    println!(
                        "Starting port scan on {target}, scanning ports {}-{}...",
                        range.start, range.end
                    );
                }
                Some(PortScanEvent::PortOpen(record)) => {
                    println!("Open {}", format!("{target}:{record}").purple());
                }
                Some(PortScanEvent::Progress(progress)) => {
                    println!(
                        "Scanning... {}/{} ({}%)",
                        progress.processed,
                        progress.total,
                        progress.percent()
                    );
                }
                Some(PortScanEvent::Complete { open_ports, elapsed }) => {
                    if open_ports.is_empty() {
                        println!(
                            "Scan complete. No open ports found on {target} in {:.1}s",
                            elapsed.as_secs_f64()
                        );
                    } else {
                        println!(
                            "Scan complete. Found {} open ports on {target} in {:.1}s",
                            open_ports.len(),
                            elapsed.as_secs_f64()
                        );
                    }
                    result = Some(open_ports);
                }
                Some(PortScanEvent::Stopped) => println!("Scan stopped."),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => handle.stop(),
        }
    }
    handle.join().await;

    if let Some(open_ports) = result {
        let confirmed = confirm_export(opts, "Save the port scan result as a CSV file?").await;
        let file_name = export::port_scan_file_name(target, Utc::now().timestamp_millis());
        let rows = export::port_rows(&open_ports);
        let written = export_if_confirmed(
            &mut output_sink(opts),
            confirmed,
            &file_name,
            PORT_HEADER,
            &rows,
        )?;
        report_scan_complete(open_ports.len(), &written);
    }

    Ok(())
}

fn output_sink(opts: &Opts) -> DirectorySink {
    let dir = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    DirectorySink::new(dir)
}

/// Resolves the export confirmation: forced by `--save`/`--no-save`, asked
/// on stdin otherwise. The read runs on a blocking thread so the runtime
/// stays free while the prompt is open.
async fn confirm_export(opts: &Opts, prompt: &str) -> bool {
    if opts.save {
        return true;
    }
    if opts.no_save {
        return false;
    }

    print!("{prompt} [y/N] ");
    let _ = io::stdout().flush();

    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => matches!(line.trim(), "y" | "Y" | "yes" | "Yes"),
        _ => false,
    }
}

/// Completion report. `export` is empty when the export was declined.
fn report_scan_complete(found: usize, export: &str) {
    if export.is_empty() {
        println!("Scan result: {found} entries, not exported");
    } else {
        println!("Scan result: {found} entries, exported to {export}");
    }
}
