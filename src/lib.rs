//! Scanning engine behind the `lansweep` LAN scanner.
//!
//! lansweep does two things: it sweeps the local IPv4 /24 subnet for live
//! hosts, and it enumerates open TCP ports on a chosen host. Both engines run
//! on a background tokio task and report incrementally over an event channel,
//! so a frontend only ever consumes immutable snapshots — it never shares
//! mutable state with a sweep in flight.
//!
//! ## Architecture overview
//!
//! 1. **Interface enumeration**: [`interface::local_ipv4`] finds the local
//!    address and [`interface::Subnet`] derives the /24 prefix to sweep
//!    (falling back to `192.168.1.` when no interface qualifies).
//! 2. **Probing**: [`probe::TcpProbe`] answers "is this host up?" and "is this
//!    port open?" with timeout-bounded TCP connect attempts. Both questions
//!    are trait seams, so engines can be driven by stub probes in tests.
//! 3. **Engines**: [`scanner::HostDiscovery`] repeats subnet sweeps until
//!    stopped; [`scanner::PortScan`] makes a single pass over a port range.
//!    Progress, per-hit and completion events arrive in ascending
//!    suffix/port order because probing is sequential within a sweep.
//! 4. **Export**: [`export`] renders results as CSV and writes them through a
//!    caller-supplied [`export::WriteSink`], gated on a confirmation the
//!    caller obtained.
//!
//! ## Basic usage
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! use lansweep::input::PortRange;
//! use lansweep::probe::TcpProbe;
//! use lansweep::scanner::{PortScan, PortScanConfig, PortScanEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (events, mut rx) = mpsc::unbounded_channel();
//!     let scan = PortScan::new(
//!         TcpProbe::new(),
//!         PortScanConfig {
//!             target: "192.168.1.17".parse().unwrap(),
//!             range: PortRange { start: 1, end: 1024 },
//!             probe_timeout: Duration::from_millis(200),
//!         },
//!     );
//!
//!     let handle = scan.start(events);
//!     while let Some(event) = rx.recv().await {
//!         if let PortScanEvent::Complete { open_ports, elapsed } = event {
//!             println!("{} open ports in {:.1}s", open_ports.len(), elapsed.as_secs_f64());
//!         }
//!     }
//!     handle.join().await;
//! }
//! ```
#![warn(missing_docs)]

pub mod export;

pub mod input;

pub mod interface;

pub mod probe;

pub mod scanner;

pub mod services;
