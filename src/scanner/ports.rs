//! Single-pass TCP port sweep against one target host.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

use crate::input::PortRange;
use crate::probe::PortProbe;
use crate::scanner::{PortRecord, ScanProgress, Session, SessionHandle};

/// A progress event is emitted on every port divisible by this.
const PROGRESS_STRIDE: u16 = 50;

/// Configuration of a port scan session.
#[derive(Debug, Clone, Copy)]
pub struct PortScanConfig {
    /// Host whose ports are probed.
    pub target: Ipv4Addr,
    /// Inclusive range of ports to probe. An empty range yields an empty
    /// result, not an error.
    pub range: PortRange,
    /// Per-port connect timeout.
    pub probe_timeout: Duration,
}

/// Events emitted by a port scan session, in ascending port order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortScanEvent {
    /// The sweep is starting.
    Started {
        /// Host being scanned.
        target: Ipv4Addr,
        /// Range being swept.
        range: PortRange,
    },
    /// Periodic progress snapshot, every 50th port.
    Progress(ScanProgress),
    /// A port accepted a connection.
    PortOpen(PortRecord),
    /// Terminal. The full range was probed.
    Complete {
        /// Every open port, ascending, with service labels resolved.
        open_ports: Vec<PortRecord>,
        /// Wall-clock duration of the sweep.
        elapsed: Duration,
    },
    /// Terminal. The session was stopped before the range was exhausted.
    Stopped,
}

/// Drives one pass over a port range against a single host.
///
/// Unlike host discovery the sweep does not repeat; it runs the range to
/// completion unless stopped through its [`SessionHandle`].
#[derive(Debug)]
pub struct PortScan<P> {
    probe: P,
    config: PortScanConfig,
}

impl<P: PortProbe + 'static> PortScan<P> {
    /// Creates an engine from a probe and a session configuration.
    pub fn new(probe: P, config: PortScanConfig) -> Self {
        PortScan { probe, config }
    }

    /// Spawns the sweep onto a background task.
    #[must_use]
    pub fn start(self, events: UnboundedSender<PortScanEvent>) -> SessionHandle {
        let session = Session::new();
        let worker = session.clone();

        let task = tokio::spawn(async move {
            self.run(&worker, &events).await;
        });

        SessionHandle::new(session.active, session.wake, task)
    }

    async fn run(self, session: &Session, events: &UnboundedSender<PortScanEvent>) {
        let PortScanConfig {
            target,
            range,
            probe_timeout,
        } = self.config;

        info!(
            "starting port scan on {target}, ports {}-{}",
            range.start, range.end
        );
        let _ = events.send(PortScanEvent::Started { target, range });

        let started = Instant::now();
        let total = range.len();
        let mut open_ports: Vec<PortRecord> = Vec::new();
        let mut stopped = false;

        // An inclusive range with start > end iterates zero times, which is
        // exactly the empty-range contract.
        for port in range.start..=range.end {
            if !session.is_active() {
                stopped = true;
                break;
            }

            if self.probe.is_open(target, port, probe_timeout).await {
                let record = PortRecord::new(port);
                debug!("port {record} open on {target}");
                open_ports.push(record);
                let _ = events.send(PortScanEvent::PortOpen(record));
            }

            if port % PROGRESS_STRIDE == 0 {
                let _ = events.send(PortScanEvent::Progress(ScanProgress {
                    processed: usize::from(port - range.start) + 1,
                    total,
                    found: open_ports.len(),
                }));
            }
        }

        if stopped {
            info!("port scan on {target} stopped");
            let _ = events.send(PortScanEvent::Stopped);
            return;
        }

        session.finish();

        let elapsed = started.elapsed();
        info!(
            "port scan on {target} complete, {} open ports in {:.1}s",
            open_ports.len(),
            elapsed.as_secs_f64()
        );
        let _ = events.send(PortScanEvent::Complete {
            open_ports,
            elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::probe::PortProbe;

    struct StaticProbe {
        open: HashSet<u16>,
        probed: Mutex<Vec<u16>>,
    }

    impl StaticProbe {
        fn new(open: &[u16]) -> Arc<Self> {
            Arc::new(StaticProbe {
                open: open.iter().copied().collect(),
                probed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PortProbe for Arc<StaticProbe> {
        async fn is_open(&self, _addr: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
            self.probed.lock().unwrap().push(port);
            self.open.contains(&port)
        }
    }

    fn config(range: PortRange) -> PortScanConfig {
        PortScanConfig {
            target: Ipv4Addr::new(10, 0, 0, 9),
            range,
            probe_timeout: Duration::from_millis(1),
        }
    }

    async fn run_scan(probe: Arc<StaticProbe>, range: PortRange) -> Vec<PortScanEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PortScan::new(probe, config(range)).start(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        handle.join().await;
        events
    }

    #[tokio::test]
    async fn full_range_finds_open_ports_in_order() {
        let probe = StaticProbe::new(&[80, 22]);
        let events = run_scan(Arc::clone(&probe), PortRange { start: 1, end: 1024 }).await;

        let (open_ports, elapsed) = events
            .iter()
            .find_map(|e| match e {
                PortScanEvent::Complete {
                    open_ports,
                    elapsed,
                } => Some((open_ports.clone(), *elapsed)),
                _ => None,
            })
            .expect("scan should complete");

        assert_eq!(
            open_ports,
            vec![PortRecord::new(22), PortRecord::new(80)]
        );
        assert_eq!(open_ports[0].service, "SSH");
        assert_eq!(open_ports[1].service, "HTTP");
        assert!(elapsed > Duration::ZERO);

        // Exactly 1024 probes, ascending.
        let probed = probe.probed.lock().unwrap();
        let expected: Vec<u16> = (1..=1024).collect();
        assert_eq!(*probed, expected);
    }

    #[tokio::test]
    async fn open_ports_are_announced_incrementally() {
        let probe = StaticProbe::new(&[22, 80]);
        let events = run_scan(probe, PortRange { start: 1, end: 100 }).await;

        let announced: Vec<u16> = events
            .iter()
            .filter_map(|e| match e {
                PortScanEvent::PortOpen(record) => Some(record.port),
                _ => None,
            })
            .collect();
        assert_eq!(announced, vec![22, 80]);
    }

    #[tokio::test]
    async fn progress_fires_every_fiftieth_port() {
        let probe = StaticProbe::new(&[]);
        let events = run_scan(probe, PortRange { start: 1, end: 200 }).await;

        let marks: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                PortScanEvent::Progress(p) => {
                    assert_eq!(p.total, 200);
                    Some(p.processed)
                }
                _ => None,
            })
            .collect();
        assert_eq!(marks, vec![50, 100, 150, 200]);
    }

    #[tokio::test]
    async fn empty_range_completes_with_no_probes() {
        let probe = StaticProbe::new(&[22]);
        let events = run_scan(Arc::clone(&probe), PortRange { start: 2, end: 1 }).await;

        assert!(probe.probed.lock().unwrap().is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            PortScanEvent::Complete { open_ports, .. } if open_ports.is_empty()
        )));
    }

    #[tokio::test]
    async fn single_port_range() {
        let probe = StaticProbe::new(&[443]);
        let events = run_scan(probe, PortRange { start: 443, end: 443 }).await;

        let open: Vec<PortRecord> = events
            .iter()
            .find_map(|e| match e {
                PortScanEvent::Complete { open_ports, .. } => Some(open_ports.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(open, vec![PortRecord::new(443)]);
    }

    #[tokio::test]
    async fn handle_goes_inactive_after_natural_completion() {
        let probe = StaticProbe::new(&[]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PortScan::new(probe, config(PortRange { start: 1, end: 10 })).start(tx);

        while let Some(event) = rx.recv().await {
            if matches!(event, PortScanEvent::Complete { .. }) {
                break;
            }
        }

        // The flag is cleared before the completion event is sent.
        assert!(!handle.is_active());
        handle.join().await;
    }

    #[tokio::test]
    async fn stopped_scan_reports_stopped_not_complete() {
        struct YieldingProbe;

        #[async_trait]
        impl PortProbe for YieldingProbe {
            async fn is_open(&self, _addr: Ipv4Addr, _port: u16, _timeout: Duration) -> bool {
                tokio::task::yield_now().await;
                false
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = PortScan::new(
            YieldingProbe,
            config(PortRange { start: 1, end: 65535 }),
        )
        .start(tx);

        // Let the sweep get going, then cancel it.
        let first = rx.recv().await;
        assert!(matches!(first, Some(PortScanEvent::Started { .. })));
        handle.stop();
        handle.join().await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.last(), Some(&PortScanEvent::Stopped));
        assert!(!events
            .iter()
            .any(|e| matches!(e, PortScanEvent::Complete { .. })));
    }
}
