//! Repeated sweeps of a /24 subnet for live hosts.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc::UnboundedSender;

use crate::interface::Subnet;
use crate::probe::ReachabilityProbe;
use crate::scanner::{ScanProgress, Session, SessionHandle};

/// Host suffixes probed per sweep, ascending.
const FIRST_SUFFIX: u8 = 1;
const LAST_SUFFIX: u8 = 254;

/// A progress event is emitted every this many suffixes.
const PROGRESS_STRIDE: u8 = 20;

/// Configuration of a discovery session.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// The /24 prefix to sweep.
    pub subnet: Subnet,
    /// The local interface address, if enumeration found one. Always a
    /// member of the discovered set once known.
    pub local_addr: Option<Ipv4Addr>,
    /// Per-host probe timeout.
    pub probe_timeout: Duration,
    /// Delay between the end of one sweep and the start of the next.
    pub sweep_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            subnet: Subnet::DEFAULT,
            local_addr: None,
            probe_timeout: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

/// What a sweep found, snapshotted for the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    /// Every host discovered this session, ascending. Monotonic across
    /// sweeps — a host that stops answering is never removed.
    pub hosts: Vec<Ipv4Addr>,
    /// Hosts first discovered during this sweep, in probe order.
    pub new_hosts: Vec<Ipv4Addr>,
}

impl SweepSummary {
    /// True when every host discovered so far was found during this sweep.
    ///
    /// This is the condition gating the CSV export offer. In practice it
    /// only holds on a session's first productive sweep, but the literal
    /// comparison is kept rather than tracking a sweep counter.
    #[must_use]
    pub fn all_hosts_new(&self) -> bool {
        !self.new_hosts.is_empty() && self.hosts.len() == self.new_hosts.len()
    }
}

/// Events emitted by a discovery session, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A sweep over the subnet is starting.
    SweepStarted {
        /// The prefix being swept.
        subnet: Subnet,
    },
    /// Periodic progress snapshot, every 20th suffix.
    Progress(ScanProgress),
    /// A host answered for the first time this session.
    HostFound {
        /// The responding address.
        addr: Ipv4Addr,
    },
    /// A full pass over the subnet finished.
    SweepComplete(SweepSummary),
    /// Terminal. The session was stopped; no further probes are issued.
    Stopped,
}

/// Drives repeated subnet sweeps until stopped.
#[derive(Debug)]
pub struct HostDiscovery<P> {
    probe: P,
    config: DiscoveryConfig,
}

impl<P: ReachabilityProbe + 'static> HostDiscovery<P> {
    /// Creates an engine from a probe and a session configuration.
    pub fn new(probe: P, config: DiscoveryConfig) -> Self {
        HostDiscovery { probe, config }
    }

    /// Spawns the sweep loop onto a background task.
    ///
    /// Events are pushed into `events` as immutable snapshots; the channel
    /// is the hand-off point between the worker and the caller's context.
    /// The loop runs until [`SessionHandle::stop`] is called, then emits
    /// [`DiscoveryEvent::Stopped`] exactly once.
    #[must_use]
    pub fn start(self, events: UnboundedSender<DiscoveryEvent>) -> SessionHandle {
        let session = Session::new();
        let worker = session.clone();

        let task = tokio::spawn(async move {
            self.run(&worker, &events).await;
        });

        SessionHandle::new(session.active, session.wake, task)
    }

    async fn run(self, session: &Session, events: &UnboundedSender<DiscoveryEvent>) {
        let DiscoveryConfig {
            subnet,
            local_addr,
            probe_timeout,
            sweep_interval,
        } = self.config;

        let mut discovered: BTreeSet<Ipv4Addr> = BTreeSet::new();
        if let Some(local) = local_addr {
            discovered.insert(local);
        }

        info!("starting host discovery on {subnet}");

        while session.is_active() {
            let _ = events.send(DiscoveryEvent::SweepStarted { subnet });
            let mut new_hosts = Vec::new();

            for suffix in FIRST_SUFFIX..=LAST_SUFFIX {
                if !session.is_active() {
                    break;
                }

                let addr = subnet.host(suffix);
                if self.probe.is_reachable(addr, probe_timeout).await
                    && discovered.insert(addr)
                {
                    debug!("discovered new host {addr}");
                    new_hosts.push(addr);
                    let _ = events.send(DiscoveryEvent::HostFound { addr });
                }

                if suffix % PROGRESS_STRIDE == 0 {
                    let _ = events.send(DiscoveryEvent::Progress(ScanProgress {
                        processed: usize::from(suffix),
                        total: usize::from(LAST_SUFFIX),
                        found: discovered.len(),
                    }));
                }
            }

            if !session.is_active() {
                break;
            }

            // The local address could have been missed by its own probe;
            // it is always a member once known.
            if let Some(local) = local_addr {
                discovered.insert(local);
            }

            info!(
                "sweep of {subnet} complete, {} hosts known, {} new",
                discovered.len(),
                new_hosts.len()
            );
            let _ = events.send(DiscoveryEvent::SweepComplete(SweepSummary {
                hosts: discovered.iter().copied().collect(),
                new_hosts,
            }));

            session.idle(sweep_interval).await;
        }

        info!("host discovery on {subnet} stopped");
        let _ = events.send(DiscoveryEvent::Stopped);
    }
}
