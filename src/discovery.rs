// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Enrollment server discovery over mDNS/DNS-SD.
//!
//! Discovery is a passive listen-and-collect over a bounded window: the
//! locator browses for `_est._tcp.local.` records, accumulates every
//! resolved candidate into a locally owned vector, and returns it when the
//! window closes. The window always runs to completion; an early arrival
//! does not shorten it. Candidates are not cached across runs.
//!
//! Selection is a pure ranking over the returned set: priority descending,
//! then weight descending, both taken from the SRV record as advertised.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tracing::{debug, warn};

use crate::error::{ProvisionError, Result};

/// DNS-SD service type for EST enrollment servers.
pub const EST_SERVICE_TYPE: &str = "_est._tcp.local.";

/// Fixed length of the discovery window.
pub const DISCOVERY_WINDOW: Duration = Duration::from_secs(5);

/// One enrollment server candidate resolved during a discovery window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    /// Network address from the service record.
    pub address: IpAddr,
    /// Service port.
    pub port: u16,
    /// SRV priority; higher is preferred.
    pub priority: u16,
    /// SRV weight; tie-break within equal priority, higher is preferred.
    pub weight: u16,
    /// Canonical server name, without the trailing dot.
    pub server_name: String,
    /// TXT properties advertised with the record.
    pub properties: HashMap<String, String>,
}

/// Capability for discovering candidate enrollment servers.
#[allow(async_fn_in_trait)]
pub trait ServiceLocator {
    /// Listen for `service_type` records for the full `window` and return
    /// every candidate seen. Never blocks longer than `window`.
    async fn discover(
        &self,
        service_type: &str,
        window: Duration,
    ) -> Result<Vec<DiscoveredServer>>;
}

/// Production locator backed by the `mdns-sd` service daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct MdnsServiceLocator;

impl ServiceLocator for MdnsServiceLocator {
    async fn discover(
        &self,
        service_type: &str,
        window: Duration,
    ) -> Result<Vec<DiscoveredServer>> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| ProvisionError::discovery(format!("failed to start mDNS daemon: {e}")))?;
        let receiver = daemon
            .browse(service_type)
            .map_err(|e| ProvisionError::discovery(format!("failed to browse {service_type}: {e}")))?;

        let mut found: Vec<DiscoveredServer> = Vec::new();
        let start = Instant::now();

        // Collect for the full window; the suspension length is fixed.
        while start.elapsed() < window {
            match receiver.recv_timeout(Duration::from_millis(500)) {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    let Some(address) = info.get_addresses().iter().next().copied() else {
                        continue;
                    };
                    let port = info.get_port();
                    if found.iter().any(|s| s.address == address && s.port == port) {
                        continue;
                    }

                    debug!(
                        "resolved {} at {}:{} (priority {}, weight {})",
                        info.get_fullname(),
                        address,
                        port,
                        info.get_priority(),
                        info.get_weight()
                    );

                    found.push(DiscoveredServer {
                        address,
                        port,
                        priority: info.get_priority(),
                        weight: info.get_weight(),
                        server_name: canonical_name(info.get_hostname()),
                        properties: info
                            .get_properties()
                            .iter()
                            .map(|p| (p.key().to_string(), p.val_str().to_string()))
                            .collect(),
                    });
                }
                Ok(_) => {}
                // Timed out; keep listening until the window closes.
                Err(_) => {}
            }
        }

        if let Err(e) = daemon.shutdown() {
            warn!("failed to shut down mDNS daemon: {e}");
        }

        Ok(found)
    }
}

/// Strip the trailing dot mDNS appends to instance host names.
fn canonical_name(raw: &str) -> String {
    raw.trim_end_matches('.').to_string()
}

/// Rank candidates by priority descending, then weight descending, and
/// return the winner. `None` when the set is empty.
pub fn select_server(mut candidates: Vec<DiscoveredServer>) -> Option<DiscoveredServer> {
    candidates.sort_by(|a, b| (b.priority, b.weight).cmp(&(a.priority, a.weight)));
    candidates.into_iter().next()
}
