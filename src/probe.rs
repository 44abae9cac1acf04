//! TCP reachability checks for registered devices.

use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::registry::Device;

/// Connect timeout used by the status endpoint and CLI.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Port assumed when a host carries none.
pub const DEFAULT_PROBE_PORT: u16 = 80;

/// Reachability of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    pub reachable: bool,
}

/// `host[:port]` to a connectable address string, defaulting to port 80.
///
/// Bare IPv6 literals get bracketed; bracketed literals keep their port.
pub fn probe_address(host: &str) -> String {
    let host = host.trim();
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    if let Some(rest) = host.strip_prefix('[') {
        return if rest.contains("]:") {
            host.to_string()
        } else {
            format!("{host}:{DEFAULT_PROBE_PORT}")
        };
    }
    if host.parse::<Ipv6Addr>().is_ok() {
        return format!("[{host}]:{DEFAULT_PROBE_PORT}");
    }
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{DEFAULT_PROBE_PORT}")
    }
}

/// Whether a TCP connection to `host` succeeds within `timeout`.
///
/// Name resolution counts against the timeout.
pub async fn check_host_reachable(host: &str, timeout: Duration) -> bool {
    let addr = probe_address(host);
    match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => {
            trace!(%addr, "Host reachable");
            true
        }
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "Host unreachable");
            false
        }
        Err(_) => {
            trace!(%addr, "Probe timed out");
            false
        }
    }
}

/// Probe every device concurrently, returning results in device order.
pub async fn probe_devices(devices: &[Device], timeout: Duration) -> Vec<DeviceStatus> {
    let mut set = JoinSet::new();
    for (index, device) in devices.iter().enumerate() {
        let host = device.host.clone();
        set.spawn(async move { (index, check_host_reachable(&host, timeout).await) });
    }

    let mut reachable = vec![false; devices.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, ok)) => reachable[index] = ok,
            Err(e) => debug!(error = %e, "Probe task failed"),
        }
    }

    devices
        .iter()
        .zip(reachable)
        .map(|(device, reachable)| DeviceStatus {
            id: device.id.clone(),
            reachable,
        })
        .collect()
}
