//! Unused port discovery.
//!
//! # Responsibilities
//! - Scan a port range for a port nobody is listening on
//! - Keep ports handed to live instances of this process out of later scans
//!
//! # Design Decisions
//! - A port is busy when a TCP connect to it succeeds; refused or timed out
//!   connects mean it is free
//! - The probe is best effort: a process grabbing the port between probe and
//!   bind makes the listener fail, which the server reports as a startup error

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;
use std::time::Duration;

use dashmap::DashSet;
use tokio::net::TcpStream;

use crate::config::PortRange;
use crate::error::WebhookError;

/// Upper bound for a single connect probe.
const PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Ports currently owned by instances in this process.
fn reserved_ports() -> &'static DashSet<u16> {
    static RESERVED: OnceLock<DashSet<u16>> = OnceLock::new();
    RESERVED.get_or_init(DashSet::new)
}

/// A port claimed for one instance. Released when dropped.
#[derive(Debug)]
pub struct PortReservation {
    port: u16,
}

impl PortReservation {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        reserved_ports().remove(&self.port);
    }
}

/// Host to connect to when probing a listener bound to `listen_host`.
///
/// Unspecified addresses cannot be dialed everywhere, so they map to the
/// matching loopback address.
pub fn probe_host(listen_host: &str) -> String {
    match listen_host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) if ip.is_unspecified() => Ipv4Addr::LOCALHOST.to_string(),
        Ok(IpAddr::V6(ip)) if ip.is_unspecified() => Ipv6Addr::LOCALHOST.to_string(),
        _ => listen_host.to_string(),
    }
}

/// Whether something accepts TCP connections on `host:port`.
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    let probe = TcpStream::connect((host, port));
    matches!(tokio::time::timeout(PROBE_TIMEOUT, probe).await, Ok(Ok(_)))
}

/// Find the first port in `range` (inclusive) that nothing listens on.
pub async fn find_unused_port(listen_host: &str, range: PortRange) -> Result<u16, WebhookError> {
    reserve_unused_port(listen_host, range).await.map(|r| {
        let port = r.port();
        drop(r);
        port
    })
}

/// Like [`find_unused_port`], but keeps the port reserved against other
/// scans in this process until the reservation is dropped.
pub async fn reserve_unused_port(
    listen_host: &str,
    range: PortRange,
) -> Result<PortReservation, WebhookError> {
    let host = probe_host(listen_host);
    tracing::debug!(host = %host, min = range.min, max = range.max, "Searching unused port");

    for port in range.min..=range.max {
        if !reserved_ports().insert(port) {
            continue;
        }
        let reservation = PortReservation { port };

        if is_port_in_use(&host, port).await {
            tracing::trace!(port, "Port in use");
            continue;
        }

        tracing::debug!(port, "Found unused port");
        return Ok(reservation);
    }

    Err(WebhookError::NoFreePort {
        min: range.min,
        max: range.max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_probe_host_maps_unspecified_to_loopback() {
        assert_eq!(probe_host("0.0.0.0"), "127.0.0.1");
        assert_eq!(probe_host("::"), "::1");
        assert_eq!(probe_host("127.0.0.1"), "127.0.0.1");
        assert_eq!(probe_host("example.test"), "example.test");
    }

    #[tokio::test]
    async fn test_skips_occupied_port() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let busy = occupied.local_addr().unwrap().port();

        assert!(is_port_in_use("127.0.0.1", busy).await);
        let err = find_unused_port("127.0.0.1", PortRange::new(busy, busy))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::NoFreePort { min, max } if min == busy && max == busy));
    }

    #[tokio::test]
    async fn test_reservations_are_distinct_until_dropped() {
        let range = PortRange::new(49300, 49400);

        let a = reserve_unused_port("127.0.0.1", range).await.unwrap();
        let b = reserve_unused_port("127.0.0.1", range).await.unwrap();
        assert_ne!(a.port(), b.port());

        let released = a.port();
        drop(a);
        assert!(!reserved_ports().contains(&released));
        assert!(reserved_ports().contains(&b.port()));
    }

    #[tokio::test]
    async fn test_empty_range_fails() {
        let err = find_unused_port("127.0.0.1", PortRange::new(50010, 50000))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::NoFreePort { .. }));
    }
}
