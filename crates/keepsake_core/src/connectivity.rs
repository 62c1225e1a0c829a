//! Connectivity gate.
//!
//! A sync pass is pointless without a network path, so the reconciler asks a
//! [`ConnectivityGate`] first and silently skips the pass when it reports
//! unreachable. Absence of connectivity is an expected, non-exceptional
//! state; it is logged, never raised as an error.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::BoxFuture;

/// Precondition check for a synchronization pass.
pub trait ConnectivityGate: Send + Sync {
    /// True if any transport currently provides a usable network path.
    fn is_reachable(&self) -> BoxFuture<'_, bool>;
}

/// Connectivity probe that attempts short TCP connects to well-known
/// endpoints.
///
/// Reachable as soon as any endpoint accepts within the bound. The endpoint
/// list stands in for the platform transport classes (wifi, cellular,
/// wired): any one of them answering is enough.
pub struct TcpProbe {
    endpoints: Vec<String>,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe the given `host:port` endpoints with the given per-endpoint
    /// timeout.
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        Self { endpoints, timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            endpoints: vec!["1.1.1.1:443".to_string(), "8.8.8.8:443".to_string()],
            timeout: Duration::from_secs(3),
        }
    }
}

impl ConnectivityGate for TcpProbe {
    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            for endpoint in &self.endpoints {
                match tokio::time::timeout(self.timeout, TcpStream::connect(endpoint)).await {
                    Ok(Ok(_)) => return true,
                    Ok(Err(e)) => log::debug!("Probe {} failed: {}", endpoint, e),
                    Err(_) => log::debug!("Probe {} timed out", endpoint),
                }
            }
            false
        })
    }
}

/// Gate that always reports reachable.
///
/// For tests and for hosts that handle connectivity themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl ConnectivityGate for AlwaysOnline {
    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}
