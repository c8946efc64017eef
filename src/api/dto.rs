//! Response bodies

use serde::Serialize;

use crate::upstream::LinkState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded
    pub status: String,
    /// Broker link state
    pub upstream: LinkState,
    /// Topic being relayed
    pub topic: String,
    /// Open dashboard connections
    pub connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
