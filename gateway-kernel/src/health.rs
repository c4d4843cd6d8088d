use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Vue sérialisable de la santé de la passerelle (GET /health)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub uptime_seconds: u64,
    pub transports: BTreeMap<String, String>,
    pub reconnects: u32,
    pub commands_issued: u32,
    pub publish_failures: u32,
    /// Horodatages illisibles remplacés par l'heure locale
    pub timestamp_fallbacks: u32,
    pub inconsistent_states: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    transports: Arc<Mutex<BTreeMap<String, String>>>,
    reconnects: Arc<AtomicU32>,
    commands_issued: Arc<AtomicU32>,
    publish_failures: Arc<AtomicU32>,
    timestamp_fallbacks: Arc<AtomicU32>,
    inconsistent_states: Arc<AtomicU32>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            transports: Arc::new(Mutex::new(BTreeMap::new())),
            reconnects: Arc::new(AtomicU32::new(0)),
            commands_issued: Arc::new(AtomicU32::new(0)),
            publish_failures: Arc::new(AtomicU32::new(0)),
            timestamp_fallbacks: Arc::new(AtomicU32::new(0)),
            inconsistent_states: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn set_transport_status(&self, transport: &str, status: &str) {
        self.transports.lock().insert(transport.to_string(), status.to_string());
    }

    pub fn mark_connecting(&self, transport: &str) {
        self.set_transport_status(transport, "connecting");
    }

    pub fn mark_connected(&self, transport: &str) {
        self.set_transport_status(transport, "connected");
    }

    pub fn mark_disconnected(&self, transport: &str) {
        self.set_transport_status(transport, "disconnected");
    }

    pub fn increment_reconnects(&self, transport: &str) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        self.set_transport_status(transport, "reconnecting");
    }

    pub fn record_command_issued(&self) {
        self.commands_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timestamp_fallback(&self) {
        self.timestamp_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inconsistent_state(&self) {
        self.inconsistent_states.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_status(&self, transport: &str) -> Option<String> {
        self.transports.lock().get(transport).cloned()
    }

    pub fn get_health(&self) -> GatewayHealth {
        GatewayHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            transports: self.transports.lock().clone(),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            timestamp_fallbacks: self.timestamp_fallbacks.load(Ordering::Relaxed),
            inconsistent_states: self.inconsistent_states.load(Ordering::Relaxed),
        }
    }
}
