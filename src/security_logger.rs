//! Security-focused logging module to track security events
//!
//! Events go to the `security` log target. Passwords and tokens are never
//! part of an event.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Types of security events to track
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    // Authentication events
    LoginFailed { email: String, ip: Option<IpAddr> },
    LoginSucceeded { email: String, ip: Option<IpAddr> },
    TokenRejected { ip: Option<IpAddr>, reason: String },

    // Authorization events
    PermissionDenied { email: String, action: String },

    // Account lifecycle
    DuplicateRegistration { email: String, ip: Option<IpAddr> },
    AccountRemoved { id: String, by: String },
}

impl SecurityEvent {
    /// Stable key used for counting and thresholds
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityEvent::LoginFailed { .. } => "login_failed",
            SecurityEvent::LoginSucceeded { .. } => "login_succeeded",
            SecurityEvent::TokenRejected { .. } => "token_rejected",
            SecurityEvent::PermissionDenied { .. } => "permission_denied",
            SecurityEvent::DuplicateRegistration { .. } => "duplicate_registration",
            SecurityEvent::AccountRemoved { .. } => "account_removed",
        }
    }
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: Arc<RwLock<Vec<TimestampedEvent>>>,
    event_counts: Arc<RwLock<HashMap<&'static str, usize>>>,
    max_events: usize,
    alert_thresholds: HashMap<&'static str, usize>,
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityLogger {
    /// Create a new security logger
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("login_failed", 5);
        alert_thresholds.insert("token_rejected", 10);
        alert_thresholds.insert("permission_denied", 20);
        alert_thresholds.insert("duplicate_registration", 10);

        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            event_counts: Arc::new(RwLock::new(HashMap::new())),
            max_events: 10000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let kind = event.kind();

        {
            let mut events = self.events.write().await;
            events.push(TimestampedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });

            // Limit memory usage
            if events.len() > self.max_events {
                let excess = events.len() - self.max_events;
                events.drain(0..excess);
            }
        }

        {
            let mut counts = self.event_counts.write().await;
            let count = counts.entry(kind).or_insert(0);
            *count += 1;

            if let Some(&threshold) = self.alert_thresholds.get(kind) {
                if *count % threshold == 0 {
                    self.trigger_alert(kind, *count, &event);
                }
            }
        }

        match event {
            SecurityEvent::LoginFailed { email, ip } => {
                log::warn!(target: "security", "Login failed - Email: {}, IP: {:?}", email, ip);
            }
            SecurityEvent::LoginSucceeded { email, ip } => {
                log::info!(target: "security", "Login succeeded - Email: {}, IP: {:?}", email, ip);
            }
            SecurityEvent::TokenRejected { ip, reason } => {
                log::warn!(target: "security", "Token rejected - IP: {:?}, Reason: {}", ip, reason);
            }
            SecurityEvent::PermissionDenied { email, action } => {
                log::warn!(target: "security", "Permission denied - Email: {}, Action: {}", email, action);
            }
            SecurityEvent::DuplicateRegistration { email, ip } => {
                log::info!(target: "security", "Duplicate registration - Email: {}, IP: {:?}", email, ip);
            }
            SecurityEvent::AccountRemoved { id, by } => {
                log::info!(target: "security", "Account removed - Id: {}, By: {}", id, by);
            }
        }
    }

    fn trigger_alert(&self, kind: &str, count: usize, sample_event: &SecurityEvent) {
        log::error!(target: "security", "SECURITY ALERT: {} events of type '{}' detected", count, kind);
        log::error!(target: "security", "Sample event: {:?}", sample_event);
    }

    /// Total events of `kind` seen since startup
    pub async fn count(&self, kind: &str) -> usize {
        self.event_counts.read().await.get(kind).copied().unwrap_or(0)
    }

    /// Get recent security events
    pub async fn get_recent_events(&self, duration: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        let now = Instant::now();

        events
            .iter()
            .filter(|event| now.duration_since(event.timestamp) <= duration)
            .map(|event| event.event.clone())
            .collect()
    }

    /// Clean up old events
    pub async fn cleanup_old_events(&self, max_age: Duration) {
        let mut events = self.events.write().await;
        let now = Instant::now();

        events.retain(|event| now.duration_since(event.timestamp) <= max_age);
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                self.cleanup_old_events(Duration::from_secs(3600 * 24)).await; // Keep 24 hours
            }
        });
    }
}
