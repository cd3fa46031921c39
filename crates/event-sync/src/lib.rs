//! Event Synchronization
//!
//! Publishes emotion events to an MQTT broker as JSON, throttled per user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use face_frame::BoundingBox;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Event sync error types
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Broker host name
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Connect over TLS with the platform roots
    pub use_tls: bool,
    /// Minimum time between two events for the same user
    pub min_interval_ms: u64,
    pub keep_alive_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "fer/events".to_string(),
            username: None,
            password: None,
            use_tls: false,
            min_interval_ms: 1000,
            keep_alive_secs: 60,
        }
    }
}

/// Emotion event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionEvent {
    pub user_id: String,
    pub emotion: String,
    pub confidence: f32,
    pub agreement: f32,
    pub bbox: BoundingBox,
    pub ts: DateTime<Utc>,
}

impl EmotionEvent {
    /// Event stamped with the current time
    pub fn now(
        user_id: &str,
        emotion: &str,
        confidence: f32,
        agreement: f32,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            emotion: emotion.to_string(),
            confidence,
            agreement,
            bbox,
            ts: Utc::now(),
        }
    }

    /// JSON payload as published
    pub fn to_payload(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(|e| SyncError::Serialization(e.to_string()))
    }
}

/// Throttle entries kept before stale ones are pruned
const THROTTLE_PRUNE_THRESHOLD: usize = 256;

/// MQTT publisher
pub struct EventPublisher {
    config: SyncConfig,
    client: Option<AsyncClient>,
    /// Set on broker ConnAck, cleared on event loop errors
    connected: Arc<AtomicBool>,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl EventPublisher {
    /// Create an unconnected publisher
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the broker has acknowledged the current connection
    pub fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Relaxed)
    }

    /// Create the client and spawn its event loop; needs a tokio runtime
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        if self.config.host.is_empty() {
            return Err(SyncError::Connection("no broker host configured".to_string()));
        }

        let client_id = format!("fer-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id.as_str(), &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));
        if let Some(username) = &self.config.username {
            options.set_credentials(username, self.config.password.as_deref().unwrap_or_default());
        }
        if self.config.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let connected = Arc::clone(&self.connected);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("MQTT connected: {:?}", ack.code);
                        connected.store(true, Ordering::Relaxed);
                    }
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Err(e) => {
                        if connected.swap(false, Ordering::Relaxed) {
                            warn!("MQTT connection lost");
                        }
                        error!("MQTT error: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {}
                }
            }
        });

        self.client = Some(client);
        info!(
            "MQTT publisher {} targeting {}:{} topic '{}'",
            client_id, self.config.host, self.config.port, self.config.topic
        );
        Ok(())
    }

    /// Whether an event for `user_id` is due at `now`
    pub fn should_publish(&self, user_id: &str, now: Instant) -> bool {
        let interval = Duration::from_millis(self.config.min_interval_ms);
        match self.last_sent.lock() {
            Ok(last_sent) => match last_sent.get(user_id) {
                Some(last) => now.saturating_duration_since(*last) >= interval,
                None => true,
            },
            Err(_) => true,
        }
    }

    fn mark_sent(&self, user_id: &str, now: Instant) {
        let interval = Duration::from_millis(self.config.min_interval_ms);
        if let Ok(mut last_sent) = self.last_sent.lock() {
            // Entries older than the interval no longer throttle anything
            if last_sent.len() >= THROTTLE_PRUNE_THRESHOLD {
                last_sent.retain(|_, last| now.saturating_duration_since(*last) < interval);
            }
            last_sent.insert(user_id.to_string(), now);
        }
    }

    /// Users with live throttle state
    pub fn tracked_users(&self) -> usize {
        self.last_sent.lock().map(|last_sent| last_sent.len()).unwrap_or(0)
    }

    /// Publish `event`; returns `Ok(false)` when throttled
    pub async fn publish(&self, event: &EmotionEvent) -> Result<bool, SyncError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| SyncError::Connection("Not connected".to_string()))?;

        let now = Instant::now();
        if !self.should_publish(&event.user_id, now) {
            debug!("Event for '{}' throttled", event.user_id);
            return Ok(false);
        }

        let payload = event.to_payload()?;
        client
            .publish(&self.config.topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| SyncError::Publish(e.to_string()))?;

        self.mark_sent(&event.user_id, now);
        debug!("Published {} for '{}'", event.emotion, event.user_id);
        Ok(true)
    }

    /// Forget throttle state for a user
    pub fn forget(&self, user_id: &str) {
        if let Ok(mut last_sent) = self.last_sent.lock() {
            last_sent.remove(user_id);
        }
    }
}
