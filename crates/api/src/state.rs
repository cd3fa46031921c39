//! Shared application state

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use classifier::{LabelSet, MockClassifier};
use ensemble::{Ensemble, EnsembleError, EnsembleMember, EnsembleSpec, FusionEngine};
use event_sync::EventPublisher;
use face_frame::FaceDetector;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use wellbeing::WellbeingAdvisor;

/// One session's smoothing state
pub type SessionHandle = Arc<Mutex<Ensemble>>;

/// Bounds on the number and lifetime of sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Live sessions kept at once; the least recently used is evicted beyond this
    pub max_sessions: usize,
    /// Sessions without a frame for this long are dropped
    pub idle_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Per-session ensembles over one shared engine
///
/// Idle sessions are swept whenever a new session is created.
pub struct SessionStore {
    engine: Arc<FusionEngine>,
    limits: SessionLimits,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Create an empty store with default limits
    pub fn new(engine: Arc<FusionEngine>) -> Self {
        Self::with_limits(engine, SessionLimits::default())
    }

    /// Create an empty store bounded by `limits`
    pub fn with_limits(engine: Arc<FusionEngine>, limits: SessionLimits) -> Self {
        Self {
            engine,
            limits: SessionLimits {
                max_sessions: limits.max_sessions.max(1),
                ..limits
            },
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Existing session, or a fresh one; marks the session as active
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        self.get_or_create_at(id, Instant::now()).await
    }

    async fn get_or_create_at(&self, id: &str, now: Instant) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(id) {
            entry.last_seen = now;
            return Arc::clone(&entry.handle);
        }

        let before = sessions.len();
        let idle_timeout = self.limits.idle_timeout;
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < idle_timeout);
        if sessions.len() < before {
            debug!("Expired {} idle session(s)", before - sessions.len());
        }

        while sessions.len() >= self.limits.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    warn!("Session limit {} reached, evicting '{}'", self.limits.max_sessions, key);
                    sessions.remove(&key);
                }
                None => break,
            }
        }

        info!("Creating session '{}'", id);
        let handle: SessionHandle = Arc::new(Mutex::new(Ensemble::new(Arc::clone(&self.engine))));
        sessions.insert(
            id.to_string(),
            SessionEntry {
                handle: Arc::clone(&handle),
                last_seen: now,
            },
        );
        handle
    }

    /// Existing session without marking it active
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).map(|entry| Arc::clone(&entry.handle))
    }

    /// Drop a session; false if it did not exist
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!("Removed session '{}'", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<FusionEngine>,
    pub detector: Arc<dyn FaceDetector>,
    pub sessions: SessionStore,
    pub advisor: WellbeingAdvisor,
    pub publisher: Option<EventPublisher>,
    pub metrics: Option<PrometheusHandle>,
    /// Detection plus fusion budget per frame
    pub timeout: Duration,
    pub smoothing_default: bool,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    /// Create new state with no publisher or metrics
    pub fn new(engine: Arc<FusionEngine>, detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            sessions: SessionStore::new(Arc::clone(&engine)),
            engine,
            detector,
            advisor: WellbeingAdvisor::new(),
            publisher: None,
            metrics: None,
            timeout: Duration::from_secs(5),
            smoothing_default: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    /// Publish emotion events through `publisher`
    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Serve `/metrics` from `handle`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Set the per-frame detection and fusion budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_smoothing_default(mut self, enabled: bool) -> Self {
        self.smoothing_default = enabled;
        self
    }

    /// Replace the (empty) session store with one bounded by `limits`
    pub fn with_session_limits(mut self, limits: SessionLimits) -> Self {
        self.sessions = SessionStore::with_limits(Arc::clone(&self.engine), limits);
        self
    }
}

/// Engine with scripted classifiers shaped like `spec`, for offline runs
///
/// Every member favours Neutral; no model files are read.
pub fn mock_engine(spec: &EnsembleSpec) -> Result<FusionEngine, EnsembleError> {
    warn!("Using mock classifiers for {}", spec.kind);

    let labels = LabelSet::new(spec.labels.clone())
        .map_err(|e| EnsembleError::Config(e.to_string()))?;
    let neutral = labels.index_of("Neutral").unwrap_or(0);
    let uniform = 0.5 / labels.len() as f32;
    let probs: Vec<f32> = (0..labels.len())
        .map(|i| if i == neutral { 0.5 + uniform } else { uniform })
        .collect();

    let mut builder = FusionEngine::builder(labels.clone())
        .kind(&spec.kind)
        .total_images(&spec.total_images)
        .agreement(spec.agreement)
        .smoothing(spec.smoothing);
    for model in &spec.models {
        builder = builder.member(EnsembleMember::new(
            &model.name,
            &model.dataset,
            model.weight,
            model.input.preprocessor(),
            Box::new(MockClassifier::fixed(&model.name, labels.clone(), probs.clone())),
        ));
    }
    builder.build()
}
