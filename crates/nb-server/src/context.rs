//! Application context shared by all route handlers via Axum state.

use std::collections::HashSet;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use nb_convert::{CapabilityRegistry, ToolRegistry};
use nb_core::config::{AuthConfig, Config};
use nb_db::pool::DbPool;

use crate::jobs::JobManager;
use crate::middleware::rate_limit::{create_keyed_limiter, KeyedLimiter};

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

/// Decides whether an `X-API-Key` value is accepted.
pub trait KeyValidator: Send + Sync {
    fn is_valid(&self, key: &str) -> bool;
}

/// Fixed allow-list built from configuration.
#[derive(Debug, Default)]
pub struct StaticKeyValidator {
    keys: HashSet<String>,
}

impl StaticKeyValidator {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(auth.keys())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyValidator for StaticKeyValidator {
    fn is_valid(&self, key: &str) -> bool {
        !key.is_empty() && self.keys.contains(key)
    }
}

// ---------------------------------------------------------------------------
// AppContext
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle on everything the HTTP layer needs.
#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    /// Immutable configuration snapshot.
    pub config: Arc<Config>,
    pub jobs: Arc<JobManager>,
    /// Capability availability, decided once at startup.
    pub registry: Arc<CapabilityRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub keys: Arc<dyn KeyValidator>,
    /// Per-key limiter for conversion submissions; `None` disables limiting.
    pub limiter: Option<KeyedLimiter>,
    /// Prometheus handle when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppContext {
    pub fn new(
        config: Arc<Config>,
        db: DbPool,
        jobs: Arc<JobManager>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let registry = jobs.dispatcher().shared_registry();
        let keys: Arc<dyn KeyValidator> = Arc::new(StaticKeyValidator::from_config(&config.auth));
        let limiter = create_keyed_limiter(config.auth.rate_limit_per_minute);
        Self {
            db,
            config,
            jobs,
            registry,
            tools,
            keys,
            limiter,
            metrics: None,
        }
    }

    pub fn with_key_validator(mut self, keys: Arc<dyn KeyValidator>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
