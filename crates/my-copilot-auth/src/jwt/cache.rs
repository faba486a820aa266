//! Time-boxed key-set cache
//!
//! [`CachedKeySetSource`] wraps any [`KeySetSource`] and remembers the last
//! successful key set per endpoint for a fixed TTL. Failures are never cached,
//! so a transient outage at the identity provider does not outlive itself.
//!
//! A token signed with a key the cached set does not know triggers
//! [`KeySetSource::refresh`], which refetches at most once per
//! [`DEFAULT_MIN_REFRESH_INTERVAL`] per endpoint. Rotated keys are picked up
//! right away without letting unknown `kid`s hammer the identity provider.
//!
//! Freshness uses [`tokio::time::Instant`], which follows the paused test
//! clock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::jwks::{JwkSet, JwksError, KeySetSource};

/// Default freshness window for a cached key set
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default lower bound between two forced refreshes of one endpoint
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Caching decorator for a [`KeySetSource`]
#[derive(Debug)]
pub struct CachedKeySetSource<S> {
    inner: S,
    ttl: Duration,
    min_refresh_interval: Duration,
    entries: RwLock<HashMap<String, CachedKeySet>>,
    last_refresh: RwLock<HashMap<String, Instant>>,
}

impl<S: KeySetSource> CachedKeySetSource<S> {
    /// Cache `inner` with the default TTL
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_JWKS_CACHE_TTL)
    }

    /// Cache `inner` with a custom TTL
    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            entries: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(HashMap::new()),
        }
    }

    /// Change the lower bound between two forced refreshes
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured lower bound between forced refreshes
    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }

    /// The wrapped source
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop the cached set for one endpoint
    pub async fn invalidate(&self, endpoint: &str) {
        self.entries.write().await.remove(endpoint);
        self.last_refresh.write().await.remove(endpoint);
    }

    /// Drop every cached set
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        self.last_refresh.write().await.clear();
    }

    async fn fetch_and_store(&self, endpoint: &str) -> Result<JwkSet, JwksError> {
        self.fetch_and_store(endpoint).await
    }

    async fn refresh(&self, endpoint: &str) -> Result<Option<JwkSet>, JwksError> {
        {
            let mut last_refresh = self.last_refresh.write().await;
            if let Some(last) = last_refresh.get(endpoint)
                && last.elapsed() < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %endpoint,
                    since_last_ms = last.elapsed().as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                // Another caller may have refreshed in the meantime
                let entries = self.entries.read().await;
                return Ok(entries.get(endpoint).map(|cached| cached.keys.clone()));
            }
            // Failed refreshes count too
            last_refresh.insert(endpoint.to_string(), Instant::now());
        }

        info!(jwks_uri = %endpoint, "Refreshing JWKS");
        self.fetch_and_store(endpoint).await.map(Some)
    }
}

#[async_trait]
impl<S: KeySetSource> KeySetSource for CachedKeySetSource<S> {
    async fn fetch(&self, endpoint: &str) -> Result<JwkSet, JwksError> {
        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(endpoint)
                && cached.is_fresh(self.ttl)
            {
                debug!(jwks_uri = %endpoint, "Using cached JWKS");
                return Ok(cached.keys.clone());
            }
        }

        self.fetch_and_store(endpoint).await
    }

    async fn refresh(&self, endpoint: &str) -> Result<Option<JwkSet>, JwksError> {
        {
            let mut last_refresh = self.last_refresh.write().await;
            if let Some(last) = last_refresh.get(endpoint)
                && last.elapsed() < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %endpoint,
                    since_last_ms = last.elapsed().as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                // Another caller may have refreshed in the meantime
                let entries = self.entries.read().await;
                return Ok(entries.get(endpoint).map(|cached| cached.keys.clone()));
            }
            // Failed refreshes count too
            last_refresh.insert(endpoint.to_string(), Instant::now());
        }

        info!(jwks_uri = %endpoint, "Refreshing JWKS");
        self.fetch_and_store(endpoint).await.map(Some)
    }
}
