//! Tower Layer for the authentication gate

use std::sync::Arc;
use tower::Layer;

use crate::strategy::AuthStrategy;

use super::service::AuthGateService;
use super::{FailureMode, GateConfig};

/// Tower Layer that puts [`AuthGateService`] in front of a service
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use my_copilot_auth::gate::AuthGateLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(AuthGateLayer::new(strategy))
///     .service(my_inner_service);
/// ```
#[derive(Debug, Clone)]
pub struct AuthGateLayer {
    strategy: Arc<AuthStrategy>,
    config: Arc<GateConfig>,
}

impl AuthGateLayer {
    /// Gate with the default configuration
    pub fn new(strategy: AuthStrategy) -> Self {
        Self::from_arc(Arc::new(strategy))
    }

    /// Gate with a custom configuration
    pub fn with_config(strategy: AuthStrategy, config: GateConfig) -> Self {
        Self::from_arc_with_config(Arc::new(strategy), config)
    }

    /// Gate sharing an existing strategy
    pub fn from_arc(strategy: Arc<AuthStrategy>) -> Self {
        Self::from_arc_with_config(strategy, GateConfig::default())
    }

    /// Gate sharing an existing strategy, with a custom configuration
    pub fn from_arc_with_config(strategy: Arc<AuthStrategy>, config: GateConfig) -> Self {
        Self {
            strategy,
            config: Arc::new(config),
        }
    }

    /// Add a path prefix that skips authentication
    #[must_use]
    pub fn bypass(self, prefix: impl Into<String>) -> Self {
        let config = (*self.config).clone().bypass_prefix(prefix);
        Self {
            strategy: self.strategy,
            config: Arc::new(config),
        }
    }

    /// Set the response for rejected requests
    #[must_use]
    pub fn failure_mode(self, mode: FailureMode) -> Self {
        let config = (*self.config).clone().failure_mode(mode);
        Self {
            strategy: self.strategy,
            config: Arc::new(config),
        }
    }

    /// Current configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

impl<S> Layer<S> for AuthGateLayer {
    type Service = AuthGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthGateService::new(inner, Arc::clone(&self.strategy), Arc::clone(&self.config))
    }
}
