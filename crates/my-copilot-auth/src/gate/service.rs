//! Tower Service implementation for the authentication gate
//!
//! For each request the service:
//! 1. forwards bypassed paths untouched
//! 2. reads the `Authorization` header
//! 3. runs the [`AuthStrategy`]
//! 4. on success inserts the [`Identity`](crate::Identity) into the request
//!    extensions and calls the inner service
//! 5. on failure logs the reason and answers with a redirect or `401`
//!
//! Rejections are responses, not errors, so the service's error type is the
//! inner service's.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{AUTHORIZATION, LOCATION, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use tower_service::Service;
use tracing::warn;

use crate::strategy::AuthStrategy;

use super::{FailureMode, GateConfig};

/// Future returned by [`AuthGateService`]
pub type AuthGateFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Tower Service that authenticates requests before forwarding them
#[derive(Debug, Clone)]
pub struct AuthGateService<S> {
    inner: S,
    strategy: Arc<AuthStrategy>,
    config: Arc<GateConfig>,
}

impl<S> AuthGateService<S> {
    /// Wrap `inner`
    pub fn new(inner: S, strategy: Arc<AuthStrategy>, config: Arc<GateConfig>) -> Self {
        Self {
            inner,
            strategy,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

fn rejection<B: Default>(config: &GateConfig) -> http::Response<B> {
    let mut response = http::Response::new(B::default());

    if config.failure_mode == FailureMode::Redirect
        && let Ok(location) = HeaderValue::from_str(&config.login_path)
    {
        *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
        response.headers_mut().insert(LOCATION, location);
        return response;
    }

    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

impl<S, B, ResBody> Service<http::Request<B>> for AuthGateService<S>
where
    S: Service<http::Request<B>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = AuthGateFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        // The clone is not ready; keep the ready one for this call.
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let strategy = Arc::clone(&self.strategy);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            match strategy.authenticate(authorization.as_deref()).await {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    inner.call(req).await
                }
                Err(failure) => {
                    warn!(
                        path = %req.uri().path(),
                        kind = failure.kind(),
                        error = %failure,
                        strategy = strategy.name(),
                        "Request rejected by authentication gate"
                    );
                    Ok(rejection(&config))
                }
            }
        })
    }
}
