use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use service::cache::DefaultsCache;
use service::defaults::{DefaultsLoader, DefaultsMap};

use crate::errors::ApiError;

/// Process-cache key under which the defaults snapshot is stored.
pub const DEFAULTS_CACHE_KEY: &str = "defaults";

/// Shared handles the interceptor needs: the process-wide cache, the
/// loader that feeds it, and the configured entry TTL. Built once at
/// startup and cloned into the middleware; lives for the process
/// lifetime with no explicit teardown.
#[derive(Clone)]
pub struct DefaultsState {
    pub cache: Arc<DefaultsCache>,
    pub loader: Arc<dyn DefaultsLoader>,
    pub ttl: Duration,
}

/// Middleware: resolve the active defaults snapshot (populating the
/// process cache on miss or expiry) and publish it into the request's
/// extensions before the handler runs. The extensions map is torn down
/// with the request, so the slot needs no cleanup.
///
/// A loader failure with no last-known-good snapshot maps to HTTP 500.
pub async fn load_defaults(
    State(state): State<DefaultsState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let snapshot = state
        .cache
        .get_or_populate(DEFAULTS_CACHE_KEY, state.loader.as_ref(), state.ttl)
        .await?;
    req.extensions_mut().insert(snapshot);

    // Nothing to do on the way back out; the response passes through.
    Ok(next.run(req).await)
}

/// Read access to the request-scoped defaults snapshot.
///
/// Extraction never fails: a request that skipped `load_defaults`
/// yields an empty accessor, and `get` on any missing key returns the
/// empty string. Handler and view code can call it blindly.
#[derive(Clone, Default)]
pub struct RequestDefaults(Option<DefaultsMap>);

impl RequestDefaults {
    pub fn get(&self, key: &str) -> String {
        self.0
            .as_ref()
            .and_then(|d| d.get(key))
            .unwrap_or_default()
            .to_string()
    }

    pub fn snapshot(&self) -> Option<&DefaultsMap> {
        self.0.as_ref()
    }
}

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestDefaults {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<DefaultsMap>().cloned()))
    }
}
