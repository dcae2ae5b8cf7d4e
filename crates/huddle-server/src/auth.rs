// ABOUTME: Bearer token authentication middleware that resolves the caller's identity.
// ABOUTME: Checks Authorization on /api/* routes and stores an Identity in request extensions.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use tower::{Layer, Service};

/// User id used when no tokens are configured.
pub const LOCAL_USER: &str = "local";

/// Who is making an API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub is_admin: bool,
}

#[derive(Debug, Default)]
struct Identities {
    tokens: HashMap<String, String>,
    admins: HashSet<String>,
}

impl Identities {
    /// `None` means the request must be rejected.
    fn resolve(&self, authorization: Option<&str>) -> Option<Identity> {
        let user_id = if self.tokens.is_empty() {
            LOCAL_USER.to_string()
        } else {
            let token = authorization?.strip_prefix("Bearer ")?.trim();
            self.tokens.get(token)?.clone()
        };
        Some(Identity {
            is_admin: self.admins.contains(&user_id),
            user_id,
        })
    }
}

/// A tower Layer that authenticates API routes.
///
/// With no tokens configured every API request runs as [`LOCAL_USER`].
#[derive(Clone, Default)]
pub struct AuthLayer {
    identities: Arc<Identities>,
}

impl AuthLayer {
    pub fn new(tokens: HashMap<String, String>, admins: HashSet<String>) -> Self {
        Self {
            identities: Arc::new(Identities { tokens, admins }),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            identities: Arc::clone(&self.identities),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    identities: Arc<Identities>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let path = req.uri().path();
        if !(path == "/api" || path.starts_with("/api/")) {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        match self.identities.resolve(authorization) {
            Some(identity) => {
                req.extensions_mut().insert(identity);
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            None => Box::pin(async move { Ok(unauthorized()) }),
        }
    }
}

fn unauthorized() -> Response<Body> {
    let body = serde_json::json!({ "error": "unauthorized" }).to_string();
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    resp
}
