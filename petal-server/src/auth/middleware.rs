use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use tower::{Layer, Service};

use petal_auth::{
    AuthError, Verb, check_delete_target, check_fetch_target, check_upload_commitment,
    verify_header,
};
use petal_core::hash;

use crate::error::reason_response;

/// How a route group decides which verb a request must be authorized for.
#[derive(Clone, Copy)]
enum VerbSource {
    /// The route serves exactly one verb.
    Fixed(Verb),
    /// The `/{sha256}` routes: GET, HEAD, and DELETE share a path and the
    /// method picks the verb.
    ByMethod,
}

/// Tower layer that enforces the capability for a route group.
#[derive(Clone)]
pub struct CapabilityLayer {
    source: VerbSource,
    body_limit: usize,
}

impl CapabilityLayer {
    /// Enforce a single verb on every request through this layer.
    pub fn fixed(verb: Verb, body_limit: usize) -> Self {
        Self {
            source: VerbSource::Fixed(verb),
            body_limit,
        }
    }

    /// Derive the verb from the request method (get/head/delete routes).
    pub fn by_method() -> Self {
        Self {
            source: VerbSource::ByMethod,
            body_limit: 0,
        }
    }
}

impl<S> Layer<S> for CapabilityLayer {
    type Service = CapabilityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CapabilityMiddleware {
            inner,
            source: self.source,
            body_limit: self.body_limit,
        }
    }
}

/// Tower service running the admission ladder before the handler.
#[derive(Clone)]
pub struct CapabilityMiddleware<S> {
    inner: S,
    source: VerbSource,
    body_limit: usize,
}

impl<S> Service<Request<Body>> for CapabilityMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let source = self.source;
        let body_limit = self.body_limit;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let verb = match resolve_verb(source, req.method()) {
                Some(verb) => verb,
                None => {
                    return Ok(reason_response(
                        StatusCode::METHOD_NOT_ALLOWED,
                        "method not allowed",
                    ));
                }
            };

            let auth_header = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned);
            let now = chrono::Utc::now().timestamp();

            let capability = match verify_header(auth_header.as_deref(), verb, now) {
                Ok(capability) => capability,
                Err(e) => return Ok(unauthorized(&e)),
            };

            match verb {
                Verb::Upload => {
                    // Bind the capability to this exact payload: buffer the
                    // body, hash it, and re-present the bytes downstream.
                    let (parts, body) = req.into_parts();
                    let bytes = match axum::body::to_bytes(body, body_limit).await {
                        Ok(bytes) => bytes,
                        Err(e) => return Ok(unauthorized(&AuthError::BodyRead(e.to_string()))),
                    };
                    let body_hash = hash::sha256_hex(&bytes);
                    if let Err(e) = check_upload_commitment(&capability, &body_hash) {
                        return Ok(unauthorized(&e));
                    }
                    req = Request::from_parts(parts, Body::from(bytes));
                }
                Verb::Delete => {
                    let target = hash_path_param(req.uri().path());
                    if let Err(e) = check_delete_target(&capability, &target) {
                        return Ok(unauthorized(&e));
                    }
                }
                Verb::Get | Verb::Head => {
                    let target = hash_path_param(req.uri().path());
                    let server_url = request_server_url(&req);
                    if let Err(e) = check_fetch_target(&capability, &target, &server_url) {
                        return Ok(unauthorized(&e));
                    }
                }
                Verb::List => {}
            }

            req.extensions_mut().insert(capability);
            inner.call(req).await
        })
    }
}

fn resolve_verb(source: VerbSource, method: &Method) -> Option<Verb> {
    match source {
        VerbSource::Fixed(verb) => Some(verb),
        VerbSource::ByMethod => match *method {
            Method::GET => Some(Verb::Get),
            Method::HEAD => Some(Verb::Head),
            Method::DELETE => Some(Verb::Delete),
            _ => None,
        },
    }
}

/// The hash path parameter: the final path segment with any short file
/// extension stripped.
fn hash_path_param(path: &str) -> String {
    let segment = path.rsplit('/').next().unwrap_or("");
    hash::strip_extension(segment).to_owned()
}

/// The scheme+host this request was served on, for `server`-tag capabilities.
fn request_server_url(req: &Request<Body>) -> String {
    let scheme = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    format!("{scheme}://{host}")
}

fn unauthorized(err: &AuthError) -> Response {
    reason_response(StatusCode::UNAUTHORIZED, &err.to_string())
}
