//! Applies the fixed set of security response headers every endpoint
//! returns, regardless of status code: `X-Content-Type-Options`,
//! `X-Frame-Options`, `Referrer-Policy`, `Cache-Control` (deny caching of
//! API responses, since several carry tenant-scoped financial data),
//! `Permissions-Policy`, `Content-Security-Policy`, and
//! `Strict-Transport-Security` outside development. Headers are only
//! inserted when the handler hasn't already set one — the image-fetch
//! route sets its own tighter `Referrer-Policy`/`Cache-Control` and that
//! choice must win over these defaults.

use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use tower::{Layer, Service};
use std::task::{Context, Poll};

fn insert_if_absent(headers: &mut HeaderMap, name: &'static str, value: &'static str) {
    if !headers.contains_key(name) {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

#[derive(Clone)]
pub struct SecurityHeadersLayer {
    pub hsts: bool,
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware { inner, hsts: self.hsts }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    hsts: bool,
}

impl<S, Req> Service<Req> for SecurityHeadersMiddleware<S>
where
    S: Service<Req, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let hsts = self.hsts;
        let future = self.inner.call(req);
        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();
            insert_if_absent(headers, "x-content-type-options", "nosniff");
            insert_if_absent(headers, "x-frame-options", "DENY");
            insert_if_absent(headers, "referrer-policy", "strict-origin-when-cross-origin");
            insert_if_absent(headers, "cache-control", "no-store, no-cache, must-revalidate, private");
            insert_if_absent(headers, "permissions-policy", "geolocation=(), camera=(), microphone=()");
            insert_if_absent(headers, "content-security-policy", "default-src 'none'; frame-ancestors 'none'");
            if hsts {
                insert_if_absent(headers, "strict-transport-security", "max-age=63072000; includeSubDomains");
            }
            Ok(response)
        })
    }
}
