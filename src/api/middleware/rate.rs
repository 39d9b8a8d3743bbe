//! Per-caller rate limiting middleware.
//!
//! Sliding windows of 100 requests per minute and 1000 per hour, keyed by
//! bearer token prefix, else by peer IP address.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::middleware::auth::bearer_token;
use crate::api::types::ApiContext;

fn rate_key(req: &Request<axum::body::Body>) -> String {
    if let Some(token) = bearer_token(req.headers()) {
        let prefix: String = token.chars().take(16).collect();
        return format!("token:{prefix}");
    }
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => format!("ip:{}", peer.ip()),
        // In-process callers (tests) carry no connection info.
        None => "anonymous".to_string(),
    }
}

/// Returns 429 with `Retry-After` once a window is exhausted.
pub async fn limit(req: Request<axum::body::Body>, next: Next) -> Response {
    match limit_inner(req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let key = rate_key(&req);

    // MutexGuard is !Send, drop before .await
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter
            .check(&key)
            .map_err(|retry_after| ApiError::RateLimited { retry_after })?;
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn from_peer(peer: &str) -> Request<Body> {
        let mut req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn anonymous_callers_are_keyed_by_ip() {
        assert_eq!(rate_key(&from_peer("192.0.2.10:50000")), "ip:192.0.2.10");
        assert_eq!(rate_key(&from_peer("192.0.2.10:50001")), "ip:192.0.2.10");
        assert_eq!(rate_key(&from_peer("[2001:db8::1]:443")), "ip:2001:db8::1");
    }

    #[test]
    fn token_wins_over_peer_address() {
        let mut req = from_peer("192.0.2.10:50000");
        req.headers_mut()
            .insert("authorization", "Bearer 0123456789abcdefXYZ".parse().unwrap());
        assert_eq!(rate_key(&req), "token:0123456789abcdef");
    }

    #[test]
    fn no_connection_info_falls_back() {
        let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        assert_eq!(rate_key(&req), "anonymous");
    }
}
