//! Audit logging middleware.
//!
//! Records method, path and response status per caller. Runs innermost,
//! after auth has injected the `Actor`.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiContext;
use crate::workflow::Actor;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers strip the `/api` prefix from `uri()`
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let actor = req
        .extensions()
        .get::<Actor>()
        .map(|a| format!("user:{}", a.user_id))
        .unwrap_or_else(|| "anonymous".to_string());

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        tracing::debug!(%actor, %method, %path, status, "Request served");
        ctx.core
            .log_access(&actor, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
