//! HTTP router.
//!
//! Routes are nested under `/api/`. Middleware stack (outermost → innermost):
//! CORS → Extension → Rate limit → Auth → Audit → Handler.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router around shared state.
///
/// Middleware reads `ApiContext` from request extensions; handlers get it as
/// `State<ApiContext>`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin {
        None => layer,
        Some("*") => layer.allow_origin(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(e) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin: {e}");
                layer
            }
        },
    }
}

pub(crate) fn build_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.core.config.max_upload_bytes;
    let cors = cors_layer(ctx.core.config.cors_origin.as_deref());

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route(
            "/enquiries",
            get(endpoints::enquiries::list).post(endpoints::enquiries::create),
        )
        .route(
            "/enquiries/validate-step",
            post(endpoints::enquiries::validate_step),
        )
        .route(
            "/enquiries/:id",
            get(endpoints::enquiries::detail).delete(endpoints::enquiries::delete),
        )
        .route("/enquiries/:id/forward", patch(endpoints::enquiries::forward))
        .route("/enquiries/:id/approve", patch(endpoints::enquiries::approve))
        .route("/enquiries/:id/reject", patch(endpoints::enquiries::reject))
        .route("/enquiries/:id/dispatch", patch(endpoints::enquiries::dispatch))
        .route("/enquiries/:id/complete", patch(endpoints::enquiries::complete))
        .route("/enquiries/:id/escalate", post(endpoints::enquiries::escalate))
        .route(
            "/enquiries/:id/escalations",
            get(endpoints::enquiries::escalation_history),
        )
        .route(
            "/case-queries",
            get(endpoints::case_queries::list).post(endpoints::case_queries::raise),
        )
        .route(
            "/case-queries/:id/respond",
            post(endpoints::case_queries::respond),
        )
        .route(
            "/districts",
            get(endpoints::directory::list_districts).post(endpoints::directory::create_district),
        )
        .route(
            "/hospitals",
            get(endpoints::directory::list_hospitals).post(endpoints::directory::create_hospital),
        )
        .route(
            "/ambulances",
            get(endpoints::ambulances::list).post(endpoints::ambulances::create),
        )
        .route("/ambulances/stats", get(endpoints::ambulances::stats))
        .route(
            "/ambulances/:id",
            get(endpoints::ambulances::detail)
                .put(endpoints::ambulances::update)
                .delete(endpoints::ambulances::delete),
        )
        .route(
            "/ambulances/:id/status",
            patch(endpoints::ambulances::set_status),
        )
        .route(
            "/users/:id",
            get(endpoints::users::detail).put(endpoints::users::update),
        )
        .route(
            "/users/:id/change-password",
            post(endpoints::users::change_password),
        )
        .route("/tracker/stream", get(endpoints::tracker::stream))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    // Rate-limited only
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/signup", post(endpoints::auth::signup))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", protected)
        .nest("/api", public)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::accounts::{self, SignupRequest};
    use crate::config::AppConfig;
    use crate::models::enums::Role;
    use crate::models::User;
    use crate::test_support::{seed_directory, Directory};
    use crate::workflow::Actor;

    const PASSWORD: &str = "correct-horse-1";
    const BOUNDARY: &str = "aerocare-test-boundary";

    struct Harness {
        core: Arc<CoreState>,
        app: Router,
        _tmp: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(AppConfig::with_data_dir(tmp.path())));
        core.init_storage().unwrap();
        let app = api_router(core.clone());
        Harness { core, app, _tmp: tmp }
    }

    impl Harness {
        fn directory(&self) -> Directory {
            seed_directory(&self.core.open_db().unwrap())
        }

        fn user(&self, role: Role, district_id: Option<uuid::Uuid>, email: &str) -> User {
            let conn = self.core.open_db().unwrap();
            accounts::create_user(
                &conn,
                SignupRequest {
                    name: email.split('@').next().unwrap().to_string(),
                    email: email.to_string(),
                    phone: None,
                    password: PASSWORD.to_string(),
                    role,
                    district_id,
                },
                chrono::Utc::now(),
            )
            .unwrap()
        }

        fn token_for(&self, user: &User) -> String {
            self.core.write_sessions().unwrap().issue(Actor::from_user(user))
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    fn multipart_enquiry(dir: &Directory, token: &str) -> Request<Body> {
        let source = dir.source.id.to_string();
        let destination = dir.destination.id.to_string();
        let district = dir.district.id.to_string();
        let fields = [
            ("patient_name", "Asha Devi"),
            ("patient_age", "54"),
            ("patient_gender", "Female"),
            ("abha_number", "12345678901234"),
            ("medical_condition", "Cardiac arrest"),
            ("chief_complaint", "Chest pain"),
            ("vitals", "Unstable"),
            ("source_hospital_id", source.as_str()),
            ("destination_hospital_id", destination.as_str()),
            ("district_id", district.as_str()),
            ("transportation_category", "Air"),
            ("contact_name", "Ravi Kumar"),
            ("contact_phone", "9876543210"),
        ];

        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"document_medical_report\"; filename=\"report.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4 discharge summary\r\n"
        ));
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/api/enquiries")
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness();
        let (status, body) = h.send(request("GET", "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let h = harness();
        let (status, body) = h.send(request("GET", "/api/enquiries", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_REQUIRED");

        let (status, _) = h
            .send(request("GET", "/api/enquiries", Some("not-a-session"), None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_login_and_logout() {
        let h = harness();
        let (status, body) = h
            .send(request(
                "POST",
                "/api/auth/signup",
                None,
                Some(json!({
                    "name": "Dr Mehta",
                    "email": "mehta@example.org",
                    "password": PASSWORD,
                    "role": "CMO"
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.get("password_hash").is_none());

        let (status, body) = h
            .send(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "mehta@example.org", "password": PASSWORD})),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "CMO");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = h.send(request("GET", "/api/enquiries", Some(token.as_str()), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = h.send(request("POST", "/api/auth/logout", Some(token.as_str()), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = h.send(request("GET", "/api/enquiries", Some(token.as_str()), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_cannot_claim_admin() {
        let h = harness();
        let (status, body) = h
            .send(request(
                "POST",
                "/api/auth/signup",
                None,
                Some(json!({
                    "name": "Mallory",
                    "email": "mallory@example.org",
                    "password": PASSWORD,
                    "role": "ADMIN"
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let h = harness();
        h.user(Role::Cmo, None, "cmo@example.org");
        let (status, body) = h
            .send(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "cmo@example.org", "password": "wrong-password"})),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn enquiry_moves_through_forward_with_role_checks() {
        let h = harness();
        let dir = h.directory();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let sdm = h.user(Role::Sdm, Some(dir.district.id), "sdm@example.org");
        let cmo_token = h.token_for(&cmo);
        let sdm_token = h.token_for(&sdm);

        let (status, body) = h.send(multipart_enquiry(&dir, &cmo_token)).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["documents"].as_array().unwrap().len(), 1);
        let id = body["id"].as_str().unwrap().to_string();

        // Only an SDM may forward
        let (status, body) = h
            .send(request("PATCH", &format!("/api/enquiries/{id}/forward"), Some(cmo_token.as_str()), None))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, body) = h
            .send(request("PATCH", &format!("/api/enquiries/{id}/forward"), Some(sdm_token.as_str()), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "FORWARDED");

        let (status, body) = h
            .send(request("PATCH", &format!("/api/enquiries/{id}/forward"), Some(sdm_token.as_str()), None))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ILLEGAL_TRANSITION");
    }

    #[tokio::test]
    async fn pending_enquiry_cannot_be_approved() {
        let h = harness();
        let dir = h.directory();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let dm = h.user(Role::Dm, Some(dir.district.id), "dm@example.org");
        let (_, body) = h.send(multipart_enquiry(&dir, &h.token_for(&cmo))).await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = h
            .send(request(
                "PATCH",
                &format!("/api/enquiries/{id}/approve"),
                Some(h.token_for(&dm).as_str()),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ILLEGAL_TRANSITION");
    }

    #[tokio::test]
    async fn out_of_scope_enquiry_is_not_found() {
        let h = harness();
        let dir = h.directory();
        let owner = h.user(Role::Cmo, None, "owner@example.org");
        let other = h.user(Role::Cmo, None, "other@example.org");
        let (_, body) = h.send(multipart_enquiry(&dir, &h.token_for(&owner))).await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = h
            .send(request("GET", &format!("/api/enquiries/{id}"), Some(h.token_for(&other).as_str()), None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = h
            .send(request("GET", &format!("/api/enquiries/{id}"), Some(h.token_for(&owner).as_str()), None))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cmo_listing_shows_only_own_submissions() {
        let h = harness();
        let dir = h.directory();
        let first = h.user(Role::Cmo, None, "first@example.org");
        let second = h.user(Role::Cmo, None, "second@example.org");
        let first_token = h.token_for(&first);
        let second_token = h.token_for(&second);
        let (_, a) = h.send(multipart_enquiry(&dir, &first_token)).await;
        let (_, b) = h.send(multipart_enquiry(&dir, &second_token)).await;

        let (status, body) = h.send(request("GET", "/api/enquiries", Some(second_token.as_str()), None)).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body.as_array().unwrap().iter().map(|e| e["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![b["id"].as_str().unwrap()]);

        let (_, body) = h.send(request("GET", "/api/enquiries", Some(first_token.as_str()), None)).await;
        let ids: Vec<&str> = body.as_array().unwrap().iter().map(|e| e["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![a["id"].as_str().unwrap()]);
    }

    #[tokio::test]
    async fn escalated_dispatch_keeps_its_ambulance_until_completion() {
        let h = harness();
        let dir = h.directory();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let sdm = h.user(Role::Sdm, Some(dir.district.id), "sdm@example.org");
        let dm = h.user(Role::Dm, Some(dir.district.id), "dm@example.org");
        let ops = h.user(Role::Support, None, "ops@example.org");
        let (sdm_t, dm_t, ops_t) = (h.token_for(&sdm), h.token_for(&dm), h.token_for(&ops));
        let unit = crate::test_support::seed_ambulance(
            &h.core.open_db().unwrap(),
            "Garud-5",
            crate::models::enums::AmbulanceStatus::Available,
        );

        let (_, body) = h.send(multipart_enquiry(&dir, &h.token_for(&cmo))).await;
        let id = body["id"].as_str().unwrap().to_string();
        let step = |path: &str, token: &str, body: Option<Value>| {
            request("PATCH", &format!("/api/enquiries/{id}/{path}"), Some(token), body)
        };
        assert_eq!(h.send(step("forward", sdm_t.as_str(), None)).await.0, StatusCode::OK);
        assert_eq!(h.send(step("approve", dm_t.as_str(), None)).await.0, StatusCode::OK);
        let (status, _) = h
            .send(step("dispatch", ops_t.as_str(), Some(json!({"ambulance_id": unit.id}))))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = h
            .send(request(
                "POST",
                &format!("/api/enquiries/{id}/escalate"),
                Some(sdm_t.as_str()),
                Some(json!({"reason": "Weather over destination", "escalated_to": "District Magistrate"})),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        let unit_uri = format!("/api/ambulances/{}/status", unit.id);
        let (status, _) = h
            .send(request("PATCH", &unit_uri, Some(ops_t.as_str()), Some(json!({"status": "available"}))))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = h.send(step("approve", dm_t.as_str(), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "IN_PROGRESS");
        assert_eq!(body["ambulance_id"], unit.id.to_string());

        let (status, _) = h.send(step("complete", ops_t.as_str(), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = h
            .send(request("GET", &format!("/api/ambulances/{}", unit.id), Some(ops_t.as_str()), None))
            .await;
        assert_eq!(body["status"], "available");
    }

    #[tokio::test]
    async fn anonymous_rate_limit_is_per_peer() {
        let h = harness();
        let from = |peer: &str| {
            let mut req = request("GET", "/api/health", None, None);
            req.extensions_mut()
                .insert(axum::extract::ConnectInfo(peer.parse::<std::net::SocketAddr>().unwrap()));
            req
        };
        for _ in 0..100 {
            assert_eq!(h.send(from("192.0.2.1:40000")).await.0, StatusCode::OK);
        }
        let (status, body) = h.send(from("192.0.2.1:40001")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "RATE_LIMITED");

        assert_eq!(h.send(from("198.51.100.7:40000")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn query_accepts_exactly_one_response() {
        let h = harness();
        let dir = h.directory();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let sdm = h.user(Role::Sdm, Some(dir.district.id), "sdm@example.org");
        let cmo_token = h.token_for(&cmo);
        let (_, body) = h.send(multipart_enquiry(&dir, &cmo_token)).await;
        let enquiry_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = h
            .send(request(
                "POST",
                "/api/case-queries",
                Some(h.token_for(&sdm).as_str()),
                Some(json!({"enquiry_id": enquiry_id, "query_text": "Is the patient ventilated?"})),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let query_id = body["id"].as_str().unwrap().to_string();

        let respond = |text: &str| {
            request(
                "POST",
                &format!("/api/case-queries/{query_id}/respond"),
                Some(cmo_token.as_str()),
                Some(json!({ "response_text": text })),
            )
        };
        let (status, body) = h.send(respond("Yes, since 04:00")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response_text"], "Yes, since 04:00");

        let (status, body) = h.send(respond("Correction")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_RESPONDED");

        let (status, body) = h
            .send(request("GET", "/api/case-queries?status=RESPONDED", Some(cmo_token.as_str()), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn validate_step_reports_field_errors() {
        let h = harness();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let token = h.token_for(&cmo);

        let (status, body) = h
            .send(request(
                "POST",
                "/api/enquiries/validate-step",
                Some(token.as_str()),
                Some(json!({"step": "contact", "contact_name": "Ravi", "contact_phone": "12345"})),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = h
            .send(request(
                "POST",
                "/api/enquiries/validate-step",
                Some(token.as_str()),
                Some(json!({"step": "contact", "contact_name": "Ravi", "contact_phone": "9876543210"})),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
    }

    #[tokio::test]
    async fn malformed_input_gets_flat_error_body() {
        let h = harness();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let token = h.token_for(&cmo);

        let (status, body) = h
            .send(request("GET", "/api/enquiries/not-a-uuid", Some(token.as_str()), None))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let bad_json = Request::builder()
            .method("POST")
            .uri("/api/case-queries")
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = h.send(bad_json).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn fleet_routes_respect_roles() {
        let h = harness();
        let admin = h.user(Role::Admin, None, "admin@example.org");
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        let ambulance = json!({
            "registration_number": "vt-abc",
            "call_sign": "Falcon 1",
            "kind": "helicopter"
        });

        let (status, _) = h
            .send(request("POST", "/api/ambulances", Some(h.token_for(&cmo).as_str()), Some(ambulance.clone())))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin_token = h.token_for(&admin);
        let (status, body) = h
            .send(request("POST", "/api/ambulances", Some(admin_token.as_str()), Some(ambulance)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["registration_number"], "VT-ABC");

        let (status, body) = h.send(request("GET", "/api/ambulances/stats", Some(admin_token.as_str()), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn audit_records_protected_requests() {
        let h = harness();
        let cmo = h.user(Role::Cmo, None, "cmo@example.org");
        h.send(request("GET", "/api/enquiries", Some(h.token_for(&cmo).as_str()), None)).await;

        let entries = h.core.audit_entries();
        let expected_actor = format!("user:{}", cmo.id);
        assert!(entries
            .iter()
            .any(|e| e.actor == expected_actor && e.action == "GET /api/enquiries" && e.outcome == "status:200"));
    }
}
