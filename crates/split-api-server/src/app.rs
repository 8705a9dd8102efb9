//! Router assembly.

use axum::{
    extract::Extension,
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::auth::{self, JwtManager};
use crate::config::Settings;
use crate::database::SessionStore;
use crate::handlers;
use crate::security::SessionAccess;

pub fn build_router(
    store: Arc<dyn SessionStore>,
    access: Arc<SessionAccess>,
    jwt_manager: Arc<JwtManager>,
    settings: Arc<Settings>,
) -> Router {
    // Public routes: health plus the anonymous collaborative surface.
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route(
            "/api/sessions/{id}/data",
            get(handlers::collab::get_session_data_handler)
                .put(handlers::collab::replace_session_data_handler),
        )
        .route("/api/settle", post(handlers::settle::settle_handler));

    // Owner routes (bearer-token gated)
    let owner_routes = Router::new()
        .route(
            "/api/sessions",
            post(handlers::sessions::create_session_handler)
                .get(handlers::sessions::list_sessions_handler),
        )
        .route(
            "/api/sessions/{id}",
            patch(handlers::sessions::update_session_handler)
                .delete(handlers::sessions::delete_session_handler),
        )
        .layer(middleware::from_fn(auth::require_owner));

    Router::new()
        .merge(public_routes)
        .merge(owner_routes)
        // Shared state
        .layer(Extension(store))
        .layer(Extension(access))
        .layer(Extension(jwt_manager))
        .layer(Extension(settings))
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, DatabaseConfig, ServerConfig, SessionConfig};
    use crate::database::{MockSessionStore, Participant, Session, SessionData};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const OWNER: Uuid = Uuid::from_u128(0xA11CE);
    const OTHER_OWNER: Uuid = Uuid::from_u128(0xB0B);
    const SID: Uuid = Uuid::from_u128(0x5E55);

    fn test_settings() -> Arc<Settings> {
        Arc::new(Settings {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_url: "http://split.test".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                pool_max_size: 1,
                pool_timeout_seconds: 1,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_expiry_hours: 1,
            },
            session: SessionConfig {
                default_duration_hours: 24.0,
                max_duration_hours: 720.0,
                cleanup_interval_hours: 1,
            },
        })
    }

    fn test_app(mock: MockSessionStore) -> (Router, String) {
        let store: Arc<dyn SessionStore> = Arc::new(mock);
        let access = Arc::new(SessionAccess::new(store.clone()));
        let jwt_manager = Arc::new(JwtManager::new("test-secret", 1));
        let token = jwt_manager.generate_token(OWNER).unwrap();
        let router = build_router(store, access, jwt_manager, test_settings());
        (router, token)
    }

    fn session(owner_id: Uuid, hours_left: i64, active: bool) -> Session {
        let now = Utc::now();
        Session {
            id: SID,
            owner_id,
            name: Some("dinner".to_string()),
            created_at: now - Duration::hours(2),
            expires_at: now + Duration::hours(hours_left),
            is_active: active,
            data: SessionData {
                participants: vec![Participant {
                    name: "Alice".to_string(),
                    amount: 40.0,
                }],
            },
        }
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn owner_routes_reject_missing_and_bad_tokens() {
        let (app, _) = test_app(MockSessionStore::new());
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/sessions", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "unauthorized");

        let response = app
            .oneshot(request(Method::GET, "/api/sessions", Some("garbage"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_session_clamps_requested_duration_to_the_maximum() {
        let mut mock = MockSessionStore::new();
        mock.expect_create()
            .withf(|owner_id, name, hours| {
                *owner_id == OWNER && name.as_deref() == Some("trip") && *hours == 720.0
            })
            .returning(|owner_id, name, hours| {
                let now = Utc::now();
                Ok(Session {
                    id: SID,
                    owner_id,
                    name,
                    created_at: now,
                    expires_at: now + Duration::milliseconds((hours * 3_600_000.0) as i64),
                    is_active: true,
                    data: SessionData::default(),
                })
            });

        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/sessions",
                Some(&token),
                Some(json!({"name": "trip", "expirationHours": 10_000})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["sessionId"], SID.to_string());
        assert_eq!(body["url"], format!("http://split.test/s/{}", SID));
        assert!(body["expiresAt"].is_i64());
    }

    #[tokio::test]
    async fn list_reports_the_derived_expired_flag() {
        let mut mock = MockSessionStore::new();
        mock.expect_list_by_owner()
            .with(eq(OWNER))
            .returning(|owner_id| {
                let mut expired = session(owner_id, -1, true);
                expired.id = Uuid::from_u128(1);
                Ok(vec![session(owner_id, 12, true), expired])
            });

        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(Method::GET, "/api/sessions", Some(&token), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0]["isExpired"], false);
        assert_eq!(sessions[1]["isExpired"], true);
        assert_eq!(sessions[0]["participantCount"], 1);
        assert_eq!(sessions[0]["url"], format!("http://split.test/s/{}", SID));
    }

    #[tokio::test]
    async fn patch_distinguishes_missing_from_foreign_sessions() {
        let mut mock = MockSessionStore::new();
        mock.expect_get().with(eq(SID)).returning(|_| Ok(None));
        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::PATCH,
                &format!("/api/sessions/{SID}"),
                Some(&token),
                Some(json!({"isActive": false})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "session_not_found");

        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .returning(|_| Ok(Some(session(OTHER_OWNER, 12, true))));
        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::PATCH,
                &format!("/api/sessions/{SID}"),
                Some(&token),
                Some(json!({"isActive": false})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "forbidden");
    }

    #[tokio::test]
    async fn patch_extends_through_the_store_with_the_requested_hours() {
        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .times(2)
            .returning(|_| Ok(Some(session(OWNER, 12, true))));
        mock.expect_extend_expiration()
            .with(eq(SID), eq(OWNER), eq(24.0))
            .times(1)
            .returning(|_, _, _| Ok(true));

        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::PATCH,
                &format!("/api/sessions/{SID}"),
                Some(&token),
                Some(json!({"extendHours": 24})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["session"]["id"], SID.to_string());
        assert_eq!(body["session"]["isActive"], true);
    }

    #[tokio::test]
    async fn patch_rejects_non_positive_extensions() {
        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .returning(|_| Ok(Some(session(OWNER, 12, true))));

        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::PATCH,
                &format!("/api/sessions/{SID}"),
                Some(&token),
                Some(json!({"extendHours": -3})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn delete_conflates_missing_and_foreign_into_not_found() {
        let mut mock = MockSessionStore::new();
        mock.expect_delete()
            .with(eq(SID), eq(OWNER))
            .returning(|_, _| Ok(false));
        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::DELETE,
                &format!("/api/sessions/{SID}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut mock = MockSessionStore::new();
        mock.expect_delete()
            .with(eq(SID), eq(OWNER))
            .returning(|_, _| Ok(true));
        let (app, token) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::DELETE,
                &format!("/api/sessions/{SID}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn public_get_answers_not_found_for_expired_sessions() {
        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .returning(|_| Ok(Some(session(OWNER, -1, true))));

        let (app, _) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::GET,
                &format!("/api/sessions/{SID}/data"),
                None,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"],
            "session_not_found_or_expired"
        );
    }

    #[tokio::test]
    async fn public_endpoints_answer_not_found_for_disabled_sessions() {
        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .returning(|_| Ok(Some(session(OWNER, 12, false))));

        let (app, _) = test_app(mock);
        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                &format!("/api/sessions/{SID}/data"),
                None,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(
                Method::PUT,
                &format!("/api/sessions/{SID}/data"),
                None,
                Some(json!({"participants": []})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"],
            "session_not_found_or_expired"
        );
    }

    #[tokio::test]
    async fn public_get_returns_the_session_payload() {
        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .returning(|_| Ok(Some(session(OWNER, 12, true))));

        let (app, _) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::GET,
                &format!("/api/sessions/{SID}/data"),
                None,
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sessionId"], SID.to_string());
        assert_eq!(body["data"]["participants"][0]["name"], "Alice");
        // Owner identity never crosses the public boundary.
        assert!(body.get("ownerId").is_none());
    }

    #[tokio::test]
    async fn public_put_rejects_malformed_payloads_before_any_store_call() {
        // No expectations: any store call panics the test.
        let (app, _) = test_app(MockSessionStore::new());
        let response = app
            .oneshot(request(
                Method::PUT,
                &format!("/api/sessions/{SID}/data"),
                None,
                Some(json!({"participants": 5})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "invalid_participants_data"
        );
    }

    #[tokio::test]
    async fn public_put_overwrites_the_whole_participant_list() {
        let mut mock = MockSessionStore::new();
        mock.expect_get()
            .with(eq(SID))
            .returning(|_| Ok(Some(session(OWNER, 12, true))));
        mock.expect_replace_data()
            .withf(|id, participants| {
                *id == SID
                    && participants
                        == &[
                            Participant {
                                name: "Alice".to_string(),
                                amount: 40.0,
                            },
                            Participant {
                                name: "Bob".to_string(),
                                amount: 0.0,
                            },
                        ]
            })
            .times(1)
            .returning(|_, _| Ok(true));

        let (app, _) = test_app(mock);
        let response = app
            .oneshot(request(
                Method::PUT,
                &format!("/api/sessions/{SID}/data"),
                None,
                Some(json!({"participants": [
                    {"name": "Alice", "amount": 40.0},
                    {"name": "Bob", "amount": 0},
                ]})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sessionId"], SID.to_string());
        assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn settle_endpoint_computes_the_transfer_plan() {
        let (app, _) = test_app(MockSessionStore::new());
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/settle",
                None,
                Some(json!({"participants": [
                    {"name": "Alice", "amount": 40},
                    {"name": "Bob", "amount": 0},
                    {"name": "Cara", "amount": 20},
                ]})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 60.0);
        assert!(body["shares"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["share"] == 20.0));
        assert_eq!(body["transfers"][0]["from"], "Bob");
        assert_eq!(body["transfers"][0]["to"], "Alice");
        assert_eq!(body["transfers"][0]["amount"], 20.0);
    }

    #[tokio::test]
    async fn health_endpoints_are_public() {
        let mut mock = MockSessionStore::new();
        mock.expect_ping().returning(|| Ok(()));

        let (app, _) = test_app(mock);
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/health/ready", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
