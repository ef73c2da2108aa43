pub mod auth;
pub mod error;
pub mod rate_limit;
pub mod response;
mod rooms;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::AppState;

pub use rooms::RoomPayload;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login is public but throttled per client IP
    let login_routes = Router::new()
        .route("/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::throttle_login,
        ));

    // Protected API routes
    let api_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::me))
        // Rooms
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/rooms/:id",
            get(rooms::get_room)
                .put(rooms::update_room)
                .patch(rooms::update_room)
                .delete(rooms::delete_room),
        )
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", login_routes.merge(api_routes))
        .layer(cors_layer(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the browser front end. No configured origins means any origin.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::api::rooms::ROOMS_READ;
    use crate::db::{count_tokens_for_user, Role};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app_with(config: Config) -> (Router, Arc<AppState>) {
        let pool = crate::db::test_pool().await;
        crate::auth::create_user(&pool, "admin@hotel.test", "letmein", "Admin", Role::Admin)
            .await
            .unwrap();
        let state = Arc::new(AppState::new(config, pool));
        (create_router(state.clone()), state)
    }

    async fn test_app() -> (Router, Arc<AppState>) {
        test_app_with(Config::default()).await
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn login(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "admin@hotel.test", "password": "letmein"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("OK"));
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_401() {
        let (app, state) = test_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "a@x.com", "password": "secret"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"message": "invalid credentials", "status": 401}));

        let (tokens,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM personal_access_tokens")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(tokens, 0);
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_indistinguishable() {
        let (app, _) = test_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "admin@hotel.test", "password": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid credentials");
    }

    #[tokio::test]
    async fn test_login_returns_token_for_user() {
        let (app, _) = test_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "admin@hotel.test", "password": "letmein"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Authenticated");
        assert_eq!(body["status"], 200);
        let token = body["data"]["token"].as_str().unwrap();

        let (status, me) = send(&app, "GET", "/api/user", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "admin@hotel.test");
        assert_eq!(me["role"], "admin");
        assert!(me.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_login_validation() {
        let (app, _) = test_app().await;

        let (status, body) = send(&app, "POST", "/api/login", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["email"].is_array());
        assert!(body["errors"]["password"].is_array());

        let (status, body) = send(&app, "POST", "/api/login", None, Some(json!("nope"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (app, _) = test_app().await;

        let (status, body) = send(&app, "GET", "/api/rooms", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthenticated.");

        let (status, _) = send(&app, "GET", "/api/rooms", Some("1|forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "POST", "/api/logout", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (app, state) = test_app().await;
        let token = login(&app).await;
        let other = login(&app).await;

        let (status, body) = send(&app, "POST", "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Logged out");

        let (status, _) = send(&app, "GET", "/api/rooms", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "GET", "/api/rooms", Some(&other), None).await;
        assert_eq!(status, StatusCode::OK);

        let admin = crate::db::find_user_by_email(&state.db, "admin@hotel.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count_tokens_for_user(&state.db, admin.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_room_lifecycle() {
        let (app, _) = test_app().await;
        let token = login(&app).await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/rooms",
            Some(&token),
            Some(json!({
                "room_number": "101",
                "type": "single",
                "price_per_night": 50,
                "status": "available"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (_, other) = send(
            &app,
            "POST",
            "/api/rooms",
            Some(&token),
            Some(json!({
                "room_number": "202",
                "type": "double",
                "price_per_night": "80",
                "status": "occupied"
            })),
        )
        .await;

        let (status, rooms) = send(&app, "GET", "/api/rooms", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = rooms
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["id"] == id)
            .unwrap();
        assert_eq!(listed["room_number"], "101");
        assert_eq!(listed["type"], "single");
        assert_eq!(listed["price_per_night"], 50.0);
        assert_eq!(listed["status"], "available");

        let (status, updated) = send(
            &app,
            "PATCH",
            &format!("/api/rooms/{}", id),
            Some(&token),
            Some(json!({"price_per_night": 55, "status": "maintenance"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price_per_night"], 55.0);
        assert_eq!(updated["status"], "maintenance");
        assert_eq!(updated["room_number"], "101");

        let other_id = other["id"].as_i64().unwrap();
        let (_, unchanged) =
            send(&app, "GET", &format!("/api/rooms/{}", other_id), Some(&token), None).await;
        assert_eq!(unchanged, other);

        let (status, body) =
            send(&app, "DELETE", &format!("/api/rooms/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Room deleted");

        let (_, rooms) = send(&app, "GET", "/api/rooms", Some(&token), None).await;
        assert!(rooms.as_array().unwrap().iter().all(|r| r["id"] != id));
        assert_eq!(rooms.as_array().unwrap().len(), 1);

        let (status, body) =
            send(&app, "DELETE", &format!("/api/rooms/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Room not found");
    }

    #[tokio::test]
    async fn test_put_replaces_fields() {
        let (app, _) = test_app().await;
        let token = login(&app).await;

        let (_, created) = send(
            &app,
            "POST",
            "/api/rooms",
            Some(&token),
            Some(json!({"room_number": "3", "type": "suite", "price_per_night": 300})),
        )
        .await;
        assert_eq!(created["status"], "available");

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/rooms/{}", created["id"]),
            Some(&token),
            Some(json!({
                "room_number": "3A",
                "type": "double",
                "price_per_night": "120.5",
                "status": "occupied"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["room_number"], "3A");
        assert_eq!(updated["type"], "double");
        assert_eq!(updated["price_per_night"], 120.5);
        assert_eq!(updated["status"], "occupied");
    }

    #[tokio::test]
    async fn test_room_validation_errors() {
        let (app, _) = test_app().await;
        let token = login(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/rooms",
            Some(&token),
            Some(json!({"room_number": "", "type": "loft", "price_per_night": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], 422);
        assert!(body["errors"]["room_number"].is_array());
        assert!(body["errors"]["type"].is_array());
        assert!(body["errors"]["price_per_night"].is_array());
        assert!(body["errors"].get("status").is_none());

        let (_, rooms) = send(&app, "GET", "/api/rooms", Some(&token), None).await;
        assert!(rooms.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_room_is_404() {
        let (app, _) = test_app().await;
        let token = login(&app).await;

        let (status, _) = send(
            &app,
            "PUT",
            "/api/rooms/999",
            Some(&token),
            Some(json!({"status": "occupied"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/api/rooms/999", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    fn login_attempt(forwarded_for: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::from(
                json!({"email": "a@x.com", "password": "guess"}).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_is_throttled() {
        let mut config = Config::default();
        config.rate_limit.login_attempts_per_window = 2;
        let (app, _) = test_app_with(config).await;

        for _ in 0..2 {
            let response = app.clone().oneshot(login_attempt("198.51.100.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key("X-RateLimit-Remaining"));
        }

        let response = app.clone().oneshot(login_attempt("198.51.100.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_does_not_reset_throttle() {
        let mut config = Config::default();
        config.rate_limit.login_attempts_per_window = 2;
        let (app, _) = test_app_with(config).await;

        let mut statuses = Vec::new();
        for i in 0..3 {
            let response = app
                .clone()
                .oneshot(login_attempt(&format!("10.0.0.{}", i)))
                .await
                .unwrap();
            statuses.push(response.status());
        }

        assert_eq!(
            statuses,
            vec![
                StatusCode::UNAUTHORIZED,
                StatusCode::UNAUTHORIZED,
                StatusCode::TOO_MANY_REQUESTS
            ]
        );
    }

    #[tokio::test]
    async fn test_trusted_proxy_headers_split_buckets() {
        let mut config = Config::default();
        config.rate_limit.login_attempts_per_window = 2;
        config.rate_limit.trust_proxy_headers = true;
        let (app, _) = test_app_with(config).await;

        for i in 0..3 {
            let response = app
                .clone()
                .oneshot(login_attempt(&format!("10.0.0.{}", i)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_dotless_admin_email_can_log_in() {
        let (app, state) = test_app().await;
        crate::auth::ensure_admin_user(&state.db, "admin@localhost", "letmein")
            .await
            .unwrap();

        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "admin@localhost", "password": "letmein"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_non_numeric_room_id_is_json_400() {
        let (app, _) = test_app().await;
        let token = login(&app).await;

        for method in ["GET", "DELETE"] {
            let (status, body) = send(&app, method, "/api/rooms/abc", Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["message"].is_string());
            assert_eq!(body["status"], 400);
        }

        let (status, body) = send(
            &app,
            "PUT",
            "/api/rooms/abc",
            Some(&token),
            Some(json!({"room_number": "101"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_read_only_token_cannot_modify_rooms() {
        let (app, state) = test_app().await;
        let user = crate::db::find_user_by_email(&state.db, "admin@hotel.test")
            .await
            .unwrap()
            .unwrap();
        let issued = crate::auth::issue_token(&state.db, &user, &[ROOMS_READ], None)
            .await
            .unwrap();
        let token = issued.plain_text;

        let (status, _) = send(&app, "GET", "/api/rooms", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "POST",
            "/api/rooms",
            Some(&token),
            Some(json!({"room_number": "101", "type": "single", "price_per_night": 80})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "This action is unauthorized.");
        assert_eq!(body["status"], 403);

        let (status, _) = send(&app, "DELETE", "/api/rooms/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "GET", "/api/user", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
