#[cfg(test)]
mod tests {
    use crate::app::build_router;
    use crate::clock::MockClock;
    use crate::middleware::rate_limit::{AdmissionGate, RateLimiterConfig};
    use crate::state::AppState;
    use crate::tests::test_config;
    use axum::{
        body::Body,
        extract::connect_info::ConnectInfo,
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tower::ServiceExt;

    fn setup_test_app(extra: &str) -> (Router, AppState, MockClock) {
        let config = test_config(extra);
        let clock = MockClock::default();
        let gate = AdmissionGate::with_clock(RateLimiterConfig::from(&config.rate_limit), clock.clone());
        let state = AppState::with_gate(config, gate);
        (build_router(state.clone()), state, clock)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn from_addr(mut req: Request<Body>, addr: &str) -> Request<Body> {
        let addr: SocketAddr = addr.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (app, _, _) = setup_test_app("");

        let response = app.oneshot(get("/healthz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let (app, _, _) = setup_test_app("");

        let response = app.oneshot(get("/version")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["name"], "gatehouse");
        assert!(json["build"]["profile"].is_string());
    }

    #[tokio::test]
    async fn test_health_routes_are_not_rate_limited() {
        let (app, state, _) = setup_test_app("[rate_limit]\nlimit = 1\n");

        for _ in 0..5 {
            let response = app.clone().oneshot(get("/healthz")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(state.gate.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _, _) = setup_test_app("");

        let response = app.oneshot(get("/api/v1/me")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "MALFORMED_CREDENTIAL");
        assert_eq!(json["status"], 401);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let (app, state, _) = setup_test_app("");
        let token = state.tokens.issue("user-7", "user").unwrap();

        let response = app.oneshot(get_with_token("/api/v1/me", &token)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["subject_id"], "user-7");
        assert_eq!(json["role"], "user");
        assert_eq!(state.metrics.auth_succeeded.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let (app, state, _) = setup_test_app("");
        let issued = chrono::Utc::now() - chrono::Duration::days(2);
        let token = state.tokens.issue_at("user-7", "user", issued).unwrap();

        let response = app.oneshot(get_with_token("/api/v1/me", &token)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "TOKEN_EXPIRED");
        assert_eq!(json["error"]["message"], "Token has expired");
    }

    #[tokio::test]
    async fn test_error_body_does_not_leak_details() {
        let (app, _, _) = setup_test_app("");

        let response = app.oneshot(get_with_token("/api/v1/me", "a.b.c")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["message"], "Invalid or missing credentials");
        assert!(json["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_admin_route_requires_admin_role() {
        let (app, state, _) = setup_test_app("");
        let user = state.tokens.issue("user-1", "user").unwrap();
        let admin = state.tokens.issue("admin-1", "admin").unwrap();

        let response = app.clone().oneshot(get_with_token("/api/v1/admin/ping", &user)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "INSUFFICIENT_ROLE");

        let response = app.oneshot(get_with_token("/api/v1/admin/ping", &admin)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["subject_id"], "admin-1");
    }

    #[tokio::test]
    async fn test_admin_route_without_token_is_unauthorized() {
        let (app, _, _) = setup_test_app("");

        let response = app.oneshot(get("/api/v1/admin/ping")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429_with_retry_after() {
        let (app, state, clock) = setup_test_app("[rate_limit]\nlimit = 3\nwindow_secs = 60\nblock_duration_secs = 300\n");
        let token = state.tokens.issue("user-1", "user").unwrap();

        for _ in 0..3 {
            let req = from_addr(get_with_token("/api/v1/me", &token), "1.2.3.4:5000");
            let response = app.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            clock.advance(Duration::from_millis(100));
        }

        let req = from_addr(get_with_token("/api/v1/me", &token), "1.2.3.4:5000");
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "300");
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(json["error"]["details"]["retry_after_seconds"], 300);

        // Another client is unaffected
        let req = from_addr(get_with_token("/api/v1/me", &token), "5.6.7.8:5000");
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        clock.advance(Duration::from_secs(301));
        let req = from_addr(get_with_token("/api/v1/me", &token), "1.2.3.4:5000");
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_runs_before_authentication() {
        let (app, state, _) = setup_test_app("[rate_limit]\nlimit = 1\n");

        let response = app.clone().oneshot(get("/api/v1/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(get("/api/v1/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        // The rejected request never reached the authenticator
        assert_eq!(state.metrics.auth_failed.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_unless_trusted() {
        let (app, state, _) = setup_test_app("[rate_limit]\nlimit = 1\n");

        for ip in ["10.0.0.1", "10.0.0.2"] {
            let req = Request::builder().uri("/api/v1/me").header("x-forwarded-for", ip).body(Body::empty()).unwrap();
            app.clone().oneshot(from_addr(req, "192.168.1.1:4000")).await.unwrap();
        }
        assert_eq!(state.gate.tracked_clients(), 1);
        assert!(state.gate.usage("192.168.1.1").is_some());
    }

    #[tokio::test]
    async fn test_forwarded_for_used_when_trusted() {
        let (app, state, _) = setup_test_app("[rate_limit]\nlimit = 1\ntrust_proxy_headers = true\n");

        for ip in ["10.0.0.1", "10.0.0.2"] {
            let req = Request::builder()
                .uri("/api/v1/me")
                .header("x-forwarded-for", format!("{}, 172.16.0.1", ip))
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(from_addr(req, "192.168.1.1:4000")).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(state.gate.tracked_clients(), 2);
        assert!(state.gate.usage("10.0.0.2").is_some());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (app, _, _) = setup_test_app("");

        let response = app.oneshot(get("/nope")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_metrics_reflect_gating() {
        let (app, state, _) = setup_test_app("[rate_limit]\nlimit = 1\n");
        let token = state.tokens.issue("user-1", "user").unwrap();

        app.clone().oneshot(get_with_token("/api/v1/me", &token)).await.unwrap();
        app.clone().oneshot(get_with_token("/api/v1/me", &token)).await.unwrap();

        let response = app.clone().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["requests_admitted"], 1);
        assert_eq!(json["requests_rate_limited"], 1);
        assert_eq!(json["auth_succeeded"], 1);
        assert_eq!(json["tracked_clients"], 1);

        let response = app.oneshot(get("/metrics/prometheus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("gatehouse_requests_rate_limited 1"));
    }
}
