use super::models::{HealthCheck, UIConfiguration};
use crate::config::test_helpers::setup_test_app;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

#[test]
fn ui_configuration_default_is_empty() {
    let config = UIConfiguration::default();
    assert_eq!(config.client_id, "");
    assert_eq!(config.realm, "");
    assert_eq!(config.url, "");
    assert_eq!(config.deployment, "");
}

#[test]
fn ui_configuration_serializes_client_id_in_camel_case() {
    let config = UIConfiguration {
        client_id: "pcrd-ui".to_string(),
        realm: "pcrd".to_string(),
        url: "http://localhost:8080".to_string(),
        deployment: "local".to_string(),
    };

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["clientId"], "pcrd-ui");
    assert_eq!(json["realm"], "pcrd");
}

#[test]
fn health_check_round_trips() {
    let health = HealthCheck {
        status: "ok".to_string(),
    };
    let json = serde_json::to_string(&health).unwrap();
    let back: HealthCheck = serde_json::from_str(&json).unwrap();
    assert_eq!(back.status, "ok");
}

#[tokio::test]
async fn healthz_returns_ok_with_live_database() {
    let app = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
