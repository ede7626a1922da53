use crate::config::test_helpers::{cleanup_test_data, setup_test_app, setup_test_db};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn extract_response_body(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    let body: Value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| json!({"error": "Invalid JSON response"}));
    (status, body)
}

async fn post_json(app: &axum::Router, uri: &str, payload: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    extract_response_body(response).await
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    extract_response_body(response).await
}

/// Create a request with one sample seed expanding into `methods x repeats`
/// testing samples and return the full response body.
async fn create_test_request(app: &axum::Router, methods: &[&str], repeats: i32) -> Value {
    let payload = json!({
        "request_type": "ntr",
        "title": format!("Polymer batch {}", uuid::Uuid::new_v4()),
        "requested_by": "j.doe",
        "sample_seeds": [
            {
                "name": "Resin A",
                "test_methods": methods,
                "repeats": repeats
            }
        ]
    });
    let (status, body) = post_json(app, "/api/requests", &payload).await;
    assert_eq!(status, StatusCode::CREATED, "Failed to create request: {body:?}");
    body
}

#[tokio::test]
async fn test_create_request_expands_sample_seeds() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile", "hardness"], 2).await;

    assert!(body["request_number"].as_str().unwrap().starts_with("PCRD-"));
    assert_eq!(body["status"], "Pending Receive Sample");
    // 1 seed x 2 methods x 2 repeats
    assert_eq!(body["samples"].as_array().unwrap().len(), 4);
    assert_eq!(body["total_samples_count"], 4);
    assert_eq!(body["received_samples_count"], 0);
    assert_eq!(body["all_samples_received"], false);
    for sample in body["samples"].as_array().unwrap() {
        assert_eq!(sample["status"], "Pending Receive");
        assert!(sample["receive_date"].is_null());
    }

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_create_request_requires_sample_seeds() {
    let app = setup_test_app().await;

    let payload = json!({
        "request_type": "ntr",
        "title": "No samples",
        "sample_seeds": []
    });
    let (status, _body) = post_json(&app, "/api/requests", &payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_create_leaves_no_partial_request() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    // Postgres rejects the NUL byte when the second method's samples are
    // inserted, after the request row and the first method's samples.
    let title = format!("Atomic create {}", uuid::Uuid::new_v4());
    let name = format!("Atomic resin {}", uuid::Uuid::new_v4());
    let payload = json!({
        "request_type": "ntr",
        "title": title,
        "sample_seeds": [
            {"name": name, "test_methods": ["tensile", "bad\u{0}method"]}
        ]
    });
    let (status, _body) = post_json(&app, "/api/requests", &payload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The transaction rolls the whole creation back.
    let (_, requests) = get_json(&app, "/api/requests").await;
    assert!(
        !requests
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["title"] == title.as_str()),
        "request must not survive a failed sample insert"
    );
    let (_, samples) = get_json(&app, "/api/samples").await;
    assert!(
        !samples
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["name"] == name.as_str()),
        "no orphaned samples may survive the rollback"
    );

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_receive_all_samples() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 3).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    let (status, outcome) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({"receive_all": true, "changed_by": "lab.tech"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{outcome:?}");
    assert_eq!(outcome["updated_count"], 3);
    assert_eq!(outcome["total_samples_count"], 3);
    assert_eq!(outcome["received_samples_count"], 3);
    assert_eq!(outcome["all_samples_received"], true);

    // The request status is re-derived after the receive settles.
    let (status, request) = get_json(&app, &format!("/api/requests/{request_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "In Progress");

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_receive_all_skips_already_received_samples() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 3).await;
    let request_id = body["id"].as_str().unwrap().to_string();
    let first_sample = body["samples"][0]["id"].as_str().unwrap().to_string();

    // One sample is already past the receive boundary.
    let (_, _) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({"testing_sample_ids": [first_sample]}),
    )
    .await;

    // [In Progress, Pending Receive, Pending Receive] + receive_all.
    let (status, outcome) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({"receive_all": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["updated_count"], 2);
    assert_eq!(outcome["total_samples_count"], 3);
    assert_eq!(outcome["received_samples_count"], 3);
    assert_eq!(outcome["all_samples_received"], true);

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_receive_is_idempotent() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 2).await;
    let request_id = body["id"].as_str().unwrap().to_string();
    let receive_uri = format!("/api/requests/{request_id}/receive");

    let (_, first) = post_json(&app, &receive_uri, &json!({"receive_all": true})).await;
    assert_eq!(first["updated_count"], 2);

    // Re-running the same receive touches nothing but still reports the tally.
    let (status, second) = post_json(&app, &receive_uri, &json!({"receive_all": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["updated_count"], 0);
    assert_eq!(second["received_samples_count"], 2);
    assert_eq!(second["all_samples_received"], true);

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_receive_explicit_subset() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 3).await;
    let request_id = body["id"].as_str().unwrap().to_string();
    let sample_ids: Vec<String> = body["samples"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();

    let (status, outcome) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({"testing_sample_ids": [sample_ids[0], sample_ids[1]]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["updated_count"], 2);
    assert_eq!(outcome["received_samples_count"], 2);
    assert_eq!(outcome["total_samples_count"], 3);
    assert_eq!(outcome["all_samples_received"], false);

    // A partial receive keeps the request pending.
    let (_, request) = get_json(&app, &format!("/api/requests/{request_id}")).await;
    assert_eq!(request["status"], "Pending Receive Sample");

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_receive_requires_ids_or_receive_all() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 1).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_receive_unknown_request_is_404() {
    let app = setup_test_app().await;

    let (status, _) = post_json(
        &app,
        &format!("/api/requests/{}/receive", uuid::Uuid::new_v4()),
        &json!({"receive_all": true}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reject_overrides_request_status() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 2).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    let (status, outcome) = post_json(
        &app,
        &format!("/api/requests/{request_id}/reject"),
        &json!({"changed_by": "qa.lead"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["updated"], true);
    assert_eq!(outcome["status"], "Rejected");

    // Sample mutations never displace the override.
    let (_, receive) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({"receive_all": true}),
    )
    .await;
    assert_eq!(receive["updated_count"], 2);

    let (_, request) = get_json(&app, &format!("/api/requests/{request_id}")).await;
    assert_eq!(request["status"], "Rejected");

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_reject_skips_already_terminal_request() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 1).await;
    let request_id = body["id"].as_str().unwrap().to_string();
    let reject_uri = format!("/api/requests/{request_id}/terminate");

    let (_, first) = post_json(&app, &reject_uri, &json!({})).await;
    assert_eq!(first["updated"], true);

    let (status, second) = post_json(
        &app,
        &format!("/api/requests/{request_id}/reject"),
        &json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["updated"], false);
    assert_eq!(second["status"], "Terminated");

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_delete_request_cascades() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile", "hardness"], 1).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    // Generate some notification history first.
    let (_, _) = post_json(
        &app,
        &format!("/api/requests/{request_id}/receive"),
        &json!({"receive_all": true}),
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/requests/{request_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = get_json(&app, &format!("/api/requests/{request_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No orphaned samples survive the cascade.
    let (status, samples) =
        get_json(&app, &format!("/api/samples?request_id={request_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(samples.as_array().unwrap().len(), 0);

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_delete_unknown_request_is_404() {
    let app = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/requests/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_requests_filters_by_status() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let first = create_test_request(&app, &["tensile"], 1).await;
    let second = create_test_request(&app, &["tensile"], 1).await;
    let second_id = second["id"].as_str().unwrap().to_string();

    let (_, _) = post_json(
        &app,
        &format!("/api/requests/{second_id}/receive"),
        &json!({"receive_all": true}),
    )
    .await;

    let (status, pending) = get_json(&app, "/api/requests?status=pending_receive_sample").await;
    assert_eq!(status, StatusCode::OK);
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], first["id"]);

    let (_, in_progress) = get_json(&app, "/api/requests?status=In%20Progress").await;
    assert_eq!(in_progress.as_array().unwrap().len(), 1);

    let (status, _) = get_json(&app, "/api/requests?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_batch_receive_deduplicates_request_ids() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 2).await;
    let request_id = body["id"].as_str().unwrap().to_string();
    let missing = uuid::Uuid::new_v4().to_string();

    // The same id twice: the second occurrence finds nothing left to do.
    let (status, outcome) = post_json(
        &app,
        "/api/requests/batch",
        &json!({
            "ids": [request_id, request_id, missing],
            "action": "receive",
            "changed_by": "lab.tech"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{outcome:?}");
    assert_eq!(outcome["total_updated"], 2);

    let items = outcome["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["id"], request_id);
    assert_eq!(items[0]["outcome"], "updated");
    assert_eq!(items[1]["outcome"], "skipped");
    assert_eq!(items[2]["outcome"], "not_found");

    let (_, request) = get_json(&app, &format!("/api/requests/{request_id}")).await;
    assert_eq!(request["status"], "In Progress");

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_batch_full_lifecycle_to_completed() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 2).await;
    let request_id = body["id"].as_str().unwrap().to_string();
    let batch = |action: &str| {
        json!({"ids": [request_id], "action": action, "changed_by": "lab.tech"})
    };

    let (_, receive) = post_json(&app, "/api/requests/batch", &batch("receive")).await;
    assert_eq!(receive["total_updated"], 2);

    let (_, complete) = post_json(&app, "/api/requests/batch", &batch("complete")).await;
    assert_eq!(complete["items"][0]["outcome"], "updated");

    let (_, approve) = post_json(&app, "/api/requests/batch", &batch("approve")).await;
    assert_eq!(approve["items"][0]["outcome"], "updated");

    let (_, request) = get_json(&app, &format!("/api/requests/{request_id}")).await;
    assert_eq!(request["status"], "Completed");
    for sample in request["samples"].as_array().unwrap() {
        assert_eq!(sample["status"], "Completed");
    }

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_batch_validation() {
    let app = setup_test_app().await;

    let (status, _) = post_json(
        &app,
        "/api/requests/batch",
        &json!({"ids": [], "action": "receive"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/api/requests/batch",
        &json!({"ids": [uuid::Uuid::new_v4()], "action": "escalate"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_request_metadata_keeps_status() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile"], 1).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/requests/{request_id}"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"title": "Renamed request"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, updated) = extract_response_body(response).await;
    assert_eq!(status, StatusCode::OK, "{updated:?}");
    assert_eq!(updated["title"], "Renamed request");
    assert_eq!(updated["status"], "Pending Receive Sample");
    assert_eq!(updated["request_number"], body["request_number"]);

    cleanup_test_data(&db).await;
}

#[tokio::test]
async fn test_get_request_samples() {
    let app = setup_test_app().await;
    let db = setup_test_db().await;
    cleanup_test_data(&db).await;

    let body = create_test_request(&app, &["tensile", "hardness"], 1).await;
    let request_id = body["id"].as_str().unwrap().to_string();

    let (status, samples) = get_json(&app, &format!("/api/requests/{request_id}/samples")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(samples.as_array().unwrap().len(), 2);

    let (status, _) =
        get_json(&app, &format!("/api/requests/{}/samples", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    cleanup_test_data(&db).await;
}
