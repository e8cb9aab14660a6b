use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use campus_api::router;
use campus_db::{Database, SqliteStore};
use campus_digest::{Generator, Summarizer, SummaryError};
use campus_gateway::{GatewayServices, Registry};

/// Answers every prompt with a fixed outcome.
#[derive(Clone)]
struct Canned(Result<String, SummaryError>);

impl Generator for Canned {
    async fn generate(&self, _prompt: &str) -> Result<String, SummaryError> {
        self.0.clone()
    }
}

fn app(generator: Canned) -> axum::Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let registry = Registry::new();
    registry.attach(&db).unwrap();
    let store = SqliteStore::new(db);
    let summarizer = Arc::new(Summarizer::new(store.clone(), generator));
    router(GatewayServices {
        store,
        registry,
        summarizer,
    })
}

fn working() -> axum::Router {
    app(Canned(Ok("the class compared sorting algorithms".into())))
}

async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_group(app: &axum::Router, subject: &str) -> String {
    let (status, group) = call(
        app,
        "POST",
        "/groups",
        Some(json!({
            "subject_name": subject,
            "building": "Engineering",
            "floor_number": 2,
            "classroom_number": "E-204",
            "time_slot": "Mon 10:00"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    group["id"].as_str().unwrap().to_string()
}

async fn post_message(app: &axum::Router, group_id: &str, author: &str, body: &str) -> StatusCode {
    let uri = format!("/groups/{group_id}/messages");
    let (status, _) = call(app, "POST", &uri, Some(json!({ "author": author, "body": body }))).await;
    status
}

#[tokio::test]
async fn health_is_ok() {
    let app = working();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn groups_are_created_listed_and_fetched() {
    let app = working();
    let first = create_group(&app, "Databases").await;
    let second = create_group(&app, "Networks").await;

    let (status, groups) = call(&app, "GET", "/groups", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = groups
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.as_str()) && ids.contains(&second.as_str()));

    let (status, group) = call(&app, "GET", &format!("/groups/{first}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["subject_name"], "Databases");
    assert_eq!(group["time_slot"], "Mon 10:00");
}

#[tokio::test]
async fn blank_group_fields_are_rejected() {
    let app = working();
    let (status, error) = call(
        &app,
        "POST",
        "/groups",
        Some(json!({
            "subject_name": "   ",
            "building": "Engineering",
            "floor_number": 2,
            "classroom_number": "E-204"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "invalid_input");
}

#[tokio::test]
async fn unknown_group_is_404_everywhere() {
    let app = working();
    let missing = uuid::Uuid::new_v4();

    for (method, uri) in [
        ("GET", format!("/groups/{missing}")),
        ("GET", format!("/groups/{missing}/messages")),
        ("GET", format!("/groups/{missing}/summary")),
    ] {
        let (status, error) = call(&app, method, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert_eq!(error["kind"], "not_found");
    }

    assert_eq!(
        post_message(&app, &missing.to_string(), "ada", "hello?").await,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn messages_come_back_oldest_first() {
    let app = working();
    let group = create_group(&app, "Statistics").await;

    for i in 0..4 {
        assert_eq!(post_message(&app, &group, "ada", &format!("sample {i}")).await, StatusCode::CREATED);
    }

    let (status, all) = call(&app, "GET", &format!("/groups/{group}/messages"), None).await;
    assert_eq!(status, StatusCode::OK);
    let bodies: Vec<&str> = all.as_array().unwrap().iter().map(|m| m["body"].as_str().unwrap()).collect();
    assert_eq!(bodies, vec!["sample 0", "sample 1", "sample 2", "sample 3"]);

    let (_, recent) = call(&app, "GET", &format!("/groups/{group}/messages?limit=2"), None).await;
    let bodies: Vec<&str> = recent.as_array().unwrap().iter().map(|m| m["body"].as_str().unwrap()).collect();
    assert_eq!(bodies, vec!["sample 2", "sample 3"]);
}

#[tokio::test]
async fn blank_message_is_rejected_and_not_stored() {
    let app = working();
    let group = create_group(&app, "Chemistry").await;

    assert_eq!(post_message(&app, &group, "ada", "  \n ").await, StatusCode::BAD_REQUEST);
    assert_eq!(post_message(&app, &group, "", "hello").await, StatusCode::BAD_REQUEST);

    let (_, messages) = call(&app, "GET", &format!("/groups/{group}/messages"), None).await;
    assert!(messages.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn summary_of_recent_window() {
    let app = working();
    let group = create_group(&app, "Algorithms").await;

    let (status, digest) = call(&app, "GET", &format!("/groups/{group}/summary"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(digest["window"].as_array().unwrap().is_empty());
    assert!(digest["summary"].as_str().unwrap().starts_with("No messages found"));

    for i in 0..7 {
        post_message(&app, &group, "grace", &format!("step {i}")).await;
    }
    let (status, digest) = call(&app, "GET", &format!("/groups/{group}/summary?window=3"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(digest["summary"], "the class compared sorting algorithms");
    let bodies: Vec<&str> = digest["window"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["body"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["step 4", "step 5", "step 6"]);

    let (status, _) = call(&app, "GET", &format!("/groups/{group}/summary?window=0"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generation_failures_have_their_own_statuses() {
    for (failure, expected, kind) in [
        (
            SummaryError::Generation("empty summary".into()),
            StatusCode::BAD_GATEWAY,
            "generation_failure",
        ),
        (
            SummaryError::Unavailable("connection refused".into()),
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable_failure",
        ),
    ] {
        let server = app(Canned(Err(failure)));
        let group = create_group(&server, "Optics").await;
        post_message(&server, &group, "ada", "light bends").await;

        let (status, error) = call(&server, "GET", &format!("/groups/{group}/summary"), None).await;
        assert_eq!(status, expected);
        assert_eq!(error["kind"], kind);

        // Chat keeps working while generation is down.
        assert_eq!(post_message(&server, &group, "grace", "so does sound").await, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn malformed_query_strings_get_json_errors() {
    let app = working();
    let group = create_group(&app, "Acoustics").await;

    for uri in [
        format!("/groups/{group}/summary?window=abc"),
        format!("/groups/{group}/messages?limit=-1"),
    ] {
        let (status, error) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error["kind"], "invalid_input", "{uri}");
        assert!(error["error"].as_str().is_some_and(|e| !e.is_empty()));
    }
}

#[tokio::test]
async fn malformed_body_gets_json_error() {
    let app = working();
    let group = create_group(&app, "Mechanics").await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/groups/{group}/messages"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"author": "ada", "body": "#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let error: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(error["kind"], "invalid_input");
}
