//! HTTP integration tests for the workspace API.
//!
//! The router runs against the in-memory adapters, so no database or analysis
//! backend is needed. Requests are dispatched with `tower::ServiceExt::oneshot`.

use api_lib::web::{router, state::AppState};
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use muneccim_core::context::{AnalysisPayload, ServiceContext, WorkflowSettings};
use muneccim_core::domain::AnalysisReport;
use muneccim_core::i18n::{translations, Language};
use muneccim_core::memory::{InMemoryDatabase, InMemoryStorage, ScriptedAnalysis};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "Str0ng!pass";
const SALES_CSV: &str = "region,amount\nnorth,10\nsouth,20\neast,30\n";
const BOUNDARY: &str = "muneccim-test-boundary";

struct TestApp {
    app: Router,
    state: Arc<AppState>,
}

fn test_app() -> TestApp {
    let ctx = ServiceContext {
        db: Arc::new(InMemoryDatabase::new()),
        storage: Arc::new(InMemoryStorage::new("http://localhost:3000/files")),
        analysis: Arc::new(ScriptedAnalysis::succeeding(AnalysisReport {
            narrative: "Three regional clusters.".to_string(),
            image_urls: vec!["visualizations/clusters.png".to_string()],
        })),
        settings: WorkflowSettings {
            assets_base_url: "http://localhost:8000/static".to_string(),
            payload: AnalysisPayload::FileUrl,
        },
    };
    let state = Arc::new(AppState::new(ctx));
    TestApp {
        app: router(state.clone()),
        state,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    async fn json(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(req).await;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }

    async fn text(&self, req: Request<Body>) -> (StatusCode, String) {
        let (status, _, body) = self.send(req).await;
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    /// Signs up and returns the `session=...` cookie pair.
    async fn sign_up(&self, email: &str) -> String {
        let req = json_request(
            "POST",
            "/auth/signup",
            None,
            json!({ "email": email, "password": PASSWORD, "confirm_password": PASSWORD }),
        );
        let (status, headers, _) = self.send(req).await;
        assert_eq!(status, StatusCode::CREATED);
        session_from(&headers)
    }

    async fn complete_assessment(&self, cookie: &str) {
        for _ in 0..5 {
            let req = json_request("POST", "/assessment/answer", Some(cookie), json!({ "option": 3 }));
            let (status, _) = self.json(req).await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    async fn upload(&self, cookie: &str, file_name: &str, data: &str) -> (StatusCode, Bytes) {
        let (status, _, body) = self.send(upload_request(cookie, file_name, data)).await;
        (status, body)
    }
}

fn session_from(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string()
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_empty(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn upload_request(cookie: &str, file_name: &str, data: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n--{b}--\r\n",
        b = BOUNDARY,
        name = file_name,
        data = data,
    );
    Request::builder()
        .method("POST")
        .uri("/uploads")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

// ===========================================================================
// Route guard and authentication
// ===========================================================================

#[tokio::test]
async fn guarded_routes_require_a_session() {
    let t = test_app();
    for uri in ["/workspace", "/auth/me", "/uploads", "/workspace/table"] {
        let (status, _, _) = t.send(get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} should be guarded", uri);
    }
    let (status, _, _) = t.send(get("/workspace", Some("session=not-a-session"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t.text(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn signup_reports_every_problem_in_the_requested_language() {
    let t = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_LANGUAGE, "tr-TR,tr;q=0.9")
        .body(Body::from(
            json!({ "email": "not-an-email", "password": "short", "confirm_password": "other" }).to_string(),
        ))
        .unwrap();

    let (status, body) = t.json(req).await;
    let tr = translations(Language::Tr);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["email"], tr.email_invalid);
    assert_eq!(body["confirm_password"], tr.passwords_mismatch);
    let password = body["password"].as_array().unwrap();
    assert!(password.contains(&json!(tr.password_too_short)));
    assert!(password.contains(&json!(tr.password_needs_digit)));
}

#[tokio::test]
async fn duplicate_signup_and_bad_logins_get_generic_messages() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;

    let (status, me) = t.json(get("/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@example.com");

    let again = json_request(
        "POST",
        "/auth/signup",
        None,
        json!({ "email": "ada@example.com", "password": PASSWORD, "confirm_password": PASSWORD }),
    );
    let (status, body) = t.text(again).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Registration failed");

    let wrong_password = json_request(
        "POST",
        "/auth/login",
        None,
        json!({ "email": "ada@example.com", "password": "Wr0ng!pass" }),
    );
    let unknown_user = json_request(
        "POST",
        "/auth/login",
        None,
        json!({ "email": "nobody@example.com", "password": PASSWORD }),
    );
    let (status_a, body_a) = t.text(wrong_password).await;
    let (status_b, body_b) = t.text(unknown_user).await;
    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!((status_a, body_a), (status_b, body_b));

    let login = json_request(
        "POST",
        "/auth/login",
        None,
        json!({ "email": "ada@example.com", "password": PASSWORD }),
    );
    let (status, headers, _) = t.send(login).await;
    assert_eq!(status, StatusCode::OK);
    assert!(session_from(&headers).starts_with("session="));
}

#[tokio::test]
async fn logout_invalidates_the_session_and_drops_the_workspace() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;
    let (status, _) = t.json(get("/workspace", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.state.registry.len().await, 1);

    let (status, headers, _) = t.send(post_empty("/auth/logout", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let cleared = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    for _ in 0..50 {
        if t.state.registry.is_empty().await {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(t.state.registry.is_empty().await);

    let (status, _, _) = t.send(get("/workspace", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Assessment and ingestion
// ===========================================================================

#[tokio::test]
async fn first_visit_starts_with_the_assessment() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;

    let (status, body) = t.json(get("/assessment", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "assessment");
    assert_eq!(body["assessment"]["question_number"], 1);
    assert_eq!(body["assessment"]["question_count"], 5);

    let out_of_range = json_request("POST", "/assessment/answer", Some(&cookie), json!({ "option": 5 }));
    let (status, _) = t.json(out_of_range).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t.text(upload_request(&cookie, "sales.csv", SALES_CSV)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, translations(Language::En).assessment_pending);

    t.complete_assessment(&cookie).await;
    let (_, body) = t.json(get("/assessment", Some(&cookie))).await;
    assert_eq!(body["stage"], "ingestion");
    assert_eq!(body["skill_level"], "advanced");
    assert_eq!(body["guidance"]["tips"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn rejected_upload_shows_the_localized_message_only() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;
    t.complete_assessment(&cookie).await;
    let set_tr = json_request("PUT", "/workspace/language", Some(&cookie), json!({ "language": "tr" }));
    let (status, _) = t.json(set_tr).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t.upload(&cookie, "notes.txt", "hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8_lossy(&body),
        translations(Language::Tr).invalid_format
    );

    let (_, snapshot) = t.json(get("/workspace", Some(&cookie))).await;
    assert_eq!(snapshot["error_message"], translations(Language::Tr).invalid_format);
    assert_eq!(snapshot["dataset"], Value::Null);
    assert!(snapshot["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn upload_table_and_training_end_to_end() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;
    t.complete_assessment(&cookie).await;

    let (status, body) = t.upload(&cookie, "sales.csv", SALES_CSV).await;
    assert_eq!(status, StatusCode::CREATED);
    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["selected_file"], "sales.csv");
    assert_eq!(snapshot["dataset"]["columns"], json!(["region", "amount"]));
    assert_eq!(snapshot["dataset"]["row_count"], 3);
    let key = snapshot["history"][0]["storage_key"].as_str().unwrap().to_string();

    // The stored object is served back for the analysis backend.
    let (status, _, stored) = t.send(get(&format!("/files/{}", key), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&stored[..], SALES_CSV.as_bytes());

    let sort = json_request(
        "POST",
        "/workspace/table",
        Some(&cookie),
        json!({ "action": "toggle_sort", "column": "region" }),
    );
    let (status, page) = t.json(sort).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["rows"][0]["region"], "east");
    assert_eq!(page["page_count"], 1);

    let bad_size = json_request(
        "POST",
        "/workspace/table",
        Some(&cookie),
        json!({ "action": "set_page_size", "page_size": 15 }),
    );
    let (status, _) = t.json(bad_size).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, started) = t.json(post_empty("/train", &cookie)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started["training"]["phase"], "analyzing");
    assert_eq!(started["training"]["progress"], 10);

    let mut finished = Value::Null;
    for _ in 0..50 {
        let (_, snapshot) = t.json(get("/workspace", Some(&cookie))).await;
        if snapshot["training"]["completed"] == true {
            finished = snapshot;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(finished["training"]["progress"], 100);
    assert_eq!(finished["training"]["result"]["narrative"], "Three regional clusters.");
    assert_eq!(
        finished["training"]["result"]["image_urls"],
        json!(["http://localhost:8000/static/clusters.png"])
    );

    let (status, reset) = t.json(post_empty("/workspace/new-chat", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["training"]["phase"], "idle");
    assert_eq!(reset["dataset"], Value::Null);
    assert_eq!(reset["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn training_without_a_dataset_is_refused() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;
    t.complete_assessment(&cookie).await;

    let (status, body) = t.text(post_empty("/train", &cookie)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, translations(Language::En).no_dataset);
}

// ===========================================================================
// History
// ===========================================================================

#[tokio::test]
async fn history_belongs_to_its_owner() {
    let t = test_app();
    let owner = t.sign_up("u1@example.com").await;
    let other = t.sign_up("u2@example.com").await;
    t.complete_assessment(&owner).await;
    t.complete_assessment(&other).await;

    let (status, body) = t.upload(&owner, "sales.csv", SALES_CSV).await;
    assert_eq!(status, StatusCode::CREATED);
    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    let upload_id = snapshot["history"][0]["id"].as_str().unwrap().to_string();

    let (status, history) = t.json(get("/uploads", Some(&other))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history.as_array().unwrap().is_empty());

    let (status, _, _) = t
        .send(post_empty(&format!("/uploads/{}/select", upload_id), &other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, selected) = t
        .json(post_empty(&format!("/uploads/{}/select", upload_id), &owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected["dataset"]["row_count"], 3);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/uploads/{}", upload_id))
        .header(header::COOKIE, &owner)
        .body(Body::empty())
        .unwrap();
    let (status, after) = t.json(delete).await;
    assert_eq!(status, StatusCode::OK);
    assert!(after["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stored_files_need_their_exact_key() {
    let t = test_app();
    let cookie = t.sign_up("ada@example.com").await;
    t.complete_assessment(&cookie).await;
    let (_, me) = t.json(get("/auth/me", Some(&cookie))).await;
    let user_id = me["user_id"].as_str().unwrap().to_string();

    let (status, body) = t.upload(&cookie, "sales.csv", SALES_CSV).await;
    assert_eq!(status, StatusCode::CREATED);
    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    let upload_id = snapshot["history"][0]["id"].as_str().unwrap().to_string();
    let key = snapshot["history"][0]["storage_key"].as_str().unwrap().to_string();

    // Knowing the owner and the file name is not enough.
    let guessed = format!("/files/uploads/{}/sales.csv", user_id);
    let (status, _, _) = t.send(get(&guessed, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = t.send(get(&format!("/files/{}", key), None)).await;
    assert_eq!(status, StatusCode::OK);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/uploads/{}", upload_id))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = t.send(delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = t.send(get(&format!("/files/{}", key), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Public resources
// ===========================================================================

#[tokio::test]
async fn translation_tables_are_served_by_language_code() {
    let t = test_app();
    let (status, body) = t.json(get("/i18n/tr", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invalid_format"], translations(Language::Tr).invalid_format);
    assert_eq!(body["questions"].as_array().unwrap().len(), 5);

    let (status, _, _) = t.send(get("/i18n/de", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = t.send(get("/files/uploads/nobody/missing.csv", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
