#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use papers_portal_api::{
    config::Config,
    create_router,
    services::{
        blob_store::MemoryBlobStore, memory_store::MemoryRecordStore, record_store::Table,
        AppState,
    },
};

pub const ADMIN_ID: &str = "admin_mu_eng_2024";
pub const ADMIN_SECRET: &str = "MU_Papers_Secure@2024";

pub const BOUNDARY: &str = "papers-portal-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub state_path: PathBuf,
    /// Cookie jar of the default client, as `name=value`
    pub cookie: Mutex<Option<String>>,
}

impl TestApp {
    /// Sends the request as-is. Returns the `name=value` pair of any cookie
    /// the response sets; an empty value means the cookie was cleared.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|pair| pair.trim().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        (status, set_cookie, json)
    }

    /// Sends the request as the default client, carrying and updating its
    /// cookie jar.
    pub async fn request(&self, mut request: Request<Body>) -> (StatusCode, Value) {
        if let Some(cookie) = self.cookie() {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let (status, set_cookie, json) = self.send(request).await;
        if let Some(pair) = set_cookie {
            let cleared = pair
                .split_once('=')
                .map_or(true, |(_, value)| value.is_empty());
            *self.cookie.lock().unwrap() = if cleared { None } else { Some(pair) };
        }
        (status, json)
    }

    pub fn cookie(&self) -> Option<String> {
        self.cookie.lock().unwrap().clone()
    }

    pub fn set_cookie(&self, cookie: Option<String>) {
        *self.cookie.lock().unwrap() = cookie;
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn login(&self) -> (StatusCode, Value) {
        self.post_json(
            "/api/v1/admission/login",
            json!({ "identifier": ADMIN_ID, "secret": ADMIN_SECRET }),
        )
        .await
    }

    pub async fn upload(&self, body: Vec<u8>) -> (StatusCode, Value) {
        self.request(upload_request(body)).await
    }
}

pub fn remove_state_dir(path: &std::path::Path) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

pub fn temp_state_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("papers-portal-test-{}", uuid::Uuid::new_v4()))
        .join("admission.json")
}

pub async fn create_test_app() -> TestApp {
    create_test_app_at(temp_state_path()).await
}

/// Builds the full router over in-memory stores, with the admission state
/// file at `state_path`.
pub async fn create_test_app_at(state_path: PathBuf) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let records = Arc::new(MemoryRecordStore::new());
    let blobs = Arc::new(MemoryBlobStore::new("https://cdn.test/storage"));

    let config = Config::in_memory(&state_path);
    let state = Arc::new(
        AppState::new(config, records.clone(), blobs.clone())
            .await
            .expect("Failed to initialize test app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        records,
        blobs,
        state_path,
        cookie: Mutex::new(None),
    }
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/papers")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn paper_row(id: &str, subject: &str, branch: &str, downloads: u64) -> Value {
    json!({
        "id": id,
        "title": format!("{} paper {}", subject, id),
        "subject": subject,
        "branch": branch,
        "semester": 3,
        "year": 2023,
        "exam_type": "External",
        "question_paper_url": format!("https://cdn.test/storage/papers/papers/{}.pdf", id),
        "solution_url": null,
        "upload_date": "2024-01-10T08:00:00Z",
        "download_count": downloads,
        "tags": [],
        "chapters": [],
        "verified": true,
        "difficulty": "Medium",
        "rating": 4.5
    })
}

pub fn mock_test_row(id: &str, subject: &str, attempts: u64) -> Value {
    json!({
        "id": id,
        "title": format!("{} mock test", subject),
        "subject": subject,
        "branch": "Computer Engineering",
        "semester": 3,
        "questions": [
            {
                "id": format!("{}-q1", id),
                "question": "What is the time complexity of binary search?",
                "type": "MCQ",
                "options": ["O(n)", "O(log n)", "O(n log n)", "O(1)"],
                "correct_answer": "O(log n)",
                "marks": 1,
                "chapter": "Searching"
            }
        ],
        "duration": 60,
        "total_marks": 50,
        "created_date": "2024-01-12T00:00:00Z",
        "attempt_count": attempts,
        "difficulty": "Medium"
    })
}

pub async fn seed_papers(app: &TestApp, rows: Vec<Value>) {
    app.records.seed(Table::Papers, rows).await;
}

pub async fn seed_mock_tests(app: &TestApp, rows: Vec<Value>) {
    app.records.seed(Table::MockTests, rows).await;
}

/// A complete multipart upload body. `solution` adds a second file.
pub fn upload_body(fields: &[(&str, &str)], with_question_paper: bool, solution: bool) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }

    let mut add_file = |name: &str, file_name: &str| {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"%PDF-1.4 test document");
        body.extend_from_slice(b"\r\n");
    };

    if with_question_paper {
        add_file("question_paper", "DSA External 2024.pdf");
    }
    if solution {
        add_file("solution", "DSA solutions.pdf");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn valid_form_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("title", "Data Structures External 2024"),
        ("subject", "DSA"),
        ("branch", "Computer Engineering"),
        ("semester", "3"),
        ("year", "2024"),
        ("exam_type", "External"),
        ("difficulty", "Hard"),
        ("tags", "trees, graphs"),
        ("chapters", "Trees"),
    ]
}
