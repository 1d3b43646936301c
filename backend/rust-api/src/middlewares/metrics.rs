use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Collections whose next path segment is a row id
const ID_COLLECTIONS: &[&str] = &["papers", "mock-tests"];

/// Named sub-resources that are not ids
const STATIC_SEGMENTS: &[&str] = &["featured"];

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Replaces row ids with `{id}` to keep label cardinality bounded
fn normalize_path(path: &str) -> String {
    let mut normalized = Vec::new();
    let mut previous = "";

    for segment in path.split('/') {
        let is_row_id = !segment.is_empty()
            && ID_COLLECTIONS.contains(&previous)
            && !STATIC_SEGMENTS.contains(&segment);

        if is_row_id || is_uuid_like(segment) || is_numeric_id(segment) {
            normalized.push("{id}");
        } else {
            normalized.push(segment);
        }
        previous = segment;
    }

    normalized.join("/")
}

fn is_uuid_like(s: &str) -> bool {
    // 8-4-4-4-12 hex characters
    if s.len() != 36 {
        return false;
    }
    s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
