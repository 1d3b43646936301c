use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Record store metrics
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "record_store_operations_total",
        "Total number of record store operations",
        &["operation", "table", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "record_store_operation_duration_seconds",
        "Record store operation duration in seconds",
        &["operation", "table"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // Blob store metrics
    pub static ref BLOB_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blob_uploads_total",
        "Total number of blob store uploads",
        &["kind", "status"]
    )
    .unwrap();

    // Business Metrics
    pub static ref PAPER_DOWNLOADS_TOTAL: IntCounter = register_int_counter!(
        "paper_downloads_total",
        "Paper downloads recorded by this instance"
    )
    .unwrap();

    pub static ref TEST_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        "mock_test_attempts_total",
        "Mock test attempts recorded by this instance"
    )
    .unwrap();

    pub static ref PAPERS_UPLOADED_TOTAL: IntCounter = register_int_counter!(
        "papers_uploaded_total",
        "Papers created through the upload endpoint"
    )
    .unwrap();

    pub static ref ADMISSION_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "admission_attempts_total",
        "Admission gate attempts by outcome",
        &["outcome"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track record store operation with metrics
pub async fn track_store_operation<F, T, E>(
    operation: &str,
    table: &str,
    future: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, table, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(duration);

    result
}
