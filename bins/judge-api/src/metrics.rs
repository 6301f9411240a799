// Prometheus metrics for the execution service

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref EXECUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "judge_executions_total",
        "Execution requests by language and outcome",
        &["language", "outcome"]
    )
    .expect("metric names are unique");
    pub static ref TEST_CASES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "judge_test_cases_total",
        "Graded test cases by language and status",
        &["language", "status"]
    )
    .expect("metric names are unique");
    pub static ref RUN_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "judge_run_duration_seconds",
        "Wall-clock time to execute a request's test cases",
        &["language"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("metric names are unique");
}

/// Render every registered metric in the text exposition format.
pub fn gather() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
