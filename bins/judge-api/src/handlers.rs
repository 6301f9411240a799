// HTTP route handlers for the judge API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use judge_common::types::{
    ErrorDetails, ErrorResponse, ExecuteResponse, ExecutionOutcome, ExecutionRequest, LanguageId,
};
use judge_engine::ExecutionError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::metrics;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub languages: Vec<LanguageId>,
}

fn error_response(status: StatusCode, error: impl Into<String>, details: Option<ErrorDetails>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            details,
        }),
    )
        .into_response()
}

/// Label used for metrics; never echoes arbitrary client input.
fn language_label(language: &str) -> &'static str {
    language
        .parse::<LanguageId>()
        .map(|id| id.as_str())
        .unwrap_or("unsupported")
}

fn record_outcomes(language: &'static str, outcomes: &[ExecutionOutcome]) {
    for outcome in outcomes {
        metrics::TEST_CASES_TOTAL
            .with_label_values(&[language, outcome.status.as_str()])
            .inc();
    }
}

/// POST /api/execute - Run code against every test case and return the graded results
pub async fn execute(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            info!(error = %rejection.body_text(), "Malformed execution request");
            metrics::EXECUTIONS_TOTAL.with_label_values(&["unsupported", "rejected"]).inc();
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text(), None);
        }
    };

    let language = language_label(&request.language);
    let start = Instant::now();

    // Runs on its own task so a client disconnect does not cancel a run mid-flight
    let executor = state.executor.clone();
    let limiter = state.limiter.clone();
    let task = tokio::spawn(async move {
        let _permit = limiter.acquire_owned().await.ok();
        executor.execute(&request).await
    });

    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Execution task failed");
            metrics::EXECUTIONS_TOTAL.with_label_values(&[language, "error"]).inc();
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Code execution failed.",
                Some(ErrorDetails {
                    message: e.to_string(),
                    docker_command: String::new(),
                }),
            );
        }
    };

    match result {
        Ok(results) => {
            metrics::EXECUTIONS_TOTAL.with_label_values(&[language, "completed"]).inc();
            metrics::RUN_DURATION_SECONDS
                .with_label_values(&[language])
                .observe(start.elapsed().as_secs_f64());
            record_outcomes(language, &results);
            (StatusCode::OK, Json(ExecuteResponse { results })).into_response()
        }
        Err(ExecutionError::RequestInvalid(message)) => {
            metrics::EXECUTIONS_TOTAL.with_label_values(&[language, "rejected"]).inc();
            error_response(StatusCode::BAD_REQUEST, message, None)
        }
        Err(ExecutionError::Pipeline { message, command }) => {
            error!(language, error = %message, command = %command, "Code execution failed");
            metrics::EXECUTIONS_TOTAL.with_label_values(&[language, "error"]).inc();
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Code execution failed.",
                Some(ErrorDetails {
                    message,
                    docker_command: command,
                }),
            )
        }
    }
}

/// GET /api/languages - Enabled languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LanguagesResponse {
        languages: state.executor.languages().list_languages(),
    })
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn export_metrics() -> Response {
    match metrics::gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
