use crate::infra::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use fc_forms::error::AppError;
use fc_forms::workflows::dispatch::{
    job_id_from_key, DispatchSummary, FormDispatcher, FormRepository, JobDirectory,
    ObjectCreatedEvent, ObjectStore,
};
use fc_forms::workflows::estimate::{render, EstimateFormBuilder, FormContext, RenderedForm};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct FormRequest {
    pub(crate) source_key: String,
    #[serde(default)]
    pub(crate) fa_number: Option<String>,
    #[serde(default)]
    pub(crate) assistant_surgeon_fee: Option<Decimal>,
    pub(crate) payload: Value,
}

pub(crate) fn with_form_routes<S, D, R>(dispatcher: Arc<FormDispatcher<S, D, R>>) -> Router
where
    S: ObjectStore + 'static,
    D: JobDirectory + 'static,
    R: FormRepository + 'static,
{
    form_router(dispatcher)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

fn form_router<S, D, R>(dispatcher: Arc<FormDispatcher<S, D, R>>) -> Router
where
    S: ObjectStore + 'static,
    D: JobDirectory + 'static,
    R: FormRepository + 'static,
{
    Router::new()
        .route("/api/v1/forms", post(render_form_handler::<S, D, R>))
        .route("/api/v1/forms/:job_id", get(stored_form_handler::<S, D, R>))
        .route("/api/v1/events", post(object_created_handler::<S, D, R>))
        .with_state(dispatcher)
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Renders a form from an inline payload without storing it.
pub(crate) async fn render_form_handler<S, D, R>(
    State(dispatcher): State<Arc<FormDispatcher<S, D, R>>>,
    Json(request): Json<FormRequest>,
) -> Result<Json<RenderedForm>, AppError>
where
    S: ObjectStore + 'static,
    D: JobDirectory + 'static,
    R: FormRepository + 'static,
{
    let FormRequest {
        source_key,
        fa_number,
        assistant_surgeon_fee,
        payload,
    } = request;

    let job_id = job_id_from_key(&source_key, dispatcher.output_suffix());
    let context = FormContext::new(job_id, source_key)
        .with_fa_number(fa_number)
        .with_assistant_surgeon_fee(assistant_surgeon_fee.unwrap_or(Decimal::ZERO));

    let record = EstimateFormBuilder::from_value(payload, &context)?;
    let form = render(&record);
    info!(
        job_id = %form.job_id,
        template_id = form.template_id,
        template_name = form.template_name,
        "rendered inline form"
    );
    Ok(Json(form))
}

pub(crate) async fn object_created_handler<S, D, R>(
    State(dispatcher): State<Arc<FormDispatcher<S, D, R>>>,
    Json(event): Json<ObjectCreatedEvent>,
) -> Result<Json<DispatchSummary>, AppError>
where
    S: ObjectStore + 'static,
    D: JobDirectory + 'static,
    R: FormRepository + 'static,
{
    // Object reads and repository writes block, so the batch runs off the async workers.
    let summary = tokio::task::spawn_blocking(move || dispatcher.handle(&event))
        .await
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))??;
    Ok(Json(summary))
}

pub(crate) async fn stored_form_handler<S, D, R>(
    State(dispatcher): State<Arc<FormDispatcher<S, D, R>>>,
    Path(job_id): Path<String>,
) -> Response
where
    S: ObjectStore + 'static,
    D: JobDirectory + 'static,
    R: FormRepository + 'static,
{
    match dispatcher.repository().fetch(&job_id) {
        Ok(Some(form)) => (StatusCode::OK, Json(form)).into_response(),
        Ok(None) => {
            let payload = json!({
                "job_id": job_id,
                "error": "form not found",
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
