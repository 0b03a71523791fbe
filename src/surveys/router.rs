use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;

use super::delivery::TriggerEvent;
use super::domain::{SurveyId, SurveyResponseSubmission, SurveyStatus};
use super::repository::{DeliveryDispatcher, SurveyStore};
use super::service::{SurveyService, SurveyServiceError};

/// Router builder exposing the survey statistics and delivery endpoints.
pub fn survey_router<S, D>(service: Arc<SurveyService<S, D>>) -> Router
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    Router::new()
        .route("/api/v1/surveys", get(list_handler::<S, D>))
        .route(
            "/api/v1/surveys/:survey_id/responses",
            post(submit_handler::<S, D>),
        )
        .route(
            "/api/v1/surveys/:survey_id/statistics",
            get(statistics_handler::<S, D>),
        )
        .route(
            "/api/v1/surveys/:survey_id/delivery/run",
            post(delivery_run_handler::<S, D>),
        )
        .route(
            "/api/v1/surveys/:survey_id/delivery/send",
            post(send_now_handler::<S, D>),
        )
        .route(
            "/api/v1/surveys/:survey_id/events",
            post(event_handler::<S, D>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListSurveysQuery {
    #[serde(default)]
    pub(crate) status: Option<SurveyStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeliveryRunRequest {
    #[serde(default)]
    pub(crate) now: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TriggerEventRequest {
    #[serde(rename = "type")]
    pub(crate) event: TriggerEvent,
    #[serde(default)]
    pub(crate) occurred_at: Option<NaiveDateTime>,
}

pub(crate) async fn list_handler<S, D>(
    State(service): State<Arc<SurveyService<S, D>>>,
    Query(query): Query<ListSurveysQuery>,
) -> Response
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    match service.survey_overviews(query.status) {
        Ok(overviews) => (StatusCode::OK, axum::Json(overviews)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, D>(
    State(service): State<Arc<SurveyService<S, D>>>,
    Path(survey_id): Path<String>,
    axum::Json(mut submission): axum::Json<SurveyResponseSubmission>,
) -> Response
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    // The path segment is authoritative over whatever the body carried.
    submission.survey_id = SurveyId(survey_id);
    let now = Local::now().naive_local();

    match service.submit(submission, now) {
        Ok(response) => (StatusCode::CREATED, axum::Json(response)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn statistics_handler<S, D>(
    State(service): State<Arc<SurveyService<S, D>>>,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    match service.statistics(&SurveyId(survey_id)) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delivery_run_handler<S, D>(
    State(service): State<Arc<SurveyService<S, D>>>,
    Path(survey_id): Path<String>,
    request: Option<axum::Json<DeliveryRunRequest>>,
) -> Response
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    // A bare POST without a body runs the check against the wall clock.
    let now = request
        .and_then(|axum::Json(request)| request.now)
        .unwrap_or_else(|| Local::now().naive_local());
    match service.process_due(&SurveyId(survey_id), now) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn send_now_handler<S, D>(
    State(service): State<Arc<SurveyService<S, D>>>,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    let now = Local::now().naive_local();
    match service.send_now(&SurveyId(survey_id), now) {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(json!({ "sent_at": now })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn event_handler<S, D>(
    State(service): State<Arc<SurveyService<S, D>>>,
    Path(survey_id): Path<String>,
    axum::Json(request): axum::Json<TriggerEventRequest>,
) -> Response
where
    S: SurveyStore + 'static,
    D: DeliveryDispatcher + 'static,
{
    let occurred_at = request
        .occurred_at
        .unwrap_or_else(|| Local::now().naive_local());

    match service.handle_event(&SurveyId(survey_id), request.event, occurred_at) {
        Ok(Some(send_at)) => (
            StatusCode::ACCEPTED,
            axum::Json(json!({ "send_at": send_at })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            axum::Json(json!({ "send_at": serde_json::Value::Null })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: SurveyServiceError) -> Response {
    match error {
        SurveyServiceError::SurveyNotFound => {
            let payload = json!({ "error": "survey not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        SurveyServiceError::Rejected(errors) => {
            let payload = json!({
                "error": "submission rejected",
                "field_errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        SurveyServiceError::Config(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        SurveyServiceError::NoDeliveryConfig => {
            let payload = json!({ "error": "survey has no delivery configuration" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
