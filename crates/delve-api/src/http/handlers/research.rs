//! Research job handlers for the REST API.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use tokio_stream::Stream;

use delve_core::event::next_for_job;
use delve_core::service::research::RESEARCH_STARTED;
use delve_types::research::{
    CreateResearchRequest, JobId, JobStatus, ResearchEvent, ResearchJob, ResearchStep,
};

use crate::http::error::AppError;
use crate::http::extractors::query::ResearchListQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body returned when a job is created.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchCreated {
    pub research_id: JobId,
    pub status: JobStatus,
    pub message: &'static str,
}

/// Body returned by the list endpoint.
#[derive(Debug, Serialize)]
pub struct ResearchList {
    pub results: Vec<ResearchJob>,
    pub count: usize,
}

/// POST /api/v1/research - Create and queue a research job.
pub async fn create_research(
    State(state): State<AppState>,
    Json(body): Json<CreateResearchRequest>,
) -> Result<Json<ApiResponse<ResearchCreated>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let job = state.research_service.create(body).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let self_link = format!("/api/v1/research/{}", job.id);
    let events_link = format!("/api/v1/research/{}/events", job.id);
    let resp = ApiResponse::success(
        ResearchCreated {
            research_id: job.id,
            status: job.status,
            message: RESEARCH_STARTED,
        },
        request_id,
        elapsed,
    )
    .with_link("self", &self_link)
    .with_link("events", &events_link);

    Ok(Json(resp))
}

/// GET /api/v1/research - List jobs, newest first.
pub async fn list_research(
    State(state): State<AppState>,
    Query(query): Query<ResearchListQuery>,
) -> Result<Json<ApiResponse<ResearchList>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let (status, variant) = query.filters()?;
    let results = state.research_service.list(status, variant).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let count = results.len();
    let resp = ApiResponse::success(ResearchList { results, count }, request_id, elapsed)
        .with_link("self", "/api/v1/research");

    Ok(Json(resp))
}

/// GET /api/v1/research/{id} - Full job record.
pub async fn get_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ResearchJob>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let job = state.research_service.get(&id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let self_link = format!("/api/v1/research/{}", job.id);
    let resp = ApiResponse::success(job, request_id, elapsed).with_link("self", &self_link);
    Ok(Json(resp))
}

/// POST /api/v1/research/{id}/cancel - Cancel a pending or running job.
pub async fn cancel_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ResearchJob>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let job = state.research_service.cancel(&id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let self_link = format!("/api/v1/research/{}", job.id);
    let resp = ApiResponse::success(job, request_id, elapsed).with_link("self", &self_link);
    Ok(Json(resp))
}

/// GET /api/v1/research/{id}/events - Live progress as SSE.
///
/// Replays the steps recorded so far, then follows live `step` events until
/// a `finished` event. A job that is already terminal gets its steps and a
/// single `finished` event.
pub async fn research_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe before the snapshot so no event falls between the two.
    let mut rx = state.event_bus.subscribe();
    let job = state.research_service.get(&id).await?;

    let sse_stream = async_stream::stream! {
        let mut last_seen = None;
        for step in &job.steps {
            last_seen = Some(step.timestamp);
            yield Ok::<_, Infallible>(step_event(step));
        }

        if job.status.is_terminal() {
            yield Ok(finished_event(job.status, job.error.as_deref()));
            return;
        }

        while let Some(event) = next_for_job(&mut rx, job.id).await {
            match event {
                ResearchEvent::Step { step, .. } => {
                    if last_seen.is_some_and(|seen| step.timestamp <= seen) {
                        continue;
                    }
                    last_seen = Some(step.timestamp);
                    yield Ok(step_event(&step));
                }
                ResearchEvent::Finished { status, error, .. } => {
                    yield Ok(finished_event(status, error.as_deref()));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn step_event(step: &ResearchStep) -> Event {
    let data = serde_json::to_string(step).unwrap_or_else(|_| "{}".to_string());
    Event::default().event("step").data(data)
}

fn finished_event(status: JobStatus, error: Option<&str>) -> Event {
    let data = serde_json::json!({ "status": status, "error": error });
    Event::default().event("finished").data(data.to_string())
}
