//! Sample tracking list and the six step endpoints.

use crate::{
    api::AppState,
    core::tracking::{self, Stage, StepStatus, TrackingStep, TrackingView},
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Parsed with `Stage`'s `FromStr`, so a bad value gets the JSON error body
    pub stage: Option<String>,
}

/// Body shared by the step endpoints. Each step reads the fields it needs.
#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub tracking_id: i64,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<StepStatus>,
    #[serde(default)]
    pub received_by: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
}

impl StepRequest {
    fn status(&self, step: &str) -> Result<StepStatus> {
        self.status
            .ok_or_else(|| Error::validation(format!("{step} update requires a status")))
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TrackingView>>> {
    let stage = query
        .stage
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::parse::<Stage>)
        .transpose()?;
    tracking::list_tracking(&state.db, stage).await.map(Json)
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<TrackingView>> {
    tracking::get_tracking(&state.db, id).await.map(Json)
}

async fn record(state: &AppState, tracking_id: i64, step: TrackingStep) -> Result<Json<TrackingView>> {
    tracking::record_step(&state.db, tracking_id, step).await?;
    tracking::get_tracking(&state.db, tracking_id).await.map(Json)
}

pub async fn sent(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<TrackingView>> {
    let step = TrackingStep::Sent { at: request.at };
    record(&state, request.tracking_id, step).await
}

pub async fn received(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<TrackingView>> {
    let step = TrackingStep::Received {
        at: request.at,
        received_by: request.received_by,
    };
    record(&state, request.tracking_id, step).await
}

pub async fn preparation(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<TrackingView>> {
    let step = TrackingStep::Preparation {
        status: request.status("Preparation")?,
        at: request.at,
    };
    record(&state, request.tracking_id, step).await
}

pub async fn analysis(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<TrackingView>> {
    let step = TrackingStep::Analysis {
        status: request.status("Analysis")?,
        at: request.at,
    };
    record(&state, request.tracking_id, step).await
}

pub async fn roa_issued(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<TrackingView>> {
    let step = TrackingStep::RoaIssued {
        at: request.at,
        document: request.document,
    };
    record(&state, request.tracking_id, step).await
}

pub async fn coa_issued(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<TrackingView>> {
    let step = TrackingStep::CoaIssued {
        at: request.at,
        document: request.document,
    };
    record(&state, request.tracking_id, step).await
}
