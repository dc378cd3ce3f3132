//! RS1/RS2 intake forms and order maintenance.

use crate::{
    api::{AppState, session::CurrentUser},
    core::order::{
        self, FormType, OrderFilter, OrderInput, OrderSummary, OrderWithSamples, SampleInput,
        SampleUpdate,
    },
    errors::Result,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Body of `/submit-rs1` and `/submit-rs2`.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub order: OrderInput,
    pub samples: Vec<SampleInput>,
}

/// Body of `PUT /orders/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(flatten)]
    pub order: OrderInput,
    pub samples: Vec<SampleUpdate>,
}

/// Query of `GET /orders`. `form_type` goes through `FormType`'s `FromStr`,
/// so any case is accepted and a bad value gets the JSON error body.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub form_type: Option<String>,
    pub q: Option<String>,
}

async fn submit(
    state: &AppState,
    current: &CurrentUser,
    form_type: FormType,
    request: SubmitRequest,
) -> Result<(StatusCode, Json<OrderWithSamples>)> {
    let submitted = order::submit_order(
        &state.db,
        form_type,
        request.order,
        request.samples,
        Some(current.user.id),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(submitted)))
}

pub async fn submit_rs1(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<OrderWithSamples>)> {
    submit(&state, &current, FormType::Rs1, request).await
}

pub async fn submit_rs2(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<OrderWithSamples>)> {
    submit(&state, &current, FormType::Rs2, request).await
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderSummary>>> {
    let filter = OrderFilter {
        form_type: order::clean(query.form_type)
            .map(|raw| raw.parse::<FormType>())
            .transpose()?,
        search: query.q,
    };
    order::list_orders(&state.db, filter).await.map(Json)
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderWithSamples>> {
    order::get_order(&state.db, id).await.map(Json)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<OrderWithSamples>> {
    order::update_order(&state.db, id, request.order, request.samples)
        .await
        .map(Json)
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    order::delete_order(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
