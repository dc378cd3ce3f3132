//! PI Hantaran and PI Shipment endpoints, including the PDF download.

use crate::{
    api::{AppState, session::CurrentUser},
    core::{
        document::InvoiceDocument,
        invoice::{self, HantaranInput, ShipmentInput},
        order::get_order,
    },
    entities::{pi_hantaran, pi_shipment},
    errors::Result,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct NextNumber {
    pub invoice_number: String,
}

fn pdf_response(document: &InvoiceDocument) -> Result<Response> {
    let bytes = document.render_pdf()?;
    let disposition = format!("attachment; filename=\"{}\"", document.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn list_hantaran(
    State(state): State<AppState>,
) -> Result<Json<Vec<pi_hantaran::Model>>> {
    invoice::list_hantaran(&state.db).await.map(Json)
}

pub async fn create_hantaran(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<HantaranInput>,
) -> Result<(StatusCode, Json<pi_hantaran::Model>)> {
    let created = invoice::create_hantaran(
        &state.db,
        input,
        Some(current.user.id),
        state.config.default_tax_rate,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn next_hantaran_number(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<NextNumber>> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let invoice_number = invoice::next_hantaran_number(&state.db, year).await?;
    Ok(Json(NextNumber { invoice_number }))
}

pub async fn get_hantaran(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<pi_hantaran::Model>> {
    invoice::get_hantaran(&state.db, id).await.map(Json)
}

pub async fn delete_hantaran(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    invoice::delete_hantaran(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hantaran_pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let proforma = invoice::get_hantaran(&state.db, id).await?;
    let order = get_order(&state.db, proforma.order_id).await?.order;
    pdf_response(&InvoiceDocument::from_hantaran(&proforma, &order)?)
}

pub async fn list_shipments(
    State(state): State<AppState>,
) -> Result<Json<Vec<pi_shipment::Model>>> {
    invoice::list_shipments(&state.db).await.map(Json)
}

pub async fn create_shipment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(input): Json<ShipmentInput>,
) -> Result<(StatusCode, Json<pi_shipment::Model>)> {
    let created = invoice::create_shipment(
        &state.db,
        input,
        Some(current.user.id),
        state.config.default_tax_rate,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn next_shipment_number(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<NextNumber>> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let invoice_number = invoice::next_shipment_number(&state.db, year).await?;
    Ok(Json(NextNumber { invoice_number }))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<pi_shipment::Model>> {
    invoice::get_shipment(&state.db, id).await.map(Json)
}

pub async fn delete_shipment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    invoice::delete_shipment(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn shipment_pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let proforma = invoice::get_shipment(&state.db, id).await?;
    let order = get_order(&state.db, proforma.order_id).await?.order;
    pdf_response(&InvoiceDocument::from_shipment(&proforma, &order)?)
}
