//! Dashboard counters.

use crate::{
    api::AppState,
    core::{
        invoice::{self, InvoiceSummary},
        order::{FormType, count_by_form_type},
        tracking::{StageCount, stage_counts},
    },
    errors::Result,
};
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OrderCounts {
    pub rs1: u64,
    pub rs2: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub orders: OrderCounts,
    pub stages: Vec<StageCount>,
    pub invoices: InvoiceSummary,
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<DashboardSummary>> {
    let counts = count_by_form_type(&state.db).await?;
    let count = |form_type: FormType| counts.get(&form_type).copied().unwrap_or(0);
    Ok(Json(DashboardSummary {
        orders: OrderCounts {
            rs1: count(FormType::Rs1),
            rs2: count(FormType::Rs2),
        },
        stages: stage_counts(&state.db).await?,
        invoices: invoice::summary(&state.db).await?,
    }))
}
