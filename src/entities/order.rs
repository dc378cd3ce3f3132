//! Order entity - A client request for analysis submitted through an RS1 or RS2 form.
//!
//! RS1 orders are hand-delivered by the client, RS2 orders arrive by courier and
//! carry the shipment columns.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-facing number, e.g. `RS1/2026/0007`
    #[sea_orm(unique)]
    pub order_number: String,
    /// Intake form code: `"RS1"` or `"RS2"`
    pub form_type: String,
    /// Contact person of the client
    pub client_name: String,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Why the client wants the analysis (research, export, quality control, ...)
    pub analysis_purpose: Option<String>,
    /// Courier used to ship the samples (RS2)
    pub courier: Option<String>,
    /// Courier waybill number (RS2)
    pub courier_tracking_number: Option<String>,
    /// Where the samples were shipped from (RS2)
    pub shipping_origin: Option<String>,
    pub notes: Option<String>,
    /// User who registered the order
    pub created_by: Option<i64>,
    /// When the order was registered
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many samples
    #[sea_orm(has_many = "super::sample::Entity")]
    Samples,
}

impl Related<super::sample::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Samples.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
