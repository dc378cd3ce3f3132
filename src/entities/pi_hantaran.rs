//! PI Hantaran entity - Proforma invoice for hand-delivered (RS1) orders.
//!
//! The billed lines are snapshotted as a JSON array in `items` so later edits of
//! the order do not change an issued proforma.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// PI Hantaran database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pi_hantaran")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Number such as `PIH/2026/0001`
    #[sea_orm(unique)]
    pub invoice_number: String,
    /// Order being billed
    pub order_id: i64,
    pub issue_date: Date,
    pub due_date: Option<Date>,
    /// Addressee printed on the document
    pub bill_to: String,
    /// JSON array of invoice lines
    pub items: String,
    pub subtotal: f64,
    pub discount: f64,
    /// Tax rate in percent
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each proforma bills one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
