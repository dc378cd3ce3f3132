//! Sample entity - One physical specimen belonging to an order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sample database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "samples")]
pub struct Model {
    /// Unique identifier for the sample
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this sample was submitted with
    pub order_id: i64,
    /// Label code, `<order_number>-<NN>`
    #[sea_orm(unique)]
    pub sample_code: String,
    /// Client's name for the sample
    pub name: String,
    /// Matrix of the sample (soil, water, feed, ...)
    pub sample_type: Option<String>,
    /// Number of units submitted
    pub quantity: i32,
    /// Unit of `quantity` (e.g. "pcs", "kg")
    pub unit: String,
    /// Requested analysis parameters, comma separated
    pub parameters: String,
    /// Price per unit used when billing the sample
    pub unit_price: f64,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Sample and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each sample belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    /// Each sample has exactly one tracking row
    #[sea_orm(has_one = "super::tracking_sample::Entity")]
    TrackingSample,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::tracking_sample::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingSample.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
