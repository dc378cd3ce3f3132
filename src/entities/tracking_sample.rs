//! Tracking sample entity - Progress of a sample through the laboratory.
//!
//! Each step is a nullable timestamp: sent, received, prepared, analyzed, ROA
//! issued and COA issued. Preparation and analysis also carry a status column
//! (`"pending"`, `"in_progress"`, `"completed"`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tracking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracking_samples")]
pub struct Model {
    /// Unique identifier for the tracking row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tracked sample, one row per sample
    #[sea_orm(unique)]
    pub sample_id: i64,
    /// When the client dispatched the sample
    pub sent_at: Option<DateTimeUtc>,
    /// When the laboratory received the sample
    pub received_at: Option<DateTimeUtc>,
    /// Staff member who signed for the sample
    pub received_by: Option<String>,
    /// Preparation status
    pub preparation_status: String,
    /// When preparation was completed
    pub prepared_at: Option<DateTimeUtc>,
    /// Analysis status
    pub analysis_status: String,
    /// When analysis was completed
    pub analyzed_at: Option<DateTimeUtc>,
    /// When the Report of Analysis was issued
    pub roa_issued_at: Option<DateTimeUtc>,
    /// Object-storage URL of the ROA document
    pub roa_document: Option<String>,
    /// When the Certificate of Analysis was issued
    pub coa_issued_at: Option<DateTimeUtc>,
    /// Object-storage URL of the COA document
    pub coa_document: Option<String>,
    /// When the row was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between TrackingSample and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each tracking row belongs to one sample
    #[sea_orm(
        belongs_to = "super::sample::Entity",
        from = "Column::SampleId",
        to = "super::sample::Column::Id"
    )]
    Sample,
}

impl Related<super::sample::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sample.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
