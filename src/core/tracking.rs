//! Sample tracking - the six laboratory steps of every sample.
//!
//! Steps run in a fixed order: sent, received, preparation, analysis, ROA
//! issued and COA issued. A step may only be recorded once the previous one is
//! done, and it is frozen as soon as the following step has started.

use crate::{
    entities::{Order, Sample, TrackingSample, order, sample, tracking_sample},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};
use tracing::{info, instrument, warn};

/// Status of the preparation and analysis steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl StepStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Reads a stored status column. Unknown values count as pending.
    fn from_column(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "Unknown step status in database, treating as pending");
            Self::Pending
        })
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(Error::validation(format!("Unknown step status: '{other}'"))),
        }
    }
}

/// A step update. `at` falls back to the current time when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingStep {
    Sent {
        at: Option<DateTime<Utc>>,
    },
    Received {
        at: Option<DateTime<Utc>>,
        received_by: Option<String>,
    },
    Preparation {
        status: StepStatus,
        at: Option<DateTime<Utc>>,
    },
    Analysis {
        status: StepStatus,
        at: Option<DateTime<Utc>>,
    },
    RoaIssued {
        at: Option<DateTime<Utc>>,
        document: Option<String>,
    },
    CoaIssued {
        at: Option<DateTime<Utc>>,
        document: Option<String>,
    },
}

impl TrackingStep {
    /// 1-based position of the step.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Sent { .. } => 1,
            Self::Received { .. } => 2,
            Self::Preparation { .. } => 3,
            Self::Analysis { .. } => 4,
            Self::RoaIssued { .. } => 5,
            Self::CoaIssued { .. } => 6,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sent { .. } => "sent",
            Self::Received { .. } => "received",
            Self::Preparation { .. } => "preparation",
            Self::Analysis { .. } => "analysis",
            Self::RoaIssued { .. } => "ROA issued",
            Self::CoaIssued { .. } => "COA issued",
        }
    }

    const fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Sent { at }
            | Self::Received { at, .. }
            | Self::Preparation { at, .. }
            | Self::Analysis { at, .. }
            | Self::RoaIssued { at, .. }
            | Self::CoaIssued { at, .. } => *at,
        }
    }
}

/// How far a sample has progressed, derived from its tracking columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Registered,
    Sent,
    Received,
    InPreparation,
    Prepared,
    InAnalysis,
    Analyzed,
    RoaIssued,
    CoaIssued,
}

impl Stage {
    pub const ALL: [Self; 9] = [
        Self::Registered,
        Self::Sent,
        Self::Received,
        Self::InPreparation,
        Self::Prepared,
        Self::InAnalysis,
        Self::Analyzed,
        Self::RoaIssued,
        Self::CoaIssued,
    ];

    /// Name used in query strings and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Sent => "sent",
            Self::Received => "received",
            Self::InPreparation => "in_preparation",
            Self::Prepared => "prepared",
            Self::InAnalysis => "in_analysis",
            Self::Analyzed => "analyzed",
            Self::RoaIssued => "roa_issued",
            Self::CoaIssued => "coa_issued",
        }
    }

    /// Furthest stage reached by a tracking row.
    #[must_use]
    pub fn of(row: &tracking_sample::Model) -> Self {
        let preparation = StepStatus::from_column(&row.preparation_status);
        let analysis = StepStatus::from_column(&row.analysis_status);
        if row.coa_issued_at.is_some() {
            Self::CoaIssued
        } else if row.roa_issued_at.is_some() {
            Self::RoaIssued
        } else if analysis == StepStatus::Completed {
            Self::Analyzed
        } else if analysis == StepStatus::InProgress {
            Self::InAnalysis
        } else if preparation == StepStatus::Completed {
            Self::Prepared
        } else if preparation == StepStatus::InProgress {
            Self::InPreparation
        } else if row.received_at.is_some() {
            Self::Received
        } else if row.sent_at.is_some() {
            Self::Sent
        } else {
            Self::Registered
        }
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| Error::validation(format!("Unknown stage: '{s}'")))
    }
}

/// A tracking row with the sample and order it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    #[serde(flatten)]
    pub tracking: tracking_sample::Model,
    pub stage: Stage,
    pub sample: sample::Model,
    pub order_number: String,
    pub form_type: String,
    pub client_name: String,
}

/// Number of tracking rows at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: u64,
}

/// Fresh tracking row for a newly registered sample.
pub(crate) fn new_tracking_row(sample_id: i64, now: DateTime<Utc>) -> tracking_sample::ActiveModel {
    tracking_sample::ActiveModel {
        sample_id: Set(sample_id),
        preparation_status: Set(StepStatus::Pending.as_str().to_string()),
        analysis_status: Set(StepStatus::Pending.as_str().to_string()),
        updated_at: Set(now),
        ..Default::default()
    }
}

fn precondition(message: impl Into<String>) -> Error {
    Error::StepPrecondition {
        message: message.into(),
    }
}

fn check_status_change(step: &str, current: StepStatus, next: StepStatus) -> Result<()> {
    if next == StepStatus::Pending {
        return Err(precondition(format!("{step} cannot be set back to pending")));
    }
    if current == StepStatus::Completed && next != StepStatus::Completed {
        return Err(precondition(format!("{step} is already completed")));
    }
    Ok(())
}

fn check_not_before(step: &TrackingStep, previous: Option<DateTime<Utc>>) -> Result<()> {
    if let (Some(at), Some(previous)) = (step.at(), previous) {
        if at < previous {
            return Err(precondition(format!(
                "{} time {at} is earlier than the previous step ({previous})",
                step.name()
            )));
        }
    }
    Ok(())
}

fn check_document(document: Option<&String>) -> Result<()> {
    match document.map(|d| d.trim()) {
        Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => Err(
            Error::validation(format!("Document must be an http(s) URL, got '{url}'")),
        ),
        _ => Ok(()),
    }
}

/// Checks whether `step` may be recorded on `row`.
///
/// # Errors
/// Returns `Error::StepPrecondition` when the previous step is not done, the
/// step is frozen by a later one, or a status would move backwards. Returns
/// `Error::Validation` for a malformed document URL.
pub fn check_precondition(row: &tracking_sample::Model, step: &TrackingStep) -> Result<()> {
    let preparation = StepStatus::from_column(&row.preparation_status);
    let analysis = StepStatus::from_column(&row.analysis_status);

    match step {
        TrackingStep::Sent { .. } => {
            if row.received_at.is_some() {
                return Err(precondition("Sample was already received"));
            }
        }
        TrackingStep::Received { .. } => {
            if row.sent_at.is_none() {
                return Err(precondition("Sample has not been sent yet"));
            }
            if preparation != StepStatus::Pending {
                return Err(precondition("Preparation has already started"));
            }
            check_not_before(step, row.sent_at)?;
        }
        TrackingStep::Preparation { status, .. } => {
            if row.received_at.is_none() {
                return Err(precondition("Sample has not been received yet"));
            }
            if analysis != StepStatus::Pending {
                return Err(precondition("Analysis has already started"));
            }
            check_status_change("Preparation", preparation, *status)?;
            check_not_before(step, row.received_at)?;
        }
        TrackingStep::Analysis { status, .. } => {
            if preparation != StepStatus::Completed {
                return Err(precondition("Preparation is not completed"));
            }
            if row.roa_issued_at.is_some() {
                return Err(precondition("ROA has already been issued"));
            }
            check_status_change("Analysis", analysis, *status)?;
            check_not_before(step, row.prepared_at)?;
        }
        TrackingStep::RoaIssued { document, .. } => {
            if analysis != StepStatus::Completed {
                return Err(precondition("Analysis is not completed"));
            }
            if row.coa_issued_at.is_some() {
                return Err(precondition("COA has already been issued"));
            }
            check_document(document.as_ref())?;
            check_not_before(step, row.analyzed_at)?;
        }
        TrackingStep::CoaIssued { document, .. } => {
            if row.roa_issued_at.is_none() {
                return Err(precondition("ROA has not been issued yet"));
            }
            check_document(document.as_ref())?;
            check_not_before(step, row.roa_issued_at)?;
        }
    }
    Ok(())
}

/// Applies an already checked step to `row`.
fn apply_step(
    row: tracking_sample::Model,
    step: TrackingStep,
    now: DateTime<Utc>,
) -> tracking_sample::ActiveModel {
    let at = step.at().unwrap_or(now);
    let mut model: tracking_sample::ActiveModel = row.into();
    match step {
        TrackingStep::Sent { .. } => model.sent_at = Set(Some(at)),
        TrackingStep::Received { received_by, .. } => {
            model.received_at = Set(Some(at));
            model.received_by = Set(crate::core::order::clean(received_by));
        }
        TrackingStep::Preparation { status, .. } => {
            model.preparation_status = Set(status.as_str().to_string());
            model.prepared_at = Set((status == StepStatus::Completed).then_some(at));
        }
        TrackingStep::Analysis { status, .. } => {
            model.analysis_status = Set(status.as_str().to_string());
            model.analyzed_at = Set((status == StepStatus::Completed).then_some(at));
        }
        TrackingStep::RoaIssued { document, .. } => {
            model.roa_issued_at = Set(Some(at));
            model.roa_document = Set(crate::core::order::clean(document));
        }
        TrackingStep::CoaIssued { document, .. } => {
            model.coa_issued_at = Set(Some(at));
            model.coa_document = Set(crate::core::order::clean(document));
        }
    }
    model.updated_at = Set(now);
    model
}

/// Records a step on a tracking row and returns the updated row.
///
/// # Errors
/// Returns `Error::NotFound` for an unknown row and the errors of
/// [`check_precondition`] when the step is not allowed yet.
#[instrument(skip(db, step), fields(step = step.name()))]
pub async fn record_step(
    db: &DatabaseConnection,
    tracking_id: i64,
    step: TrackingStep,
) -> Result<tracking_sample::Model> {
    let row = TrackingSample::find_by_id(tracking_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Tracking sample", tracking_id))?;

    check_precondition(&row, &step)?;

    let number = step.number();
    let updated = apply_step(row, step, Utc::now()).update(db).await?;
    info!(
        tracking_id,
        step = number,
        stage = ?Stage::of(&updated),
        "Tracking step recorded"
    );
    Ok(updated)
}

async fn attach_context(
    db: &DatabaseConnection,
    rows: Vec<(tracking_sample::Model, Option<sample::Model>)>,
) -> Result<Vec<TrackingView>> {
    let order_ids: Vec<i64> = rows
        .iter()
        .filter_map(|(_, s)| s.as_ref().map(|s| s.order_id))
        .collect();
    let orders: HashMap<i64, order::Model> = if order_ids.is_empty() {
        HashMap::new()
    } else {
        Order::find()
            .filter(order::Column::Id.is_in(order_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect()
    };

    Ok(rows
        .into_iter()
        .filter_map(|(tracking, sample)| {
            let sample = sample?;
            let order = orders.get(&sample.order_id)?;
            Some(TrackingView {
                stage: Stage::of(&tracking),
                tracking,
                sample,
                order_number: order.order_number.clone(),
                form_type: order.form_type.clone(),
                client_name: order.client_name.clone(),
            })
        })
        .collect())
}

/// Lists tracking rows newest first, optionally only those at `stage`.
pub async fn list_tracking(db: &DatabaseConnection, stage: Option<Stage>) -> Result<Vec<TrackingView>> {
    let rows = TrackingSample::find()
        .find_also_related(Sample)
        .order_by_desc(tracking_sample::Column::Id)
        .all(db)
        .await?;
    let views = attach_context(db, rows).await?;
    Ok(match stage {
        Some(stage) => views.into_iter().filter(|v| v.stage == stage).collect(),
        None => views,
    })
}

/// Retrieves one tracking row with its sample and order.
pub async fn get_tracking(db: &DatabaseConnection, tracking_id: i64) -> Result<TrackingView> {
    let rows = TrackingSample::find_by_id(tracking_id)
        .find_also_related(Sample)
        .all(db)
        .await?;
    attach_context(db, rows)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("Tracking sample", tracking_id))
}

/// Counts tracking rows per stage. Every stage is present, in step order.
pub async fn stage_counts(db: &DatabaseConnection) -> Result<Vec<StageCount>> {
    let mut counts: HashMap<Stage, u64> = HashMap::new();
    for row in TrackingSample::find().all(db).await? {
        *counts.entry(Stage::of(&row)).or_default() += 1;
    }
    Ok(Stage::ALL
        .into_iter()
        .map(|stage| StageCount {
            stage,
            count: counts.get(&stage).copied().unwrap_or(0),
        })
        .collect())
}
