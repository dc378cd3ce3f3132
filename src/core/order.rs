//! Order business logic - RS1/RS2 sample intake and order maintenance.
//!
//! Submitting a form creates the order, its samples and one tracking row per
//! sample inside a single database transaction. Updating an order rewrites the
//! order fields and reconciles the sample list in one transaction as well.

use crate::{
    core::{
        numbering::{NumberKind, next_number, sample_code, sample_position},
        tracking::new_tracking_row,
    },
    entities::{
        Order, PiHantaran, PiShipment, Sample, TrackingSample, order, pi_hantaran, pi_shipment,
        sample, tracking_sample,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Utc};
use sea_orm::{
    Condition, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, Func, LikeExpr},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};
use tracing::{info, instrument};

/// Intake form an order was submitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    /// Samples hand-delivered by the client
    #[serde(rename = "RS1")]
    Rs1,
    /// Samples shipped by courier
    #[serde(rename = "RS2")]
    Rs2,
}

impl FormType {
    /// Code stored in the database and used as the order number prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rs1 => "RS1",
            Self::Rs2 => "RS2",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RS1" => Ok(Self::Rs1),
            "RS2" => Ok(Self::Rs2),
            other => Err(Error::validation(format!("Unknown form type: '{other}'"))),
        }
    }
}

/// Client and shipment fields of an order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderInput {
    pub client_name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub analysis_purpose: Option<String>,
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub courier_tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_origin: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One sample line of an intake form.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    pub name: String,
    #[serde(default)]
    pub sample_type: Option<String>,
    pub quantity: i32,
    pub unit: String,
    #[serde(default)]
    pub parameters: String,
    pub unit_price: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A sample line of an order update. Lines with an `id` edit that sample, lines
/// without one add a new sample.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleUpdate {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub sample: SampleInput,
}

/// An order together with its samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWithSamples {
    #[serde(flatten)]
    pub order: order::Model,
    pub samples: Vec<sample::Model>,
}

/// A row of the order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: order::Model,
    pub sample_count: usize,
}

/// Filters of the order list.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Only orders from this intake form
    pub form_type: Option<FormType>,
    /// Case-insensitive match on client, company or order number
    pub search: Option<String>,
}

/// Trims an optional text field, turning blank values into `None`.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_order(form_type: FormType, input: &OrderInput) -> Result<()> {
    if input.client_name.trim().is_empty() {
        return Err(Error::validation("Client name cannot be empty"));
    }
    if form_type == FormType::Rs2 {
        if clean(input.courier.clone()).is_none() {
            return Err(Error::validation("RS2 orders require a courier"));
        }
        if clean(input.shipping_origin.clone()).is_none() {
            return Err(Error::validation("RS2 orders require a shipping origin"));
        }
    }
    Ok(())
}

fn validate_sample(index: usize, sample: &SampleInput) -> Result<()> {
    let line = index + 1;
    if sample.name.trim().is_empty() {
        return Err(Error::validation(format!("Sample {line}: name cannot be empty")));
    }
    if sample.quantity <= 0 {
        return Err(Error::validation(format!(
            "Sample {line}: quantity must be positive"
        )));
    }
    if sample.unit.trim().is_empty() {
        return Err(Error::validation(format!("Sample {line}: unit cannot be empty")));
    }
    if !sample.unit_price.is_finite() || sample.unit_price < 0.0 {
        return Err(Error::InvalidAmount {
            amount: sample.unit_price,
        });
    }
    Ok(())
}

fn validate_samples<'a, I>(samples: I) -> Result<()>
where
    I: IntoIterator<Item = &'a SampleInput>,
{
    let mut count = 0;
    for (index, sample) in samples.into_iter().enumerate() {
        validate_sample(index, sample)?;
        count += 1;
    }
    if count == 0 {
        return Err(Error::validation("An order needs at least one sample"));
    }
    Ok(())
}

fn apply_order_fields(model: &mut order::ActiveModel, input: OrderInput) {
    model.client_name = Set(input.client_name.trim().to_string());
    model.company_name = Set(clean(input.company_name));
    model.address = Set(clean(input.address));
    model.phone = Set(clean(input.phone));
    model.email = Set(clean(input.email));
    model.analysis_purpose = Set(clean(input.analysis_purpose));
    model.courier = Set(clean(input.courier));
    model.courier_tracking_number = Set(clean(input.courier_tracking_number));
    model.shipping_origin = Set(clean(input.shipping_origin));
    model.notes = Set(clean(input.notes));
}

fn apply_sample_fields(model: &mut sample::ActiveModel, input: SampleInput) {
    model.name = Set(input.name.trim().to_string());
    model.sample_type = Set(clean(input.sample_type));
    model.quantity = Set(input.quantity);
    model.unit = Set(input.unit.trim().to_string());
    model.parameters = Set(input.parameters.trim().to_string());
    model.unit_price = Set(input.unit_price);
    model.notes = Set(clean(input.notes));
}

async fn insert_sample<C>(
    db: &C,
    order_id: i64,
    code: String,
    input: SampleInput,
) -> Result<sample::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut model = sample::ActiveModel {
        order_id: Set(order_id),
        sample_code: Set(code),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_sample_fields(&mut model, input);
    let sample = model.insert(db).await?;
    new_tracking_row(sample.id, now).insert(db).await?;
    Ok(sample)
}

async fn samples_of<C>(db: &C, order_id: i64) -> Result<Vec<sample::Model>>
where
    C: ConnectionTrait,
{
    Sample::find()
        .filter(sample::Column::OrderId.eq(order_id))
        .order_by_asc(sample::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Registers an order submitted through an intake form.
///
/// Generates the order number, stores the order, gives each sample a code
/// `<order_number>-<NN>` and opens a tracking row per sample, all in one
/// transaction.
///
/// # Errors
/// Returns `Error::Validation` or `Error::InvalidAmount` when the form is
/// incomplete; nothing is written in that case.
#[instrument(skip(db, input, samples), fields(form_type = %form_type))]
pub async fn submit_order(
    db: &DatabaseConnection,
    form_type: FormType,
    input: OrderInput,
    samples: Vec<SampleInput>,
    created_by: Option<i64>,
) -> Result<OrderWithSamples> {
    validate_order(form_type, &input)?;
    validate_samples(&samples)?;

    let txn = db.begin().await?;
    let now = Utc::now();
    let order_number = next_number(&txn, NumberKind::Order(form_type), now.year()).await?;

    let mut model = order::ActiveModel {
        order_number: Set(order_number.clone()),
        form_type: Set(form_type.as_str().to_string()),
        created_by: Set(created_by),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_order_fields(&mut model, input);
    let order = model.insert(&txn).await?;

    let mut stored = Vec::with_capacity(samples.len());
    for (index, sample) in samples.into_iter().enumerate() {
        let code = sample_code(&order_number, index + 1);
        stored.push(insert_sample(&txn, order.id, code, sample).await?);
    }

    txn.commit().await?;
    info!(
        order_id = order.id,
        order_number = %order.order_number,
        samples = stored.len(),
        "Order submitted"
    );
    Ok(OrderWithSamples {
        order,
        samples: stored,
    })
}

const LIKE_ESCAPE: char = '|';

/// Escapes the `LIKE` wildcards so the search text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, LIKE_ESCAPE | '%' | '_') {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Lists orders newest first, each with its number of samples.
pub async fn list_orders(db: &DatabaseConnection, filter: OrderFilter) -> Result<Vec<OrderSummary>> {
    let mut query = Order::find();
    if let Some(form_type) = filter.form_type {
        query = query.filter(order::Column::FormType.eq(form_type.as_str()));
    }
    if let Some(search) = clean(filter.search) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        let lower = |column: order::Column| {
            Expr::expr(Func::lower(Expr::col(column)))
                .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
        };
        query = query.filter(
            Condition::any()
                .add(lower(order::Column::ClientName))
                .add(lower(order::Column::CompanyName))
                .add(lower(order::Column::OrderNumber)),
        );
    }
    let orders = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;

    let mut counts: HashMap<i64, usize> = HashMap::new();
    if !orders.is_empty() {
        let order_ids: Vec<i64> = Sample::find()
            .select_only()
            .column(sample::Column::OrderId)
            .filter(sample::Column::OrderId.is_in(orders.iter().map(|o| o.id)))
            .into_tuple()
            .all(db)
            .await?;
        for order_id in order_ids {
            *counts.entry(order_id).or_default() += 1;
        }
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let sample_count = counts.get(&order.id).copied().unwrap_or(0);
            OrderSummary {
                order,
                sample_count,
            }
        })
        .collect())
}

/// Retrieves an order with its samples.
pub async fn get_order(db: &DatabaseConnection, order_id: i64) -> Result<OrderWithSamples> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let samples = samples_of(db, order_id).await?;
    Ok(OrderWithSamples { order, samples })
}

/// Updates an order and reconciles its samples in one transaction.
///
/// Samples listed with an id are edited, samples without an id are added and
/// existing samples missing from the list are removed with their tracking row.
///
/// # Errors
/// Returns `Error::Validation` if a listed id belongs to another order, or if a
/// sample that the laboratory already received would be removed. The whole
/// update is rolled back in both cases.
#[instrument(skip(db, input, samples))]
pub async fn update_order(
    db: &DatabaseConnection,
    order_id: i64,
    input: OrderInput,
    samples: Vec<SampleUpdate>,
) -> Result<OrderWithSamples> {
    let txn = db.begin().await?;

    let existing_order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let form_type: FormType = existing_order.form_type.parse()?;
    validate_order(form_type, &input)?;
    validate_samples(samples.iter().map(|s| &s.sample))?;

    let existing: HashMap<i64, sample::Model> = samples_of(&txn, order_id)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let kept: Vec<i64> = samples.iter().filter_map(|s| s.id).collect();
    if let Some(foreign) = kept.iter().find(|id| !existing.contains_key(id)) {
        return Err(Error::validation(format!(
            "Sample {foreign} does not belong to order {order_id}"
        )));
    }

    // Remove samples no longer listed
    for (sample_id, sample) in &existing {
        if kept.contains(sample_id) {
            continue;
        }
        let tracking = TrackingSample::find()
            .filter(tracking_sample::Column::SampleId.eq(*sample_id))
            .one(&txn)
            .await?;
        if tracking.as_ref().is_some_and(|t| t.received_at.is_some()) {
            return Err(Error::validation(format!(
                "Sample {} was already received and cannot be removed",
                sample.sample_code
            )));
        }
        TrackingSample::delete_many()
            .filter(tracking_sample::Column::SampleId.eq(*sample_id))
            .exec(&txn)
            .await?;
        Sample::delete_by_id(*sample_id).exec(&txn).await?;
    }

    let order_number = existing_order.order_number.clone();
    let mut next_position = existing
        .values()
        .filter_map(|s| sample_position(&order_number, &s.sample_code))
        .max()
        .unwrap_or(existing.len())
        + 1;

    let now = Utc::now();
    for update in samples {
        match update.id.and_then(|id| existing.get(&id)) {
            Some(current) => {
                let mut model: sample::ActiveModel = current.clone().into();
                apply_sample_fields(&mut model, update.sample);
                model.updated_at = Set(now);
                model.update(&txn).await?;
            }
            None => {
                let code = sample_code(&order_number, next_position);
                next_position += 1;
                insert_sample(&txn, order_id, code, update.sample).await?;
            }
        }
    }

    let mut model: order::ActiveModel = existing_order.into();
    apply_order_fields(&mut model, input);
    model.updated_at = Set(now);
    let order = model.update(&txn).await?;
    let samples = samples_of(&txn, order_id).await?;

    txn.commit().await?;
    info!(order_id, samples = samples.len(), "Order updated");
    Ok(OrderWithSamples { order, samples })
}

/// Deletes an order with its samples and tracking rows.
///
/// # Errors
/// Returns `Error::Validation` while a proforma invoice references the order.
#[instrument(skip(db))]
pub async fn delete_order(db: &DatabaseConnection, order_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;

    let invoices = PiHantaran::find()
        .filter(pi_hantaran::Column::OrderId.eq(order_id))
        .count(&txn)
        .await?
        + PiShipment::find()
            .filter(pi_shipment::Column::OrderId.eq(order_id))
            .count(&txn)
            .await?;
    if invoices > 0 {
        return Err(Error::validation(format!(
            "Order has {invoices} proforma invoice(s) and cannot be deleted"
        )));
    }

    let sample_ids: Vec<i64> = samples_of(&txn, order_id)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    if !sample_ids.is_empty() {
        TrackingSample::delete_many()
            .filter(tracking_sample::Column::SampleId.is_in(sample_ids))
            .exec(&txn)
            .await?;
    }
    Sample::delete_many()
        .filter(sample::Column::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    Order::delete_by_id(order_id).exec(&txn).await?;

    txn.commit().await?;
    info!(order_id, "Order deleted");
    Ok(())
}

/// Number of orders per intake form.
pub async fn count_by_form_type(db: &DatabaseConnection) -> Result<HashMap<FormType, u64>> {
    let mut counts = HashMap::new();
    for form_type in [FormType::Rs1, FormType::Rs2] {
        let count = Order::find()
            .filter(order::Column::FormType.eq(form_type.as_str()))
            .count(db)
            .await?;
        counts.insert(form_type, count);
    }
    Ok(counts)
}
