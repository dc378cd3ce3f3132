//! Proforma invoices - PI Hantaran for hand-delivered (RS1) orders and
//! PI Shipment for courier-shipped (RS2) orders.
//!
//! Lines are built from the order's samples and stored as a JSON snapshot, so
//! later edits to the order do not change an issued proforma.

use crate::{
    core::{
        numbering::{NumberKind, next_number},
        order::{FormType, clean},
    },
    entities::{Order, PiHantaran, PiShipment, Sample, order, pi_hantaran, pi_shipment, sample},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// One billed line of a proforma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: i32,
    pub unit: String,
    pub unit_price: f64,
    pub amount: f64,
}

/// Money amounts of a proforma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount: f64,
    /// Percent
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub shipping_cost: f64,
    pub total: f64,
}

/// Header fields shared by both proforma kinds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProformaInput {
    pub order_id: i64,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub bill_to: Option<String>,
    #[serde(default)]
    pub discount: Option<f64>,
    /// Percent; the configured default applies when absent
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub type HantaranInput = ProformaInput;

/// PI Shipment request: the shared header plus the shipment fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentInput {
    #[serde(flatten)]
    pub proforma: ProformaInput,
    /// Defaults to the courier recorded on the order
    #[serde(default)]
    pub courier: Option<String>,
    pub destination: String,
    #[serde(default)]
    pub shipping_cost: f64,
}

/// Totals of one business line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LineSummary {
    pub count: u64,
    pub total_billed: f64,
}

/// Proforma totals per business line, for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct InvoiceSummary {
    pub hantaran: LineSummary,
    pub shipment: LineSummary,
}

/// Rounds half away from zero to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Billing lines for `samples`, one per sample.
#[must_use]
pub fn lines_for_samples(samples: &[sample::Model]) -> Vec<InvoiceLine> {
    samples
        .iter()
        .map(|sample| {
            let parameters = sample.parameters.trim();
            let description = if parameters.is_empty() {
                sample.name.clone()
            } else {
                format!("{} - {parameters}", sample.name)
            };
            InvoiceLine {
                description,
                quantity: sample.quantity,
                unit: sample.unit.clone(),
                unit_price: sample.unit_price,
                amount: round2(f64::from(sample.quantity) * sample.unit_price),
            }
        })
        .collect()
}

fn non_negative(amount: f64) -> Result<f64> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount { amount })
    }
}

/// Computes the totals of a proforma.
///
/// Tax is charged on the discounted subtotal; shipping is not taxed.
///
/// # Errors
/// Returns `Error::InvalidAmount` for negative or non-finite amounts, and
/// `Error::Validation` when the discount exceeds the subtotal or the tax rate
/// is above 100 percent.
pub fn compute_totals(
    lines: &[InvoiceLine],
    discount: f64,
    tax_rate: f64,
    shipping_cost: f64,
) -> Result<InvoiceTotals> {
    let subtotal = round2(lines.iter().map(|l| l.amount).sum());
    let discount = round2(non_negative(discount)?);
    let tax_rate = non_negative(tax_rate)?;
    let shipping_cost = round2(non_negative(shipping_cost)?);

    if discount > subtotal {
        return Err(Error::validation(format!(
            "Discount {discount:.2} exceeds the subtotal {subtotal:.2}"
        )));
    }
    if tax_rate > 100.0 {
        return Err(Error::validation(format!(
            "Tax rate {tax_rate}% must be between 0 and 100"
        )));
    }

    let tax_amount = round2((subtotal - discount) * tax_rate / 100.0);
    let total = round2(subtotal - discount + shipping_cost + tax_amount);
    if !total.is_finite() {
        return Err(Error::InvalidAmount { amount: total });
    }
    Ok(InvoiceTotals {
        subtotal,
        discount,
        tax_rate,
        tax_amount,
        shipping_cost,
        total,
    })
}

/// Reads the line snapshot stored on a proforma.
pub fn parse_items(items: &str) -> Result<Vec<InvoiceLine>> {
    serde_json::from_str(items).map_err(Into::into)
}

/// Everything both proforma kinds compute before inserting.
struct Draft {
    order: order::Model,
    items: String,
    totals: InvoiceTotals,
    bill_to: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    notes: Option<String>,
}

async fn draft<C>(
    db: &C,
    expected: FormType,
    input: ProformaInput,
    shipping_cost: f64,
    default_tax_rate: f64,
) -> Result<Draft>
where
    C: ConnectionTrait,
{
    let order = Order::find_by_id(input.order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", input.order_id))?;
    if order.form_type != expected.as_str() {
        return Err(Error::validation(format!(
            "Order {} is an {} order, this proforma requires {expected}",
            order.order_number, order.form_type
        )));
    }

    let samples = Sample::find()
        .filter(sample::Column::OrderId.eq(order.id))
        .order_by_asc(sample::Column::Id)
        .all(db)
        .await?;
    if samples.is_empty() {
        return Err(Error::validation(format!(
            "Order {} has no samples to bill",
            order.order_number
        )));
    }

    let issue_date = input.issue_date.unwrap_or_else(|| Utc::now().date_naive());
    if let Some(due_date) = input.due_date {
        if due_date < issue_date {
            return Err(Error::validation(format!(
                "Due date {due_date} is before the issue date {issue_date}"
            )));
        }
    }

    let lines = lines_for_samples(&samples);
    let totals = compute_totals(
        &lines,
        input.discount.unwrap_or(0.0),
        input.tax_rate.unwrap_or(default_tax_rate),
        shipping_cost,
    )?;
    let bill_to = clean(input.bill_to).unwrap_or_else(|| match &order.company_name {
        Some(company) => format!("{} ({company})", order.client_name),
        None => order.client_name.clone(),
    });

    Ok(Draft {
        items: serde_json::to_string(&lines)?,
        order,
        totals,
        bill_to,
        issue_date,
        due_date: input.due_date,
        notes: clean(input.notes),
    })
}

/// Issues a PI Hantaran for an RS1 order.
///
/// # Errors
/// Returns `Error::NotFound` for an unknown order and `Error::Validation` when
/// the order is not RS1, has no samples, or the dates or amounts are invalid.
#[instrument(skip(db, input), fields(order_id = input.order_id))]
pub async fn create_hantaran(
    db: &DatabaseConnection,
    input: HantaranInput,
    created_by: Option<i64>,
    default_tax_rate: f64,
) -> Result<pi_hantaran::Model> {
    let txn = db.begin().await?;
    let draft = draft(&txn, FormType::Rs1, input, 0.0, default_tax_rate).await?;
    let invoice_number = next_number(&txn, NumberKind::Hantaran, draft.issue_date.year()).await?;

    let invoice = pi_hantaran::ActiveModel {
        invoice_number: Set(invoice_number),
        order_id: Set(draft.order.id),
        issue_date: Set(draft.issue_date),
        due_date: Set(draft.due_date),
        bill_to: Set(draft.bill_to),
        items: Set(draft.items),
        subtotal: Set(draft.totals.subtotal),
        discount: Set(draft.totals.discount),
        tax_rate: Set(draft.totals.tax_rate),
        tax_amount: Set(draft.totals.tax_amount),
        total: Set(draft.totals.total),
        notes: Set(draft.notes),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        invoice_number = %invoice.invoice_number,
        total = invoice.total,
        "PI Hantaran issued"
    );
    Ok(invoice)
}

/// Issues a PI Shipment for an RS2 order.
///
/// # Errors
/// Returns `Error::NotFound` for an unknown order and `Error::Validation` when
/// the order is not RS2, no courier is known, the destination is blank, or the
/// dates or amounts are invalid.
#[instrument(skip(db, input), fields(order_id = input.proforma.order_id))]
pub async fn create_shipment(
    db: &DatabaseConnection,
    input: ShipmentInput,
    created_by: Option<i64>,
    default_tax_rate: f64,
) -> Result<pi_shipment::Model> {
    let destination = input.destination.trim().to_string();
    if destination.is_empty() {
        return Err(Error::validation("Destination cannot be empty"));
    }

    let txn = db.begin().await?;
    let draft = draft(
        &txn,
        FormType::Rs2,
        input.proforma,
        input.shipping_cost,
        default_tax_rate,
    )
    .await?;
    let courier = clean(input.courier)
        .or_else(|| clean(draft.order.courier.clone()))
        .ok_or_else(|| Error::validation("Courier is required"))?;
    let invoice_number = next_number(&txn, NumberKind::Shipment, draft.issue_date.year()).await?;

    let invoice = pi_shipment::ActiveModel {
        invoice_number: Set(invoice_number),
        order_id: Set(draft.order.id),
        issue_date: Set(draft.issue_date),
        due_date: Set(draft.due_date),
        bill_to: Set(draft.bill_to),
        courier: Set(courier),
        destination: Set(destination),
        shipping_cost: Set(draft.totals.shipping_cost),
        items: Set(draft.items),
        subtotal: Set(draft.totals.subtotal),
        discount: Set(draft.totals.discount),
        tax_rate: Set(draft.totals.tax_rate),
        tax_amount: Set(draft.totals.tax_amount),
        total: Set(draft.totals.total),
        notes: Set(draft.notes),
        created_by: Set(created_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(
        invoice_number = %invoice.invoice_number,
        total = invoice.total,
        "PI Shipment issued"
    );
    Ok(invoice)
}

pub async fn list_hantaran(db: &DatabaseConnection) -> Result<Vec<pi_hantaran::Model>> {
    PiHantaran::find()
        .order_by_desc(pi_hantaran::Column::CreatedAt)
        .order_by_desc(pi_hantaran::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_hantaran(db: &DatabaseConnection, id: i64) -> Result<pi_hantaran::Model> {
    PiHantaran::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("PI Hantaran", id))
}

#[instrument(skip(db))]
pub async fn delete_hantaran(db: &DatabaseConnection, id: i64) -> Result<()> {
    let result = PiHantaran::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("PI Hantaran", id));
    }
    info!(id, "PI Hantaran deleted");
    Ok(())
}

pub async fn list_shipments(db: &DatabaseConnection) -> Result<Vec<pi_shipment::Model>> {
    PiShipment::find()
        .order_by_desc(pi_shipment::Column::CreatedAt)
        .order_by_desc(pi_shipment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_shipment(db: &DatabaseConnection, id: i64) -> Result<pi_shipment::Model> {
    PiShipment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("PI Shipment", id))
}

#[instrument(skip(db))]
pub async fn delete_shipment(db: &DatabaseConnection, id: i64) -> Result<()> {
    let result = PiShipment::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("PI Shipment", id));
    }
    info!(id, "PI Shipment deleted");
    Ok(())
}

/// Number the next PI Hantaran of `year` would get. Nothing is reserved.
pub async fn next_hantaran_number(db: &DatabaseConnection, year: i32) -> Result<String> {
    next_number(db, NumberKind::Hantaran, year).await
}

/// Number the next PI Shipment of `year` would get. Nothing is reserved.
pub async fn next_shipment_number(db: &DatabaseConnection, year: i32) -> Result<String> {
    next_number(db, NumberKind::Shipment, year).await
}

fn summarize(totals: &[f64]) -> LineSummary {
    LineSummary {
        count: totals.len() as u64,
        total_billed: round2(totals.iter().sum()),
    }
}

/// Count and billed total of each business line.
pub async fn summary(db: &DatabaseConnection) -> Result<InvoiceSummary> {
    let hantaran: Vec<f64> = PiHantaran::find()
        .select_only()
        .column(pi_hantaran::Column::Total)
        .into_tuple()
        .all(db)
        .await?;
    let shipment: Vec<f64> = PiShipment::find()
        .select_only()
        .column(pi_shipment::Column::Total)
        .into_tuple()
        .all(db)
        .await?;
    Ok(InvoiceSummary {
        hantaran: summarize(&hantaran),
        shipment: summarize(&shipment),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    fn line(amount: f64) -> InvoiceLine {
        InvoiceLine {
            description: "Soil".to_string(),
            quantity: 1,
            unit: "pcs".to_string(),
            unit_price: amount,
            amount,
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(-2.345_000_1), -2.35);
    }

    #[test]
    fn test_lines_for_samples_describe_parameters() {
        let samples = vec![
            sample_model(1, "Soil A", 3, 12_500.5, "pH, N"),
            sample_model(2, "Water", 1, 50_000.0, "  "),
        ];
        let lines = lines_for_samples(&samples);
        assert_eq!(lines[0].description, "Soil A - pH, N");
        assert_eq!(lines[0].amount, 37_501.5);
        assert_eq!(lines[1].description, "Water");
        assert_eq!(lines[1].amount, 50_000.0);
    }

    #[test]
    fn test_compute_totals() {
        let lines = [line(100_000.0), line(50_000.0)];
        let totals = compute_totals(&lines, 10_000.0, 11.0, 25_000.0).unwrap();
        assert_eq!(totals.subtotal, 150_000.0);
        assert_eq!(totals.tax_amount, 15_400.0);
        assert_eq!(totals.total, 150_000.0 - 10_000.0 + 25_000.0 + 15_400.0);
    }

    #[test]
    fn test_compute_totals_rejects_bad_amounts() {
        let lines = [line(100.0)];
        assert!(matches!(
            compute_totals(&lines, 100.01, 11.0, 0.0),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            compute_totals(&lines, 0.0, 100.5, 0.0),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            compute_totals(&lines, -1.0, 11.0, 0.0),
            Err(Error::InvalidAmount { .. })
        ));
        assert!(matches!(
            compute_totals(&lines, 0.0, 11.0, f64::NAN),
            Err(Error::InvalidAmount { .. })
        ));
        // Full discount and zero tax are both allowed
        let free = compute_totals(&lines, 100.0, 0.0, 0.0).unwrap();
        assert_eq!(free.total, 0.0);
    }

    #[tokio::test]
    async fn test_create_hantaran_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order(&db, FormType::Rs1).await?;
        let issue_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let invoice = create_hantaran(
            &db,
            HantaranInput {
                order_id: order.order.id,
                issue_date: Some(issue_date),
                due_date: NaiveDate::from_ymd_opt(2026, 3, 16),
                ..Default::default()
            },
            None,
            11.0,
        )
        .await?;

        assert_eq!(invoice.invoice_number, "PIH/2026/0001");
        assert_eq!(invoice.issue_date, issue_date);
        assert_eq!(invoice.bill_to, order.order.client_name);
        assert_eq!(invoice.tax_rate, 11.0);
        let items = parse_items(&invoice.items)?;
        assert_eq!(items.len(), order.samples.len());
        let expected = compute_totals(&items, 0.0, 11.0, 0.0)?;
        assert_eq!(invoice.total, expected.total);

        assert_eq!(next_hantaran_number(&db, 2026).await?, "PIH/2026/0002");
        assert_eq!(next_hantaran_number(&db, 2027).await?, "PIH/2027/0001");
        assert_eq!(list_hantaran(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_hantaran_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let rs2 = create_test_order(&db, FormType::Rs2).await?;
        let rs1 = create_test_order(&db, FormType::Rs1).await?;

        let wrong_form = create_hantaran(
            &db,
            HantaranInput {
                order_id: rs2.order.id,
                ..Default::default()
            },
            None,
            11.0,
        )
        .await;
        assert!(matches!(wrong_form.unwrap_err(), Error::Validation { .. }));

        let due_before_issue = create_hantaran(
            &db,
            HantaranInput {
                order_id: rs1.order.id,
                issue_date: NaiveDate::from_ymd_opt(2026, 3, 2),
                due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                ..Default::default()
            },
            None,
            11.0,
        )
        .await;
        assert!(matches!(
            due_before_issue.unwrap_err(),
            Error::Validation { .. }
        ));

        let missing = create_hantaran(
            &db,
            HantaranInput {
                order_id: 999,
                ..Default::default()
            },
            None,
            11.0,
        )
        .await;
        assert!(matches!(missing.unwrap_err(), Error::NotFound { .. }));
        assert!(list_hantaran(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_shipment_integration() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order(&db, FormType::Rs2).await?;

        let invoice = create_shipment(
            &db,
            ShipmentInput {
                proforma: ProformaInput {
                    order_id: order.order.id,
                    tax_rate: Some(0.0),
                    bill_to: Some("Finance Dept".to_string()),
                    ..Default::default()
                },
                courier: None,
                destination: "Medan".to_string(),
                shipping_cost: 45_000.0,
            },
            None,
            11.0,
        )
        .await?;

        assert!(invoice.invoice_number.starts_with("PIS/"));
        assert_eq!(invoice.courier, "JNE");
        assert_eq!(invoice.bill_to, "Finance Dept");
        assert_eq!(invoice.tax_amount, 0.0);
        assert_eq!(invoice.total, invoice.subtotal + 45_000.0);
        assert_eq!(
            get_shipment(&db, invoice.id).await?.invoice_number,
            invoice.invoice_number
        );

        let blank_destination = create_shipment(
            &db,
            ShipmentInput {
                proforma: ProformaInput {
                    order_id: order.order.id,
                    ..Default::default()
                },
                destination: "  ".to_string(),
                ..Default::default()
            },
            None,
            11.0,
        )
        .await;
        assert!(matches!(
            blank_destination.unwrap_err(),
            Error::Validation { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_and_summary() -> Result<()> {
        let db = setup_test_db().await?;
        let rs1 = create_test_order(&db, FormType::Rs1).await?;
        let rs2 = create_test_order(&db, FormType::Rs2).await?;

        let hantaran = create_hantaran(
            &db,
            HantaranInput {
                order_id: rs1.order.id,
                ..Default::default()
            },
            None,
            11.0,
        )
        .await?;
        let shipment = create_shipment(
            &db,
            ShipmentInput {
                proforma: ProformaInput {
                    order_id: rs2.order.id,
                    ..Default::default()
                },
                courier: Some("TIKI".to_string()),
                destination: "Medan".to_string(),
                shipping_cost: 10_000.0,
            },
            None,
            11.0,
        )
        .await?;
        assert_eq!(shipment.courier, "TIKI");

        let totals = summary(&db).await?;
        assert_eq!(totals.hantaran.count, 1);
        assert_eq!(totals.hantaran.total_billed, hantaran.total);
        assert_eq!(totals.shipment.total_billed, shipment.total);

        delete_hantaran(&db, hantaran.id).await?;
        assert!(matches!(
            get_hantaran(&db, hantaran.id).await.unwrap_err(),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            delete_hantaran(&db, hantaran.id).await.unwrap_err(),
            Error::NotFound { .. }
        ));
        delete_shipment(&db, shipment.id).await?;
        assert_eq!(summary(&db).await?, InvoiceSummary::default());
        Ok(())
    }
}
