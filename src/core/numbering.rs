//! Document numbering - order numbers, sample codes and proforma numbers.
//!
//! Every number has the shape `<PREFIX>/<YYYY>/<NNNN>`. The next sequence is the
//! largest numeric suffix already used for that prefix and year plus one, so
//! numbering restarts each year and survives gaps left by deleted documents.

use crate::{
    core::order::FormType,
    entities::{Order, PiHantaran, PiShipment, order, pi_hantaran, pi_shipment},
    errors::Result,
};
use sea_orm::{QuerySelect, prelude::*};

/// Kind of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    /// Order submitted on the given intake form
    Order(FormType),
    /// PI Hantaran proforma
    Hantaran,
    /// PI Shipment proforma
    Shipment,
}

impl NumberKind {
    /// Prefix printed in front of the year.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Order(form_type) => form_type.as_str(),
            Self::Hantaran => "PIH",
            Self::Shipment => "PIS",
        }
    }
}

/// Returns the sequence that follows the highest one in `existing` for
/// `prefix` and `year`. Numbers with another prefix or year, or with a suffix
/// that is not numeric, are ignored.
pub fn next_sequence<'a, I>(existing: I, prefix: &str, year: i32) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let scope = format!("{prefix}/{year}/");
    existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(&scope))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

/// Formats a number, zero-padding the sequence to four digits.
#[must_use]
pub fn format_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{prefix}/{year}/{sequence:04}")
}

/// Label code of the `position`-th (1-based) sample of an order.
#[must_use]
pub fn sample_code(order_number: &str, position: usize) -> String {
    format!("{order_number}-{position:02}")
}

/// Position encoded in a sample code, if it was produced by [`sample_code`].
#[must_use]
pub fn sample_position(order_number: &str, code: &str) -> Option<usize> {
    code.strip_prefix(order_number)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

/// Computes the next free number of `kind` for `year` from the owning table.
pub async fn next_number<C>(db: &C, kind: NumberKind, year: i32) -> Result<String>
where
    C: ConnectionTrait,
{
    let prefix = kind.prefix();
    let scope = format!("{prefix}/{year}/");

    let existing: Vec<String> = match kind {
        NumberKind::Order(_) => {
            Order::find()
                .select_only()
                .column(order::Column::OrderNumber)
                .filter(order::Column::OrderNumber.starts_with(&scope))
                .into_tuple()
                .all(db)
                .await?
        }
        NumberKind::Hantaran => {
            PiHantaran::find()
                .select_only()
                .column(pi_hantaran::Column::InvoiceNumber)
                .filter(pi_hantaran::Column::InvoiceNumber.starts_with(&scope))
                .into_tuple()
                .all(db)
                .await?
        }
        NumberKind::Shipment => {
            PiShipment::find()
                .select_only()
                .column(pi_shipment::Column::InvoiceNumber)
                .filter(pi_shipment::Column::InvoiceNumber.starts_with(&scope))
                .into_tuple()
                .all(db)
                .await?
        }
    };

    let sequence = next_sequence(existing.iter().map(String::as_str), prefix, year);
    Ok(format_number(prefix, year, sequence))
}
