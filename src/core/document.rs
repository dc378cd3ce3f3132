//! Printable proforma documents.
//!
//! A stored proforma is turned into an [`InvoiceDocument`], laid out on A4
//! pages and rendered to PDF with the built-in Helvetica fonts.

use crate::{
    core::invoice::{InvoiceLine, parse_items},
    entities::{order, pi_hantaran, pi_shipment},
    errors::{Error, Result},
};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::fmt;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const TOP: f32 = 277.0;
const BOTTOM: f32 = 25.0;
const ROW_HEIGHT: f32 = 6.0;
const DESCRIPTION_WIDTH: usize = 46;
const NOTES_WIDTH: usize = 90;

// Table columns, x in mm
const COL_NO: f32 = MARGIN_LEFT;
const COL_DESCRIPTION: f32 = 28.0;
const COL_QUANTITY: f32 = 118.0;
const COL_UNIT: f32 = 130.0;
const COL_UNIT_PRICE: f32 = 145.0;
const COL_AMOUNT: f32 = 172.0;
const COL_TOTAL_LABEL: f32 = 130.0;

/// Content of a printable proforma.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub title: String,
    pub number: String,
    /// Labelled header fields, printed in order
    pub fields: Vec<(String, String)>,
    pub lines: Vec<InvoiceLine>,
    /// Labelled totals, printed under the table
    pub totals: Vec<(String, f64)>,
    pub notes: Option<String>,
}

impl InvoiceDocument {
    /// Builds the document of a PI Hantaran.
    pub fn from_hantaran(invoice: &pi_hantaran::Model, order: &order::Model) -> Result<Self> {
        let mut fields = vec![
            ("Bill to".to_string(), invoice.bill_to.clone()),
            ("Order".to_string(), order.order_number.clone()),
            ("Issue date".to_string(), invoice.issue_date.to_string()),
        ];
        if let Some(due_date) = invoice.due_date {
            fields.push(("Due date".to_string(), due_date.to_string()));
        }

        Ok(Self {
            title: "PROFORMA INVOICE - HANTARAN".to_string(),
            number: invoice.invoice_number.clone(),
            fields,
            lines: parse_items(&invoice.items)?,
            totals: vec![
                ("Subtotal".to_string(), invoice.subtotal),
                ("Discount".to_string(), -invoice.discount),
                (format!("Tax ({}%)", invoice.tax_rate), invoice.tax_amount),
                ("Total".to_string(), invoice.total),
            ],
            notes: invoice.notes.clone(),
        })
    }

    /// Builds the document of a PI Shipment.
    pub fn from_shipment(invoice: &pi_shipment::Model, order: &order::Model) -> Result<Self> {
        let mut fields = vec![
            ("Bill to".to_string(), invoice.bill_to.clone()),
            ("Order".to_string(), order.order_number.clone()),
            ("Issue date".to_string(), invoice.issue_date.to_string()),
        ];
        if let Some(due_date) = invoice.due_date {
            fields.push(("Due date".to_string(), due_date.to_string()));
        }
        fields.push(("Courier".to_string(), invoice.courier.clone()));
        fields.push(("Destination".to_string(), invoice.destination.clone()));

        Ok(Self {
            title: "PROFORMA INVOICE - SHIPMENT".to_string(),
            number: invoice.invoice_number.clone(),
            fields,
            lines: parse_items(&invoice.items)?,
            totals: vec![
                ("Subtotal".to_string(), invoice.subtotal),
                ("Discount".to_string(), -invoice.discount),
                ("Shipping".to_string(), invoice.shipping_cost),
                (format!("Tax ({}%)", invoice.tax_rate), invoice.tax_amount),
                ("Total".to_string(), invoice.total),
            ],
            notes: invoice.notes.clone(),
        })
    }

    /// Download name, e.g. `PIH-2026-0001.pdf`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.number.replace('/', "-"))
    }

    /// Renders the document as a PDF.
    ///
    /// # Errors
    /// Returns `Error::Document` if the PDF cannot be assembled.
    pub fn render_pdf(&self) -> Result<Vec<u8>> {
        let pages = self.layout();
        let (doc, first_page, first_layer) = PdfDocument::new(
            self.number.clone(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(document_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(document_error)?;

        let mut targets = vec![(first_page, first_layer)];
        for number in 2..=pages.len() {
            targets.push(doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Layer {number}"),
            ));
        }

        for ((page, layer), items) in targets.into_iter().zip(&pages) {
            let layer = doc.get_page(page).get_layer(layer);
            for item in items {
                let font = if item.bold { &bold } else { &regular };
                layer.use_text(item.text.clone(), item.size, Mm(item.x), Mm(item.y), font);
            }
        }

        doc.save_to_bytes().map_err(document_error)
    }

    /// Positions every piece of text, page by page.
    fn layout(&self) -> Vec<Vec<TextItem>> {
        let mut pages = PageBuilder::new();

        pages.text(MARGIN_LEFT, 16.0, true, &self.title);
        pages.advance(8.0);
        pages.text(MARGIN_LEFT, 11.0, true, &format!("No. {}", self.number));
        pages.advance(10.0);

        for (label, value) in &self.fields {
            pages.text(MARGIN_LEFT, 10.0, false, label);
            pages.text(55.0, 10.0, false, &format!(": {value}"));
            pages.advance(ROW_HEIGHT);
        }
        pages.advance(4.0);

        pages.table_header();
        for (index, line) in self.lines.iter().enumerate() {
            if pages.remaining() < ROW_HEIGHT {
                pages.new_page();
                pages.table_header();
            }
            pages.text(COL_NO, 9.0, false, &(index + 1).to_string());
            pages.text(
                COL_DESCRIPTION,
                9.0,
                false,
                &truncate(&line.description, DESCRIPTION_WIDTH),
            );
            pages.text(COL_QUANTITY, 9.0, false, &line.quantity.to_string());
            pages.text(COL_UNIT, 9.0, false, &line.unit);
            pages.text(COL_UNIT_PRICE, 9.0, false, &format_money(line.unit_price));
            pages.text(COL_AMOUNT, 9.0, false, &format_money(line.amount));
            pages.advance(ROW_HEIGHT);
        }
        pages.advance(4.0);

        let totals_height = ROW_HEIGHT * self.totals.len() as f32;
        if pages.remaining() < totals_height {
            pages.new_page();
        }
        let last = self.totals.len().saturating_sub(1);
        for (index, (label, amount)) in self.totals.iter().enumerate() {
            let bold = index == last;
            pages.text(COL_TOTAL_LABEL, 10.0, bold, label);
            pages.text(COL_AMOUNT, 10.0, bold, &format_money(*amount));
            pages.advance(ROW_HEIGHT);
        }

        if let Some(notes) = &self.notes {
            pages.advance(4.0);
            if pages.remaining() < ROW_HEIGHT * 2.0 {
                pages.new_page();
            }
            pages.text(MARGIN_LEFT, 9.0, true, "Notes");
            pages.advance(ROW_HEIGHT);
            for line in wrap(notes, NOTES_WIDTH) {
                if pages.remaining() < ROW_HEIGHT {
                    pages.new_page();
                }
                pages.text(MARGIN_LEFT, 9.0, false, &line);
                pages.advance(ROW_HEIGHT);
            }
        }

        pages.finish()
    }
}

impl fmt::Display for InvoiceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.title, self.number)
    }
}

/// A piece of text placed on a page. Coordinates are in mm from the bottom left.
#[derive(Debug, Clone, PartialEq)]
struct TextItem {
    x: f32,
    y: f32,
    size: f32,
    bold: bool,
    text: String,
}

/// Cursor that moves down the page and opens new pages.
struct PageBuilder {
    pages: Vec<Vec<TextItem>>,
    y: f32,
}

impl PageBuilder {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: TOP,
        }
    }

    fn text(&mut self, x: f32, size: f32, bold: bool, text: &str) {
        let item = TextItem {
            x,
            y: self.y,
            size,
            bold,
            text: printable(text),
        };
        if let Some(page) = self.pages.last_mut() {
            page.push(item);
        }
    }

    fn advance(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn remaining(&self) -> f32 {
        self.y - BOTTOM
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = TOP;
    }

    fn table_header(&mut self) {
        for (x, label) in [
            (COL_NO, "No"),
            (COL_DESCRIPTION, "Description"),
            (COL_QUANTITY, "Qty"),
            (COL_UNIT, "Unit"),
            (COL_UNIT_PRICE, "Unit price"),
            (COL_AMOUNT, "Amount"),
        ] {
            self.text(x, 9.0, true, label);
        }
        self.advance(ROW_HEIGHT);
    }

    fn finish(self) -> Vec<Vec<TextItem>> {
        self.pages
    }
}

fn document_error(err: impl fmt::Display) -> Error {
    Error::Document(err.to_string())
}

/// The built-in PDF fonts only cover Latin-1; anything else prints as `?`.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

/// Breaks text into lines of at most `max_chars`, on word boundaries where
/// possible. Line breaks in the text are kept.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0;
        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(max_chars.max(1)) {
                if line_len > 0 && line_len + 1 + chunk.len() > max_chars {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                if line_len > 0 {
                    line.push(' ');
                    line_len += 1;
                }
                line.extend(chunk);
                line_len += chunk.len();
            }
        }
        lines.push(line);
    }
    lines
}

/// Formats an amount the Indonesian way: `.` between thousands and a decimal
/// comma, e.g. `1.234.567,50`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{fraction:02}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp, clippy::cast_precision_loss)]
    use super::*;
    use crate::test_utils::*;

    fn document_with_lines(count: usize) -> InvoiceDocument {
        InvoiceDocument {
            title: "PROFORMA INVOICE - HANTARAN".to_string(),
            number: "PIH/2026/0001".to_string(),
            fields: vec![("Bill to".to_string(), "Budi".to_string())],
            lines: (0..count)
                .map(|i| InvoiceLine {
                    description: format!("Sample {i} - pH, N, P, K"),
                    quantity: 1,
                    unit: "pcs".to_string(),
                    unit_price: 150_000.0,
                    amount: 150_000.0,
                })
                .collect(),
            totals: vec![("Total".to_string(), 150_000.0 * count as f64)],
            notes: Some("Payment by transfer".to_string()),
        }
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0,00");
        assert_eq!(format_money(999.5), "999,50");
        assert_eq!(format_money(1_000.0), "1.000,00");
        assert_eq!(format_money(1_234_567.5), "1.234.567,50");
        assert_eq!(format_money(-15_400.0), "-15.400,00");
        assert_eq!(format_money(-0.001), "0,00");
    }

    #[test]
    fn test_truncate_and_printable() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(printable("Café"), "Caf?");
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("pay by transfer", 8), vec!["pay by", "transfer"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("first\n\nthird", 20), vec!["first", "", "third"]);
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn test_layout_keeps_long_notes() {
        let word_count = 400;
        let notes = (0..word_count)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let mut document = document_with_lines(30);
        document.notes = Some(notes);

        let pages = document.layout();
        let note_lines: Vec<&TextItem> = pages
            .iter()
            .flatten()
            .filter(|t| t.text.starts_with("word"))
            .collect();
        assert!(note_lines.len() > 1);
        assert!(note_lines.iter().all(|t| t.text.chars().count() <= NOTES_WIDTH));
        let words: usize = note_lines
            .iter()
            .map(|t| t.text.split_whitespace().count())
            .sum();
        assert_eq!(words, word_count);
        assert!(pages.iter().flatten().all(|t| t.y >= BOTTOM));
        assert!(pages.last().unwrap().iter().any(|t| t.text.ends_with("word399")));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(document_with_lines(1).file_name(), "PIH-2026-0001.pdf");
    }

    #[test]
    fn test_layout_single_page() {
        let pages = document_with_lines(3).layout();
        assert_eq!(pages.len(), 1);
        let texts: Vec<&str> = pages[0].iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"No. PIH/2026/0001"));
        assert!(texts.contains(&"450.000,00"));
        assert!(pages[0].iter().all(|t| t.y >= BOTTOM));
    }

    #[test]
    fn test_layout_flows_onto_more_pages() {
        let pages = document_with_lines(80).layout();
        assert!(pages.len() > 1);
        // Every page with lines repeats the table header
        for page in &pages[1..] {
            if page.iter().any(|t| t.text.starts_with("Sample ")) {
                assert!(page.iter().any(|t| t.text == "Description" && t.bold));
            }
        }
        assert!(pages.iter().flatten().all(|t| t.y >= BOTTOM));
        let rows = pages
            .iter()
            .flatten()
            .filter(|t| t.x == COL_DESCRIPTION && t.text.starts_with("Sample "))
            .count();
        assert_eq!(rows, 80);
    }

    #[test]
    fn test_render_pdf() {
        let bytes = document_with_lines(60).render_pdf().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_from_stored_proformas() -> Result<()> {
        use crate::core::{
            invoice::{HantaranInput, ProformaInput, ShipmentInput, create_hantaran, create_shipment},
            order::FormType,
        };
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
        let document = InvoiceDocument::from_hantaran(&hantaran, &rs1.order)?;
        assert_eq!(document.number, hantaran.invoice_number);
        assert_eq!(document.lines.len(), rs1.samples.len());
        assert_eq!(document.totals.last().unwrap().1, hantaran.total);

        let shipment = create_shipment(
            &db,
            ShipmentInput {
                proforma: ProformaInput {
                    order_id: rs2.order.id,
                    ..Default::default()
                },
                destination: "Medan".to_string(),
                shipping_cost: 20_000.0,
                ..Default::default()
            },
            None,
            11.0,
        )
        .await?;
        let document = InvoiceDocument::from_shipment(&shipment, &rs2.order)?;
        assert!(document.fields.iter().any(|(label, value)| label == "Courier" && value == "JNE"));
        assert!(document.totals.iter().any(|(label, _)| label == "Shipping"));
        assert!(document.render_pdf()?.starts_with(b"%PDF"));
        Ok(())
    }
}
