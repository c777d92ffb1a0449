use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat tax applied on top of the subtotal.
pub const TAX_RATE: f64 = 0.10;

// parseInt / parseFloat style prefixes: leading sign and digits, trailing junk ignored
static LEADING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[+-]?\d+").expect("valid integer pattern"));
static LEADING_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid decimal pattern")
});

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BillTo {
    pub name: String,
    pub address: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32, // never below 1
    pub price: f64,    // never below 0
}

impl LineItem {
    pub fn blank() -> Self {
        LineItem {
            description: String::new(),
            quantity: 1,
            price: 0.0,
        }
    }

    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }

    /// A row counts as complete once it has a description and a positive price.
    pub fn is_complete(&self) -> bool {
        !self.description.trim().is_empty() && self.price > 0.0
    }
}

/// Display-only summary of a selected logo. Never sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoPreview {
    pub file_name: String,
    pub byte_len: usize,
    pub media_type: &'static str,
}

impl fmt::Display for LogoPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {:.1} KB)",
            self.file_name,
            self.media_type,
            self.byte_len as f64 / 1024.0
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    pub bytes: Vec<u8>,
    pub preview: LogoPreview,
}

impl Logo {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let preview = LogoPreview {
            file_name: file_name.into(),
            byte_len: bytes.len(),
            media_type: sniff_media_type(&bytes),
        };
        Logo { bytes, preview }
    }
}

fn sniff_media_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Editable header and bill-to fields, addressed by their form path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    InvoiceNumber,
    InvoiceDate,
    DueDate,
    BillToName,
    BillToAddress,
    BillToEmail,
    Notes,
}

impl DraftField {
    pub const ALL: [DraftField; 7] = [
        DraftField::InvoiceNumber,
        DraftField::InvoiceDate,
        DraftField::DueDate,
        DraftField::BillToName,
        DraftField::BillToAddress,
        DraftField::BillToEmail,
        DraftField::Notes,
    ];

    pub fn path(self) -> &'static str {
        match self {
            DraftField::InvoiceNumber => "invoiceNumber",
            DraftField::InvoiceDate => "invoiceDate",
            DraftField::DueDate => "dueDate",
            DraftField::BillToName => "billTo.name",
            DraftField::BillToAddress => "billTo.address",
            DraftField::BillToEmail => "billTo.email",
            DraftField::Notes => "notes",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for DraftField {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DraftField::ALL
            .into_iter()
            .find(|field| field.path() == s.trim())
            .ok_or_else(|| DraftError::UnknownField(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Description,
    Quantity,
    Price,
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemField::Description => "Description",
            ItemField::Quantity => "Quantity",
            ItemField::Price => "Price",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Please complete the last item before adding a new one.")]
    IncompleteLastItem,
    #[error("unknown field path '{0}'")]
    UnknownField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTotals {
    pub line_totals: Vec<f64>,
    pub subtotal: f64,
    pub tax: f64,
    pub grand_total: f64,
}

/// The invoice being composed in the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub bill_to: BillTo,
    pub items: Vec<LineItem>,
    pub notes: String,
    pub logo: Option<Logo>,
}

impl InvoiceDraft {
    pub fn new(today: NaiveDate) -> Self {
        InvoiceDraft {
            invoice_number: String::new(),
            invoice_date: Some(today),
            due_date: None,
            bill_to: BillTo::default(),
            items: vec![LineItem::blank()],
            notes: String::new(),
            logo: None,
        }
    }

    /// Replaces one field and leaves every sibling untouched. Values are not
    /// validated here; dates that do not parse as `YYYY-MM-DD` are cleared.
    pub fn set_field(&mut self, field: DraftField, value: &str) {
        match field {
            DraftField::InvoiceNumber => self.invoice_number = value.to_string(),
            DraftField::InvoiceDate => self.invoice_date = parse_date(value),
            DraftField::DueDate => self.due_date = parse_date(value),
            DraftField::BillToName => self.bill_to.name = value.to_string(),
            DraftField::BillToAddress => self.bill_to.address = value.to_string(),
            DraftField::BillToEmail => self.bill_to.email = value.to_string(),
            DraftField::Notes => self.notes = value.to_string(),
        }
        tracing::debug!(field = field.path(), "draft field updated");
    }

    pub fn field_value(&self, field: DraftField) -> String {
        match field {
            DraftField::InvoiceNumber => self.invoice_number.clone(),
            DraftField::InvoiceDate => self.invoice_date.map(|d| d.to_string()).unwrap_or_default(),
            DraftField::DueDate => self.due_date.map(|d| d.to_string()).unwrap_or_default(),
            DraftField::BillToName => self.bill_to.name.clone(),
            DraftField::BillToAddress => self.bill_to.address.clone(),
            DraftField::BillToEmail => self.bill_to.email.clone(),
            DraftField::Notes => self.notes.clone(),
        }
    }

    /// Applies a raw edit to one row. Quantity falls back to 1 and price to 0
    /// when the text is not a number or is below the floor. Unknown rows are
    /// ignored.
    pub fn edit_item(&mut self, index: usize, field: ItemField, raw: &str) {
        let Some(item) = self.items.get_mut(index) else {
            tracing::debug!(index, "ignoring edit for missing item");
            return;
        };
        match field {
            ItemField::Description => item.description = raw.to_string(),
            ItemField::Quantity => item.quantity = coerce_quantity(raw),
            ItemField::Price => item.price = coerce_price(raw),
        }
    }

    pub fn add_item(&mut self) -> Result<(), DraftError> {
        if let Some(last) = self.items.last() {
            if !last.is_complete() {
                return Err(DraftError::IncompleteLastItem);
            }
        }
        self.items.push(LineItem::blank());
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) {
        self.items = std::mem::take(&mut self.items)
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| (i != index).then_some(item))
            .collect();
    }

    /// Replaces the logo and its preview together; `None` clears both.
    pub fn set_logo(&mut self, logo: Option<Logo>) {
        self.logo = logo;
    }

    pub fn compute_totals(&self) -> DerivedTotals {
        let line_totals: Vec<f64> = self.items.iter().map(LineItem::line_total).collect();
        let subtotal: f64 = line_totals.iter().sum();
        let tax = subtotal * TAX_RATE;
        DerivedTotals {
            line_totals,
            subtotal,
            tax,
            grand_total: subtotal + tax,
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn coerce_quantity(raw: &str) -> u32 {
    LEADING_INT
        .find(raw)
        .and_then(|m| m.as_str().trim().parse::<i64>().ok())
        .filter(|q| *q >= 1)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1)
}

fn coerce_price(raw: &str) -> f64 {
    LEADING_DECIMAL
        .find(raw)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p >= 0.0)
        .map(|p| p + 0.0) // -0 becomes +0
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> InvoiceDraft {
        InvoiceDraft::new(NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date"))
    }

    #[test]
    fn new_draft_starts_with_today_and_one_blank_item() {
        let draft = draft();
        assert_eq!(draft.invoice_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(draft.due_date, None);
        assert_eq!(draft.items, vec![LineItem::blank()]);
        assert!(draft.logo.is_none());
    }

    #[test]
    fn set_field_replaces_nested_field_and_keeps_siblings() {
        let mut draft = draft();
        draft.set_field(DraftField::BillToEmail, "a@b.co");
        draft.set_field(DraftField::BillToName, "Acme");
        assert_eq!(draft.bill_to.name, "Acme");
        assert_eq!(draft.bill_to.email, "a@b.co");
        assert_eq!(draft.bill_to.address, "");
    }

    #[test]
    fn field_paths_round_trip_through_from_str() {
        for field in DraftField::ALL {
            assert_eq!(field.path().parse::<DraftField>(), Ok(field));
        }
        assert_eq!(
            "billTo.phone".parse::<DraftField>(),
            Err(DraftError::UnknownField("billTo.phone".to_string()))
        );
    }

    #[test]
    fn unparsable_date_clears_the_field() {
        let mut draft = draft();
        draft.set_field(DraftField::DueDate, "2025-04-01");
        assert_eq!(draft.due_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        draft.set_field(DraftField::DueDate, "next tuesday");
        assert_eq!(draft.due_date, None);
        draft.set_field(DraftField::InvoiceDate, "");
        assert_eq!(draft.invoice_date, None);
    }

    #[test]
    fn quantity_edits_never_drop_below_one() {
        let mut draft = draft();
        for (raw, expected) in [
            ("3", 3),
            ("12abc", 12),
            ("3.7", 3),
            (" 4", 4),
            ("0", 1),
            ("-5", 1),
            ("", 1),
            ("abc", 1),
            ("99999999999999999999", 1),
        ] {
            draft.edit_item(0, ItemField::Quantity, raw);
            assert_eq!(draft.items[0].quantity, expected, "input {raw:?}");
        }
    }

    #[test]
    fn price_edits_never_drop_below_zero() {
        let mut draft = draft();
        for (raw, expected) in [
            ("12.5", 12.5),
            ("0.99usd", 0.99),
            (".5", 0.5),
            ("1e2", 100.0),
            ("-3", 0.0),
            ("", 0.0),
            ("free", 0.0),
            ("1e999", 0.0),
            ("-0", 0.0),
            ("-0.0", 0.0),
        ] {
            draft.edit_item(0, ItemField::Price, raw);
            assert_eq!(draft.items[0].price, expected, "input {raw:?}");
            assert!(draft.items[0].price.is_sign_positive(), "input {raw:?}");
        }
    }

    #[test]
    fn description_is_stored_verbatim() {
        let mut draft = draft();
        draft.edit_item(0, ItemField::Description, "  Design work ");
        assert_eq!(draft.items[0].description, "  Design work ");
    }

    #[test]
    fn edit_out_of_range_is_a_no_op() {
        let mut draft = draft();
        let before = draft.clone();
        draft.edit_item(5, ItemField::Price, "10");
        assert_eq!(draft, before);
    }

    #[test]
    fn add_item_refuses_incomplete_last_row() {
        let mut draft = draft();
        assert_eq!(draft.add_item(), Err(DraftError::IncompleteLastItem));
        assert_eq!(draft.items.len(), 1);

        draft.edit_item(0, ItemField::Description, "Consulting");
        assert_eq!(draft.add_item(), Err(DraftError::IncompleteLastItem));

        draft.edit_item(0, ItemField::Price, "150");
        assert_eq!(draft.add_item(), Ok(()));
        assert_eq!(draft.items.len(), 2);
        assert_eq!(draft.items[1], LineItem::blank());
    }

    #[test]
    fn add_item_on_empty_list_appends() {
        let mut draft = draft();
        draft.remove_item(0);
        assert!(draft.items.is_empty());
        assert_eq!(draft.add_item(), Ok(()));
        assert_eq!(draft.items.len(), 1);
    }

    #[test]
    fn remove_item_keeps_order_of_the_rest() {
        let mut draft = draft();
        draft.items = ["a", "b", "c"]
            .iter()
            .map(|d| LineItem {
                description: d.to_string(),
                quantity: 1,
                price: 1.0,
            })
            .collect();
        draft.remove_item(1);
        let names: Vec<_> = draft.items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        draft.remove_item(9);
        assert_eq!(draft.items.len(), 2);
    }

    #[test]
    fn totals_follow_items() {
        let mut draft = draft();
        draft.items = vec![
            LineItem {
                description: "Hours".into(),
                quantity: 3,
                price: 40.0,
            },
            LineItem {
                description: "Licence".into(),
                quantity: 2,
                price: 12.25,
            },
        ];
        let totals = draft.compute_totals();
        assert_eq!(totals.line_totals, vec![120.0, 24.5]);
        assert!((totals.subtotal - 144.5).abs() < 1e-9);
        assert!((totals.tax - 14.45).abs() < 1e-9);
        assert!((totals.grand_total - totals.subtotal * 1.10).abs() < 1e-9);
    }

    #[test]
    fn totals_of_empty_list_are_zero() {
        let mut draft = draft();
        draft.remove_item(0);
        let totals = draft.compute_totals();
        assert!(totals.line_totals.is_empty());
        assert_eq!(totals.grand_total, 0.0);
    }

    #[test]
    fn logo_preview_is_derived_from_bytes() {
        let mut draft = draft();
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A];
        draft.set_logo(Some(Logo::new("logo.png", png.clone())));
        let logo = draft.logo.as_ref().expect("logo set");
        assert_eq!(logo.bytes, png);
        assert_eq!(logo.preview.media_type, "image/png");
        assert_eq!(logo.preview.byte_len, 6);

        draft.set_logo(None);
        assert!(draft.logo.is_none());
    }
}
