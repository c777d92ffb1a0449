use std::fmt::Write;

use chrono::NaiveDate;
use comfy_table::{Attribute, Cell, CellAlignment, Table};

use crate::model::InvoiceDraft;

const CURRENCY_SYMBOL: &str = "₹";

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Two decimals with Indian digit grouping, e.g. `₹1,23,456.50`.
pub fn format_currency(amount: f64) -> String {
    let paise = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && paise > 0 { "-" } else { "" };
    format!(
        "{sign}{CURRENCY_SYMBOL}{}.{:02}",
        group_indian(&(paise / 100).to_string()),
        paise % 100
    )
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (mut rest, last_three) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    while rest.len() > 2 {
        let (head, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = head;
    }
    groups.push(rest);
    groups.reverse();
    format!("{},{}", groups.join(","), last_three)
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

/// Renders the draft as it would appear on the document. Totals are
/// recomputed on every call.
pub fn render(draft: &InvoiceDraft) -> String {
    let totals = draft.compute_totals();
    let mut out = String::new();

    let _ = writeln!(out, "INVOICE");
    if let Some(logo) = &draft.logo {
        let _ = writeln!(out, "Logo: {}", logo.preview);
    }
    let _ = writeln!(
        out,
        "Invoice #: {}",
        or_placeholder(&draft.invoice_number, "N/A")
    );
    let _ = writeln!(out, "Date: {}", format_date(draft.invoice_date));
    let _ = writeln!(out, "Due: {}", format_date(draft.due_date));

    let _ = writeln!(out, "\nBill To");
    let _ = writeln!(out, "{}", or_placeholder(&draft.bill_to.name, "Client Name"));
    let _ = writeln!(
        out,
        "{}",
        or_placeholder(&draft.bill_to.email, "client@email.com")
    );
    let _ = writeln!(
        out,
        "{}",
        or_placeholder(&draft.bill_to.address, "Client Address")
    );

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Description"),
        Cell::new("Qty"),
        Cell::new("Price"),
        Cell::new("Total"),
    ]);
    for (item, line_total) in draft.items.iter().zip(&totals.line_totals) {
        table.add_row(vec![
            Cell::new(or_placeholder(&item.description, "-")),
            Cell::new(item.quantity).set_alignment(CellAlignment::Center),
            Cell::new(format_currency(item.price)).set_alignment(CellAlignment::Right),
            Cell::new(format_currency(*line_total)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Subtotal"),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(totals.subtotal)).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new(format!("Tax ({:.0}%)", crate::model::TAX_RATE * 100.0)),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(totals.tax)).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Grand Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format_currency(totals.grand_total))
            .add_attribute(Attribute::Bold)
            .set_alignment(CellAlignment::Right),
    ]);
    let _ = writeln!(out, "\n{table}");

    if !draft.notes.is_empty() {
        let _ = writeln!(out, "\nNotes:\n{}", draft.notes);
    }
    out
}
