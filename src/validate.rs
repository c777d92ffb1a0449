//! Local checks run before anything is sent to the backend.
//!
//! Rules are evaluated in form order and the first failure wins, so the user
//! always sees one message pointing at one field.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::model::InvoiceDraft;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invoice number is required.")]
    MissingInvoiceNumber,
    #[error("Invoice date is required.")]
    MissingInvoiceDate,
    #[error("Due date is required.")]
    MissingDueDate,
    #[error("Customer name is required.")]
    MissingCustomerName,
    #[error("Please enter a valid customer email.")]
    InvalidCustomerEmail,
    #[error("Customer address is required.")]
    MissingCustomerAddress,
    #[error("At least one valid item is required.")]
    MissingItem,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks a draft for submission.
///
/// Only the first line item is required to be complete; later rows are sent
/// as they are. `add_item` refuses to grow the list past an incomplete row,
/// which covers most of the gap, but a row emptied after the fact still goes
/// through.
pub fn validate(draft: &InvoiceDraft) -> Result<(), ValidationError> {
    if draft.invoice_number.trim().is_empty() {
        return Err(ValidationError::MissingInvoiceNumber);
    }
    if draft.invoice_date.is_none() {
        return Err(ValidationError::MissingInvoiceDate);
    }
    if draft.due_date.is_none() {
        return Err(ValidationError::MissingDueDate);
    }
    if draft.bill_to.name.trim().is_empty() {
        return Err(ValidationError::MissingCustomerName);
    }
    if !is_valid_email(&draft.bill_to.email) {
        return Err(ValidationError::InvalidCustomerEmail);
    }
    if draft.bill_to.address.trim().is_empty() {
        return Err(ValidationError::MissingCustomerAddress);
    }
    match draft.items.first() {
        Some(first) if first.is_complete() => Ok(()),
        _ => Err(ValidationError::MissingItem),
    }
}
