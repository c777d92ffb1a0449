//! Client side of the invoice backend: one call stores an invoice, the other
//! renders a stored invoice into a document.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{Client, multipart};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{InvoiceDraft, LineItem, Logo};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("could not encode invoice: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Body of the `invoice` part. The bill-to block is flattened into
/// `customer*` fields the way the backend stores them.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePayload {
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: String,
    pub notes: String,
    pub items: Vec<LineItem>,
}

impl From<&InvoiceDraft> for InvoicePayload {
    fn from(draft: &InvoiceDraft) -> Self {
        InvoicePayload {
            invoice_number: draft.invoice_number.clone(),
            invoice_date: draft.invoice_date,
            due_date: draft.due_date,
            customer_name: draft.bill_to.name.clone(),
            customer_email: draft.bill_to.email.clone(),
            customer_address: draft.bill_to.address.clone(),
            notes: draft.notes.clone(),
            items: draft.items.clone(),
        }
    }
}

/// Backend identifier of a stored invoice. Accepts numeric or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawId")]
pub struct InvoiceId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl From<RawId> for InvoiceId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => InvoiceId(n.to_string()),
            RawId::Text(s) => InvoiceId(s),
        }
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub id: InvoiceId,
    pub invoice_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl RenderedDocument {
    /// File extension implied by the content type, if it is one we know.
    pub fn extension(&self) -> Option<&'static str> {
        let essence = self.content_type.as_deref()?.split(';').next()?.trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some("pdf"),
            "text/html" => Some("html"),
            "image/png" => Some("png"),
            _ => None,
        }
    }
}

pub trait InvoiceBackend {
    fn persist(
        &self,
        invoice: &InvoicePayload,
        logo: Option<&Logo>,
    ) -> Result<SubmissionResult, BackendError>;

    fn render(&self, id: &InvoiceId) -> Result<RenderedDocument, BackendError>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpBackend {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn invoices_url(&self) -> String {
        format!("{}/api/invoices", self.base_url)
    }

    fn document_url(&self, id: &InvoiceId) -> String {
        format!("{}/api/invoices/{}/pdf", self.base_url, id)
    }
}

impl InvoiceBackend for HttpBackend {
    fn persist(
        &self,
        invoice: &InvoicePayload,
        logo: Option<&Logo>,
    ) -> Result<SubmissionResult, BackendError> {
        let json = serde_json::to_vec(invoice)?;
        let mut form = multipart::Form::new()
            .part("invoice", multipart::Part::bytes(json).mime_str("application/json")?);
        if let Some(logo) = logo {
            let part = multipart::Part::bytes(logo.bytes.clone())
                .file_name(logo.preview.file_name.clone())
                .mime_str(logo.preview.media_type)?;
            form = form.part("logo", part);
        }

        let url = self.invoices_url();
        tracing::debug!(%url, with_logo = logo.is_some(), "persisting invoice");
        let response = self.client.post(&url).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(response.json::<SubmissionResult>()?)
    }

    fn render(&self, id: &InvoiceId) -> Result<RenderedDocument, BackendError> {
        let url = self.document_url(id);
        tracing::debug!(%url, "fetching rendered invoice");
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes()?.to_vec();
        Ok(RenderedDocument {
            bytes,
            content_type,
        })
    }
}
