//! Save-then-render submission.
//!
//! A submit validates the draft, stores it, asks the backend to render the
//! stored invoice and writes the returned document to the download folder.
//! The render call needs the id handed back by the store call, so the two
//! requests always run one after the other. Nothing is retried; the user
//! resubmits.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::{BackendError, InvoiceBackend, InvoicePayload};
use crate::model::{InvoiceDraft, Logo};
use crate::validate::{ValidationError, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    InProgress,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEvent {
    Started,
    Delivered,
    Failed,
    Settled,
}

impl SubmissionState {
    pub fn next(self, event: SubmissionEvent) -> SubmissionState {
        use SubmissionEvent as E;
        use SubmissionState as S;
        match (self, event) {
            (S::Idle, E::Started) => S::InProgress,
            (S::InProgress, E::Delivered) => S::Success,
            (S::InProgress, E::Failed) => S::Failed,
            (S::Success | S::Failed, E::Settled) => S::Idle,
            (state, _) => state,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("A submission is already in progress.")]
    Busy,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not save the invoice.")]
    Persist(#[source] BackendError),
    #[error("Could not generate the invoice document.")]
    Render(#[source] BackendError),
    #[error("Could not write the invoice document to {path}.")]
    Delivery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub invoice_id: String,
    pub path: PathBuf,
}

/// Where rendered documents are written.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    pub dir: PathBuf,
    pub default_extension: String,
}

/// Name of the downloaded file. Characters that would escape the download
/// folder or break the file name are replaced.
pub fn document_filename(invoice_number: &str, extension: &str) -> String {
    let safe: String = invoice_number
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("invoice-{safe}.{extension}")
}

pub struct Submission<B> {
    backend: B,
    target: DownloadTarget,
    state: SubmissionState,
    observer: Option<Box<dyn FnMut(SubmissionState)>>,
}

impl<B: InvoiceBackend> Submission<B> {
    pub fn new(backend: B, target: DownloadTarget) -> Self {
        Submission {
            backend,
            target,
            state: SubmissionState::Idle,
            observer: None,
        }
    }

    /// Registers a callback invoked on every state change.
    pub fn on_progress(mut self, observer: impl FnMut(SubmissionState) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn is_busy(&self) -> bool {
        self.state != SubmissionState::Idle
    }

    pub fn submit(&mut self, draft: &InvoiceDraft) -> Result<Delivered, SubmitError> {
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }
        if let Err(e) = validate(draft) {
            tracing::debug!(reason = %e, "submission rejected locally");
            return Err(e.into());
        }

        let payload = InvoicePayload::from(draft);
        let logo = draft.logo.clone();

        self.transition(SubmissionEvent::Started);
        let outcome = self.run(&payload, logo.as_ref());
        match &outcome {
            Ok(delivered) => {
                tracing::info!(path = %delivered.path.display(), "invoice document saved");
                self.transition(SubmissionEvent::Delivered);
            }
            Err(e) => {
                tracing::warn!(error = %e, cause = ?std::error::Error::source(e), "submission failed");
                self.transition(SubmissionEvent::Failed);
            }
        }
        self.transition(SubmissionEvent::Settled);
        outcome
    }

    fn run(
        &self,
        payload: &InvoicePayload,
        logo: Option<&Logo>,
    ) -> Result<Delivered, SubmitError> {
        let saved = self
            .backend
            .persist(payload, logo)
            .map_err(SubmitError::Persist)?;
        tracing::info!(id = %saved.id, invoice_number = %saved.invoice_number, "invoice saved");

        let document = self
            .backend
            .render(&saved.id)
            .map_err(SubmitError::Render)?;

        let extension = document
            .extension()
            .unwrap_or(self.target.default_extension.as_str());
        let path = self
            .target
            .dir
            .join(document_filename(&saved.invoice_number, extension));
        write_document(&path, &document.bytes)?;

        Ok(Delivered {
            invoice_id: saved.id.to_string(),
            path,
        })
    }

    fn transition(&mut self, event: SubmissionEvent) {
        let next = self.state.next(event);
        if next == self.state {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "submission state");
        self.state = next;
        if let Some(observer) = self.observer.as_mut() {
            observer(next);
        }
    }
}

fn write_document(path: &Path, bytes: &[u8]) -> Result<(), SubmitError> {
    let delivery = |source| SubmitError::Delivery {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(delivery)?;
    }
    fs::write(path, bytes).map_err(delivery)
}
