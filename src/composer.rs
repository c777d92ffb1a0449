use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use inquire::error::InquireError;
use inquire::{DateSelect, Select, Text};

use crate::api::InvoiceBackend;
use crate::model::{DraftField, InvoiceDraft, ItemField, Logo};
use crate::preview;
use crate::workflow::{Submission, SubmissionState};

// ==========================================
// Menu
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    InvoiceDetails,
    BillTo,
    AddItem,
    EditItem,
    RemoveItem,
    Logo,
    Notes,
    Preview,
    Download,
    Quit,
}

impl MenuAction {
    const ALL: [MenuAction; 10] = [
        MenuAction::InvoiceDetails,
        MenuAction::BillTo,
        MenuAction::AddItem,
        MenuAction::EditItem,
        MenuAction::RemoveItem,
        MenuAction::Logo,
        MenuAction::Notes,
        MenuAction::Preview,
        MenuAction::Download,
        MenuAction::Quit,
    ];
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuAction::InvoiceDetails => "🧾 Invoice Details",
            MenuAction::BillTo => "👤 Bill To",
            MenuAction::AddItem => "➕ Add Item",
            MenuAction::EditItem => "✏️  Edit Item",
            MenuAction::RemoveItem => "✕  Remove Item",
            MenuAction::Logo => "🖼  Company Logo",
            MenuAction::Notes => "🗒  Notes",
            MenuAction::Preview => "👀 Preview",
            MenuAction::Download => "📄 Download PDF",
            MenuAction::Quit => "🚪 Quit",
        })
    }
}

/// Row label used when picking an item to edit or remove.
struct ItemChoice {
    index: usize,
    label: String,
}

impl fmt::Display for ItemChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.index + 1, self.label)
    }
}

/// Esc on a sub-prompt goes back to the menu instead of ending the session.
fn cancelled<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ==========================================
// Session
// ==========================================

pub struct SessionOptions {
    pub open_after_download: bool,
}

pub fn run<B: InvoiceBackend>(
    mut draft: InvoiceDraft,
    mut submission: Submission<B>,
    options: SessionOptions,
) -> Result<()> {
    println!("\n--- Invoice Composer ---");
    println!("{}", preview::render(&draft));

    loop {
        let choice = match Select::new("What next?", MenuAction::ALL.to_vec())
            .with_page_size(MenuAction::ALL.len())
            .prompt()
        {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        let edited = match choice {
            MenuAction::InvoiceDetails => edit_invoice_details(&mut draft)?,
            MenuAction::BillTo => edit_bill_to(&mut draft)?,
            MenuAction::AddItem => {
                match draft.add_item() {
                    Ok(()) => {
                        let index = draft.items.len() - 1;
                        edit_item_fields(&mut draft, index)?;
                    }
                    Err(e) => println!("❌ {e}"),
                }
                true
            }
            MenuAction::EditItem => match pick_item(&draft, "Edit which item?")? {
                Some(index) => edit_item_fields(&mut draft, index)?,
                None => false,
            },
            MenuAction::RemoveItem => match pick_item(&draft, "Remove which item?")? {
                Some(index) => {
                    draft.remove_item(index);
                    true
                }
                None => false,
            },
            MenuAction::Logo => choose_logo(&mut draft)?,
            MenuAction::Notes => edit_text_field(&mut draft, DraftField::Notes, "Notes:")?,
            MenuAction::Preview => {
                println!("{}", preview::render(&draft));
                false
            }
            MenuAction::Download => {
                download(&draft, &mut submission, &options);
                false
            }
            MenuAction::Quit => break,
        };

        if edited {
            println!("{}", preview::render(&draft));
        }
    }

    println!("👋 Bye.");
    Ok(())
}

fn download<B: InvoiceBackend>(
    draft: &InvoiceDraft,
    submission: &mut Submission<B>,
    options: &SessionOptions,
) {
    if submission.is_busy() {
        println!("⏳ Generating...");
        return;
    }
    match submission.submit(draft) {
        Ok(delivered) => {
            println!(
                "✅ PDF Generated: {} (invoice #{})",
                delivered.path.display(),
                delivered.invoice_id
            );
            if options.open_after_download {
                open_and_reveal(&delivered.path);
            }
        }
        Err(e) => println!("❌ {e}"),
    }
}

/// Progress line printed for each state change of a submission.
pub fn report_progress(state: SubmissionState) {
    match state {
        SubmissionState::InProgress => println!("⏳ Generating..."),
        SubmissionState::Failed => println!("⚠️  Submission failed."),
        SubmissionState::Success | SubmissionState::Idle => {}
    }
}

// ==========================================
// Field Editors
// ==========================================

fn edit_text_field(draft: &mut InvoiceDraft, field: DraftField, prompt: &str) -> Result<bool> {
    let current = draft.field_value(field);
    let Some(value) = cancelled(Text::new(prompt).with_initial_value(&current).prompt())? else {
        return Ok(false);
    };
    draft.set_field(field, &value);
    Ok(true)
}

fn edit_date_field(draft: &mut InvoiceDraft, field: DraftField, prompt: &str) -> Result<bool> {
    let current = NaiveDate::parse_from_str(&draft.field_value(field), "%Y-%m-%d")
        .unwrap_or_else(|_| Local::now().date_naive());
    let Some(date) = cancelled(DateSelect::new(prompt).with_default(current).prompt())? else {
        return Ok(false);
    };
    draft.set_field(field, &date.format("%Y-%m-%d").to_string());
    Ok(true)
}

fn edit_invoice_details(draft: &mut InvoiceDraft) -> Result<bool> {
    let mut edited = edit_text_field(draft, DraftField::InvoiceNumber, "Invoice Number *:")?;
    edited |= edit_date_field(draft, DraftField::InvoiceDate, "Invoice Date *:")?;
    edited |= edit_date_field(draft, DraftField::DueDate, "Due Date *:")?;
    Ok(edited)
}

fn edit_bill_to(draft: &mut InvoiceDraft) -> Result<bool> {
    println!("\n--- Bill To ---");
    let mut edited = edit_text_field(draft, DraftField::BillToName, "Name *:")?;
    edited |= edit_text_field(draft, DraftField::BillToEmail, "Email *:")?;
    edited |= edit_text_field(draft, DraftField::BillToAddress, "Address *:")?;
    Ok(edited)
}

fn pick_item(draft: &InvoiceDraft, prompt: &str) -> Result<Option<usize>> {
    if draft.items.is_empty() {
        println!("❌ No items yet.");
        return Ok(None);
    }
    let choices: Vec<ItemChoice> = draft
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| ItemChoice {
            index,
            label: format!(
                "{} × {} @ {}",
                if item.description.is_empty() { "-" } else { item.description.as_str() },
                item.quantity,
                preview::format_currency(item.price)
            ),
        })
        .collect();
    Ok(cancelled(Select::new(prompt, choices).prompt())?.map(|choice| choice.index))
}

fn edit_item_fields(draft: &mut InvoiceDraft, index: usize) -> Result<bool> {
    let Some(item) = draft.items.get(index).cloned() else {
        return Ok(false);
    };
    let fields = [
        (ItemField::Description, "Description *:", item.description.clone()),
        (ItemField::Quantity, "Qty:", item.quantity.to_string()),
        (ItemField::Price, "Price:", item.price.to_string()),
    ];
    let mut edited = false;
    for (field, prompt, current) in fields {
        let Some(raw) = cancelled(Text::new(prompt).with_initial_value(&current).prompt())? else {
            break;
        };
        draft.edit_item(index, field, &raw);
        edited = true;
    }
    Ok(edited)
}

// ==========================================
// Logo
// ==========================================

const LOGO_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

pub fn load_logo(path: &Path) -> Result<Logo> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read logo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "logo".to_string());
    Ok(Logo::new(file_name, bytes))
}

fn choose_logo(draft: &mut InvoiceDraft) -> Result<bool> {
    if draft.logo.is_some() {
        let options = vec!["Replace logo", "Remove logo", "Keep current"];
        match cancelled(Select::new("Company Logo:", options).prompt())? {
            Some("Remove logo") => {
                draft.set_logo(None);
                return Ok(true);
            }
            Some("Replace logo") => {}
            _ => return Ok(false),
        }
    }

    println!("📂 Opening file picker...");
    let picked = rfd::FileDialog::new()
        .set_title("Select Company Logo")
        .add_filter("Images", &LOGO_EXTENSIONS)
        .pick_file();
    let path = match picked {
        Some(path) => path,
        None => {
            println!("❌ No file selected. Falling back to manual input.");
            let Some(typed) =
                cancelled(Text::new("Logo path (leave empty to skip):").prompt())?
            else {
                return Ok(false);
            };
            if typed.trim().is_empty() {
                return Ok(false);
            }
            PathBuf::from(crate::config::expand_home_dir(typed.trim()))
        }
    };

    match load_logo(&path) {
        Ok(logo) => {
            println!("✅ Logo: {}", logo.preview);
            draft.set_logo(Some(logo));
            Ok(true)
        }
        Err(e) => {
            println!("❌ {e:#}");
            Ok(false)
        }
    }
}

/// Command that shows the downloaded file in the platform file manager.
/// xdg-open has no select flag, so Linux opens the containing folder.
fn reveal_command(path: &Path) -> Command {
    #[cfg(target_os = "macos")]
    let command = {
        let mut command = Command::new("open");
        command.arg("-R").arg(path);
        command
    };

    #[cfg(target_os = "windows")]
    let command = {
        let mut command = Command::new("explorer");
        command.arg(format!("/select,{}", path.to_string_lossy()));
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = {
        let folder = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut command = Command::new("xdg-open");
        command.arg(folder);
        command
    };

    command
}

fn open_and_reveal(path: &Path) {
    if let Err(e) = reveal_command(path).spawn() {
        tracing::warn!(path = %path.display(), error = %e, "could not reveal document");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_prompt_maps_to_none() {
        let result: Result<String, InquireError> = Err(InquireError::OperationCanceled);
        assert!(cancelled(result).expect("not an error").is_none());

        let ok: Result<u32, InquireError> = Ok(3);
        assert_eq!(cancelled(ok).expect("ok"), Some(3));
    }

    #[test]
    fn interrupted_prompt_is_an_error() {
        let result: Result<String, InquireError> = Err(InquireError::OperationInterrupted);
        assert!(cancelled(result).is_err());
    }

    #[test]
    fn load_logo_reads_bytes_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("brand.jpg");
        fs::write(&path, b"\xFF\xD8\xFF\xE0").expect("write");

        let logo = load_logo(&path).expect("load");
        assert_eq!(logo.preview.file_name, "brand.jpg");
        assert_eq!(logo.preview.media_type, "image/jpeg");
        assert_eq!(logo.bytes.len(), 4);
    }

    #[test]
    fn missing_logo_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_logo(&dir.path().join("nope.png")).is_err());
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    #[test]
    fn reveal_opens_the_containing_folder() {
        let command = reveal_command(Path::new("/tmp/invoices/invoice-INV-1.pdf"));
        assert_eq!(command.get_program(), "xdg-open");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, [Path::new("/tmp/invoices").as_os_str()]);

        let bare = reveal_command(Path::new("invoice-INV-1.pdf"));
        let args: Vec<_> = bare.get_args().collect();
        assert_eq!(args, [Path::new(".").as_os_str()]);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn reveal_selects_the_file() {
        let command = reveal_command(Path::new("/tmp/invoices/invoice-INV-1.pdf"));
        assert_eq!(command.get_program(), "open");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args[0], "-R");
    }

    #[test]
    fn menu_lists_download_before_quit() {
        let labels: Vec<String> = MenuAction::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(labels.last().map(String::as_str), Some("🚪 Quit"));
        assert!(labels.contains(&"📄 Download PDF".to_string()));
    }
}
