mod api;
mod composer;
mod config;
mod model;
mod preview;
mod validate;
mod workflow;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::HttpBackend;
use crate::composer::SessionOptions;
use crate::config::{AppSettings, get_config_path, load_settings, setup_config_wizard};
use crate::model::{DraftField, InvoiceDraft};
use crate::workflow::{DownloadTarget, Submission};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-composer", version, about = "Compose an invoice and download it as a PDF")]
struct Cli {
    /// Backend base URL (overrides settings.toml)
    #[arg(long, global = true, value_name = "URL")]
    backend_url: Option<String>,

    /// Folder rendered documents are saved to (overrides settings.toml)
    #[arg(long, global = true, value_name = "DIR")]
    download_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a new invoice (default)
    New {
        /// Prefill a field, e.g. --set invoiceNumber=INV-1 --set billTo.name=Acme
        #[arg(long = "set", value_name = "PATH=VALUE", value_parser = parse_assignment)]
        set: Vec<(DraftField, String)>,

        /// Attach a logo image up front
        #[arg(long, value_name = "FILE")]
        logo: Option<PathBuf>,
    },
    /// Configure backend and download folder
    Config,
}

fn parse_assignment(raw: &str) -> Result<(DraftField, String), String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{raw}'"))?;
    let field = path.parse::<DraftField>().map_err(|e| e.to_string())?;
    Ok((field, value.to_string()))
}

// ==========================================
// Main Function
// ==========================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = get_config_path();

    match cli.command.unwrap_or(Commands::New {
        set: Vec::new(),
        logo: None,
    }) {
        Commands::Config => {
            setup_config_wizard(&config_path)?;
        }
        Commands::New { set, logo } => {
            let mut settings = load_settings(&config_path)?;
            apply_overrides(&mut settings, cli.backend_url, cli.download_dir);
            compose(&settings, set, logo)?;
        }
    }
    Ok(())
}

fn apply_overrides(
    settings: &mut AppSettings,
    backend_url: Option<String>,
    download_dir: Option<PathBuf>,
) {
    if let Some(url) = backend_url {
        settings.backend_url = url;
    }
    if let Some(dir) = download_dir {
        settings.download_dir = Some(dir.to_string_lossy().to_string());
    }
}

fn compose(
    settings: &AppSettings,
    prefill: Vec<(DraftField, String)>,
    logo: Option<PathBuf>,
) -> Result<()> {
    let mut draft = InvoiceDraft::new(Local::now().date_naive());
    for (field, value) in prefill {
        draft.set_field(field, &value);
    }
    if let Some(path) = logo {
        draft.set_logo(Some(composer::load_logo(&path)?));
    }

    let backend = HttpBackend::new(&settings.backend_url, settings.request_timeout())
        .context("Failed to build HTTP client")?;
    let target = DownloadTarget {
        dir: settings.resolved_download_dir(),
        default_extension: settings.document_extension.clone(),
    };
    tracing::info!(
        backend = %settings.backend_url,
        downloads = %target.dir.display(),
        "starting composer session"
    );
    let submission = Submission::new(backend, target).on_progress(composer::report_progress);

    composer::run(
        draft,
        submission,
        SessionOptions {
            open_after_download: settings.open_after_download,
        },
    )
}
