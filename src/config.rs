use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs, UserDirs};
use inquire::{Confirm, CustomType, Text};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8083";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub backend_url: String,
    pub download_dir: Option<String>, // None = the user's Downloads folder
    pub document_extension: String,
    pub request_timeout_secs: u64,
    pub open_after_download: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            download_dir: None,
            document_extension: "pdf".to_string(),
            request_timeout_secs: 30,
            open_after_download: false,
        }
    }
}

impl AppSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn resolved_download_dir(&self) -> PathBuf {
        match &self.download_dir {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(expand_home_dir(dir.trim())),
            _ => default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn get_config_path() -> PathBuf {
    match ProjectDirs::from("com", "invoice-composer", "app") {
        Some(proj_dirs) => proj_dirs.config_dir().join("settings.toml"),
        None => PathBuf::from("settings.toml"),
    }
}

pub fn parse_settings(content: &str) -> Result<AppSettings> {
    toml::from_str(content).context("Failed to parse settings")
}

/// Reads stored settings, falling back to defaults when no file exists yet.
pub fn load_settings(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(AppSettings::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_settings(&content).with_context(|| format!("Invalid settings in {}", path.display()))
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let toml_str = toml::to_string_pretty(settings).context("Failed to encode settings")?;
    fs::write(path, toml_str).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn setup_config_wizard(path: &Path) -> Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings(path)?;

    let backend_url = Text::new("Backend URL:")
        .with_default(&current.backend_url)
        .prompt()?;

    println!("📂 Opening folder picker for downloads...");
    let picked = rfd::FileDialog::new()
        .set_title("Select Download Directory")
        .pick_folder();
    let download_dir = match picked {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            let default_dir = current.resolved_download_dir().to_string_lossy().to_string();
            Text::new("Download Directory:")
                .with_default(&default_dir)
                .prompt()?
        }
    };

    let request_timeout_secs = CustomType::<u64>::new("Request timeout (seconds):")
        .with_default(current.request_timeout_secs)
        .with_error_message("Please enter a whole number of seconds")
        .prompt()?;

    let open_after_download = Confirm::new("Open documents after download?")
        .with_default(current.open_after_download)
        .prompt()?;

    let settings = AppSettings {
        backend_url: backend_url.trim().to_string(),
        download_dir: Some(download_dir),
        request_timeout_secs,
        open_after_download,
        ..current
    };
    save_settings(path, &settings)?;
    println!("✅ Settings saved to {}", path.display());
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
