//! Model download and path management
//!
//! Handles downloading Whisper models from HuggingFace and
//! finding model files across multiple locations.

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Download a model from HuggingFace with progress bar
pub fn download_model(url: &str, dest: &PathBuf) -> Result<()> {
    tracing::info!(url, "downloading model");

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let response = reqwest::blocking::get(url)
        .map_err(|e| Error::Config(format!("model download: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Config(format!(
            "model download failed: HTTP {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .map_err(|e| Error::Config(format!("progress template: {e}")))?
            .progress_chars("##-"),
    );

    let mut file = File::create(dest)?;
    let mut downloaded: u64 = 0;
    let content = response
        .bytes()
        .map_err(|e| Error::Config(format!("model download: {e}")))?;

    for chunk in content.chunks(8192) {
        file.write_all(chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    pb.finish_with_message("Download complete!");
    tracing::info!(path = %dest.display(), "model saved");

    Ok(())
}

/// Get the preferred model install location
pub fn model_install_path(model_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("golos")
        .join("models")
        .join(model_name)
}

/// Get the model path, checking multiple locations
pub fn model_path(model_name: &str) -> PathBuf {
    let candidates = [
        // 1. Current directory (for development)
        PathBuf::from("models").join(model_name),
        // 2. XDG data dir (Linux: ~/.local/share/golos)
        dirs::data_dir()
            .map(|p| p.join("golos").join("models").join(model_name))
            .unwrap_or_default(),
        // 3. Home dir fallback
        dirs::home_dir()
            .map(|p| p.join(".golos").join("models").join(model_name))
            .unwrap_or_default(),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    // Return the preferred install location if none exist (for error message)
    model_install_path(model_name)
}

/// Locate a model file, downloading it when missing.
pub fn ensure_model(filename: &str, url: &str) -> Result<PathBuf> {
    let found = model_path(filename);
    if found.exists() {
        return Ok(found);
    }
    tracing::info!(model = filename, "model not found locally");
    let install = model_install_path(filename);
    download_model(url, &install)?;
    Ok(install)
}
