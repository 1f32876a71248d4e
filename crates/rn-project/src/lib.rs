//! rn-project: panel file format, validation and session building.

pub mod build;
pub mod schema;
pub mod validate;

use std::path::Path;

pub use build::{build_session, snapshot, PanelHandles};
pub use schema::*;
pub use validate::{validate_panel, ValidationError};

use rn_circuit::CircuitError;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Build error: {0}")]
    Build(#[from] CircuitError),

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &Path) -> ProjectResult<PanelDoc> {
    let content = std::fs::read_to_string(path)?;
    let doc: PanelDoc = serde_yaml::from_str(&content)?;
    validate_panel(&doc)?;
    Ok(doc)
}

pub fn save_yaml(path: &Path, doc: &PanelDoc) -> ProjectResult<()> {
    validate_panel(doc)?;
    let content = serde_yaml::to_string(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<PanelDoc> {
    let content = std::fs::read_to_string(path)?;
    let doc: PanelDoc = serde_json::from_str(&content)?;
    validate_panel(&doc)?;
    Ok(doc)
}

pub fn save_json(path: &Path, doc: &PanelDoc) -> ProjectResult<()> {
    validate_panel(doc)?;
    let content = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, content)?;
    Ok(())
}

enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> ProjectResult<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => Err(ProjectError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

/// Load a panel, picking the format from the file extension.
pub fn load(path: &Path) -> ProjectResult<PanelDoc> {
    match format_of(path)? {
        Format::Yaml => load_yaml(path),
        Format::Json => load_json(path),
    }
}

/// Save a panel, picking the format from the file extension.
pub fn save(path: &Path, doc: &PanelDoc) -> ProjectResult<()> {
    match format_of(path)? {
        Format::Yaml => save_yaml(path, doc),
        Format::Json => save_json(path, doc),
    }
}
