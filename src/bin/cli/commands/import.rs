use std::path::Path;

use anyhow::{Context, Result};

use docimport_lib::converter::mime_from_file_name;
use docimport_lib::importer::{normalize_instrumented, ImportRequest};

use crate::app::App;
use crate::render::terminal::{Color, render_summary};
use crate::OutputFormat;

pub async fn run(
    app: &App,
    file: &Path,
    mime_type: Option<&str>,
    state_out: Option<&Path>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("Import path has no file name")?;
    let mime_type = mime_type
        .map(|m| m.to_string())
        .unwrap_or_else(|| mime_from_file_name(&file_name).to_string());

    let request = ImportRequest::new(app.actor.clone(), mime_type, file_name.clone(), bytes);
    let result = normalize_instrumented(&app.normalizer, request)
        .await
        .with_context(|| format!("Failed to import {}", file_name))?;

    if let Some(path) = state_out {
        tokio::fs::write(path, &result.state)
            .await
            .with_context(|| format!("Failed to write state to {}", path.display()))?;
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Plain => {
            print!("{}", render_summary(&result, use_color));
            if let Some(path) = state_out {
                if use_color {
                    println!("{}State written to {}{}", Color::DIM, path.display(), Color::RESET);
                } else {
                    println!("State written to {}", path.display());
                }
            }
        }
    }

    Ok(())
}
