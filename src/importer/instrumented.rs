use std::time::Instant;

use super::{ImportError, ImportNormalizer, ImportRequest, ImportResult};

/// Log target used for import timing records.
pub const SPAN_NAME: &str = "document_importer";

/// Run [`ImportNormalizer::normalize`] and log how long it took.
///
/// Only the file name, mime type and sizes are logged, never the content.
pub async fn normalize_instrumented(
    normalizer: &ImportNormalizer,
    request: ImportRequest,
) -> Result<ImportResult, ImportError> {
    let file_name = request.file_name.clone();
    let mime_type = request.mime_type.clone();
    let input_size = request.content.len();
    let started = Instant::now();

    log::info!(
        target: SPAN_NAME,
        "Importing {} ({}, {} bytes)",
        file_name,
        mime_type,
        input_size
    );

    let result = normalizer.normalize(request).await;
    let elapsed_ms = started.elapsed().as_millis();

    match &result {
        Ok(imported) => log::info!(
            target: SPAN_NAME,
            "Imported {} in {}ms ({} byte state, emoji: {})",
            file_name,
            elapsed_ms,
            imported.state.len(),
            imported.emoji.is_some()
        ),
        Err(e) if e.is_content_too_large() => log::warn!(
            target: SPAN_NAME,
            "Rejected {} after {}ms: content too large",
            file_name,
            elapsed_ms
        ),
        Err(e) => log::warn!(
            target: SPAN_NAME,
            "Import of {} failed after {}ms: {}",
            file_name,
            elapsed_ms,
            e
        ),
    }

    result
}
