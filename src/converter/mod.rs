//! Conversion of uploaded content to markdown.

mod html;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::importer::ImportContent;

pub use html::html_to_markdown;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Unsupported mime type: {0}")]
    UnsupportedMimeType(String),
    #[error("File {file_name} is not valid UTF-8: {source}")]
    InvalidEncoding {
        file_name: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("Conversion failed: {0}")]
    Failed(String),
}

/// Turns uploaded content of a given mime type into markdown.
#[async_trait]
pub trait FormatConverter: Send + Sync {
    async fn convert(
        &self,
        content: &ImportContent,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, ConversionError>;
}

/// Source formats the built-in converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Markdown,
    PlainText,
    Html,
}

impl SourceFormat {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "text/plain" => Some(Self::PlainText),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name)
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        match extension.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
        }
    }
}

/// Guess a mime type from a file name, defaulting to `application/octet-stream`.
pub fn mime_from_file_name(file_name: &str) -> &'static str {
    SourceFormat::from_file_name(file_name)
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream")
}

/// Converter for markdown, plain text and HTML uploads.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinConverter;

impl BuiltinConverter {
    fn resolve_format(file_name: &str, mime_type: &str) -> Result<SourceFormat, ConversionError> {
        if let Some(format) = SourceFormat::from_mime_type(mime_type) {
            return Ok(format);
        }
        let is_generic = mime_type.trim().is_empty()
            || mime_type.eq_ignore_ascii_case("application/octet-stream");
        if is_generic {
            if let Some(format) = SourceFormat::from_file_name(file_name) {
                return Ok(format);
            }
        }
        Err(ConversionError::UnsupportedMimeType(mime_type.to_string()))
    }
}

#[async_trait]
impl FormatConverter for BuiltinConverter {
    async fn convert(
        &self,
        content: &ImportContent,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String, ConversionError> {
        let format = Self::resolve_format(file_name, mime_type)?;
        let raw = content
            .as_text()
            .map_err(|source| ConversionError::InvalidEncoding {
                file_name: file_name.to_string(),
                source,
            })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let raw = raw.replace("\r\n", "\n");

        log::debug!("Converting {} as {:?}", file_name, format);

        Ok(match format {
            SourceFormat::Markdown | SourceFormat::PlainText => raw,
            SourceFormat::Html => html_to_markdown(&raw),
        })
    }
}
