//! Import error types

use thiserror::Error;

use crate::attachments::RehostError;
use crate::config::ConfigError;
use crate::converter::ConversionError;
use crate::document::CodecError;

/// Errors that abort an import.
///
/// `ContentTooLarge` is raised by the importer itself and `Config` when it
/// is built with invalid limits; the other variants carry collaborator
/// failures through unchanged.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("The document \"{title}\" is too large to import, please reduce the length and try again")]
    ContentTooLarge { title: String },

    #[error("Invalid import config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Rehost(#[from] RehostError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ImportError {
    pub fn is_content_too_large(&self) -> bool {
        matches!(self, ImportError::ContentTooLarge { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_too_large_message_includes_title() {
        let err = ImportError::ContentTooLarge {
            title: "Quarterly Report".to_string(),
        };
        assert!(err.is_content_too_large());
        assert_eq!(
            err.to_string(),
            "The document \"Quarterly Report\" is too large to import, please reduce the length and try again"
        );
    }

    #[test]
    fn test_collaborator_error_is_transparent() {
        let err: ImportError = ConversionError::UnsupportedMimeType("image/png".to_string()).into();
        assert!(!err.is_content_too_large());
        assert_eq!(err.to_string(), "Unsupported mime type: image/png");
    }
}
