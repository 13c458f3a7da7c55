//! Import normalization for editor pages.
//!
//! [`importer::ImportNormalizer`] converts an uploaded file to markdown,
//! picks its title and emoji, cleans up formatting, rehosts inline images
//! and encodes the result as collaborative document state.

pub mod attachments;
pub mod config;
pub mod converter;
pub mod document;
pub mod importer;
pub mod title;

pub use config::ImportConfig;
pub use importer::{
    normalize_instrumented, Actor, ImportContent, ImportError, ImportNormalizer, ImportRequest,
    ImportResult, ImportScope,
};
