//! Document import pipeline.
//!
//! Turns an uploaded file into the title, markdown body and encoded
//! document state stored for a new page. Steps run in a fixed order:
//! conversion, emoji extraction, heading promotion, formatting
//! normalization, attachment rehoming, title truncation, state encoding and
//! the state size check.

mod errors;
mod instrumented;
mod models;
pub mod normalize;

use std::sync::Arc;

use crate::attachments::{AssetRehoster, AttachmentRehoster};
use crate::config::ImportConfig;
use crate::converter::{BuiltinConverter, FormatConverter};
use crate::document::{build_tree, StateCodec, YrsStateCodec};
use crate::title::{HeadingTitleParser, TitleParser};

pub use errors::ImportError;
pub use instrumented::{normalize_instrumented, SPAN_NAME};
pub use models::{Actor, ImportContent, ImportRequest, ImportResult, ImportScope};

use normalize::{
    extract_emoji, normalize_formatting, promote_heading, title_from_file_name, truncate_title,
};

/// Runs the import pipeline against a set of collaborators.
///
/// Holds no per-call state, so one instance can serve concurrent imports.
#[derive(Clone)]
pub struct ImportNormalizer {
    config: ImportConfig,
    converter: Arc<dyn FormatConverter>,
    title_parser: Arc<dyn TitleParser>,
    rehoster: Arc<dyn AttachmentRehoster>,
    codec: Arc<dyn StateCodec>,
}

impl ImportNormalizer {
    /// Normalizer with the built-in converter, title parser, asset store
    /// and Yrs codec.
    ///
    /// Fails if the config does not pass [`ImportConfig::validate`].
    pub fn new(config: ImportConfig) -> Result<Self, ImportError> {
        config.validate()?;
        let rehoster = AssetRehoster::new(config.attachments.clone())?;
        Ok(Self {
            config,
            converter: Arc::new(BuiltinConverter),
            title_parser: Arc::new(HeadingTitleParser),
            rehoster: Arc::new(rehoster),
            codec: Arc::new(YrsStateCodec),
        })
    }

    pub fn with_converter(mut self, converter: Arc<dyn FormatConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_title_parser(mut self, title_parser: Arc<dyn TitleParser>) -> Self {
        self.title_parser = title_parser;
        self
    }

    pub fn with_rehoster(mut self, rehoster: Arc<dyn AttachmentRehoster>) -> Self {
        self.rehoster = rehoster;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn StateCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import one document.
    ///
    /// Collaborator failures are returned unchanged. Fails with
    /// [`ImportError::ContentTooLarge`] when the encoded state is over the
    /// configured limit; an oversized title is truncated instead.
    pub async fn normalize(&self, request: ImportRequest) -> Result<ImportResult, ImportError> {
        let ImportRequest {
            actor,
            mime_type,
            file_name,
            content,
            ip,
            scope,
        } = request;

        let text = self
            .converter
            .convert(&content, &file_name, &mime_type)
            .await?;
        let mut title = title_from_file_name(&file_name);

        // Emoji extraction must run before heading detection.
        let (text, emoji) = extract_emoji(&text);
        if let Some(emoji) = &emoji {
            log::debug!("Extracted title emoji {} from {}", emoji, file_name);
        }

        let text = match promote_heading(&text, self.title_parser.as_ref()) {
            Some((heading, rest)) => {
                log::debug!("Using leading heading as title for {}", file_name);
                title = heading;
                rest
            }
            None => text,
        };

        let text = normalize_formatting(text.trim());

        let text = self
            .rehoster
            .rehost(&text, &actor, ip.as_deref(), scope.as_ref())
            .await?;

        let title = truncate_title(&title, self.config.max_title_length);

        let tree = build_tree(&text);
        let state = self.codec.encode(&tree).await?;

        if state.len() > self.config.max_state_length {
            log::debug!(
                "Rejecting {}: state is {} bytes, limit {}",
                file_name,
                state.len(),
                self.config.max_state_length
            );
            return Err(ImportError::ContentTooLarge { title });
        }

        Ok(ImportResult {
            emoji,
            text,
            title,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{NoopRehoster, RehostError};
    use crate::config::ConfigError;
    use crate::converter::ConversionError;
    use crate::document::{CodecError, EditorData};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn normalizer(config: ImportConfig) -> ImportNormalizer {
        ImportNormalizer::new(config)
            .unwrap()
            .with_rehoster(Arc::new(NoopRehoster))
    }

    fn markdown_request(file_name: &str, body: &str) -> ImportRequest {
        ImportRequest::new(Actor::new("ada"), "text/markdown", file_name, body)
    }

    /// Counts rehost calls so tests can check what ran.
    #[derive(Default)]
    struct CountingRehoster {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AttachmentRehoster for CountingRehoster {
        async fn rehost(
            &self,
            text: &str,
            _actor: &Actor,
            _ip: Option<&str>,
            _scope: Option<&ImportScope>,
        ) -> Result<String, RehostError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_string())
        }
    }

    struct FailingConverter;

    #[async_trait]
    impl FormatConverter for FailingConverter {
        async fn convert(
            &self,
            _content: &ImportContent,
            _file_name: &str,
            _mime_type: &str,
        ) -> Result<String, ConversionError> {
            Err(ConversionError::Failed("corrupt archive".to_string()))
        }
    }

    struct FailingCodec;

    #[async_trait]
    impl StateCodec for FailingCodec {
        async fn encode(&self, _tree: &EditorData) -> Result<Vec<u8>, CodecError> {
            Err(CodecError::EncodeError("boom".to_string()))
        }

        fn decode(&self, _state: &[u8]) -> Result<EditorData, CodecError> {
            Err(CodecError::DecodeError("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_heading_becomes_title() {
        let result = normalizer(ImportConfig::default())
            .normalize(markdown_request("upload.md", "# My Document\nBody"))
            .await
            .unwrap();

        assert_eq!(result.title, "My Document");
        assert_eq!(result.text, "Body");
        assert_eq!(result.emoji, None);
        assert!(!result.state.is_empty());
    }

    #[tokio::test]
    async fn test_file_name_title_fallback() {
        let result = normalizer(ImportConfig::default())
            .normalize(markdown_request("notes.md", "Just text, no heading."))
            .await
            .unwrap();

        assert_eq!(result.title, "notes");
        assert_eq!(result.text, "Just text, no heading.");
    }

    #[tokio::test]
    async fn test_emoji_extracted_before_heading() {
        let result = normalizer(ImportConfig::default())
            .normalize(markdown_request("e.md", "😀 Hello world"))
            .await
            .unwrap();

        assert_eq!(result.emoji.as_deref(), Some("😀"));
        assert_eq!(result.text, "Hello world");
        assert_eq!(result.title, "e");
    }

    #[tokio::test]
    async fn test_emoji_inside_heading() {
        let result = normalizer(ImportConfig::default())
            .normalize(markdown_request("e.md", "# 😀 Launch Plan\n\nSteps"))
            .await
            .unwrap();

        assert_eq!(result.emoji.as_deref(), Some("😀"));
        assert_eq!(result.title, "Launch Plan");
        assert_eq!(result.text, "Steps");
    }

    #[tokio::test]
    async fn test_formatting_normalized() {
        let result = normalizer(ImportConfig::default())
            .normalize(markdown_request("f.md", "$100 <br> text a****b____c"))
            .await
            .unwrap();

        assert_eq!(result.text, "\\$100 \\n text abc");
    }

    #[tokio::test]
    async fn test_long_title_truncated() {
        let config = ImportConfig::default();
        let long_title = "word ".repeat((config.max_title_length + 50) / 5);
        let body = format!("# {}\n\nBody", long_title.trim());

        let result = normalizer(config.clone())
            .normalize(markdown_request("t.md", &body))
            .await
            .unwrap();

        assert!(result.title.chars().count() <= config.max_title_length);
        assert!(result.title.ends_with("..."));
        assert_eq!(result.text, "Body");
    }

    #[tokio::test]
    async fn test_state_over_limit_is_rejected() {
        let config = ImportConfig {
            max_state_length: 256,
            ..ImportConfig::default()
        };
        let body = "A long paragraph of imported text. ".repeat(40);

        let err = normalizer(config)
            .normalize(markdown_request("big.md", &body))
            .await
            .unwrap_err();

        assert!(err.is_content_too_large());
        assert!(err.to_string().contains("\"big\""));
    }

    #[test]
    fn test_invalid_limits_are_rejected() {
        let config = ImportConfig {
            max_title_length: 2,
            ..ImportConfig::default()
        };
        let err = ImportNormalizer::new(config).err().unwrap();
        assert!(matches!(
            err,
            ImportError::Config(ConfigError::Invalid { key: "max_title_length", .. })
        ));

        let config = ImportConfig {
            max_state_length: 0,
            ..ImportConfig::default()
        };
        assert!(ImportNormalizer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_conversion_failure_skips_later_steps() {
        let rehoster = Arc::new(CountingRehoster::default());
        let normalizer = normalizer(ImportConfig::default())
            .with_converter(Arc::new(FailingConverter))
            .with_rehoster(rehoster.clone());

        let err = normalizer
            .normalize(markdown_request("x.md", "text"))
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Conversion(ConversionError::Failed(_))));
        assert_eq!(rehoster.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_codec_failure_propagates() {
        let err = normalizer(ImportConfig::default())
            .with_codec(Arc::new(FailingCodec))
            .normalize(markdown_request("x.md", "text"))
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Codec(CodecError::EncodeError(_))));
    }

    #[tokio::test]
    async fn test_state_decodes_to_normalized_text() {
        let normalizer = normalizer(ImportConfig::default());
        let result = normalizer
            .normalize(markdown_request("d.md", "# Title\n\nline<br>break costs $5"))
            .await
            .unwrap();

        let tree = YrsStateCodec.decode(&result.state).unwrap();
        assert_eq!(tree.block_types(), vec!["paragraph"]);
        assert_eq!(tree.blocks[0].data["text"], "line<br>break costs $5");
    }
}
