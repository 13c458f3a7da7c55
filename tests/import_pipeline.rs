use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use docimport_lib::attachments::NoopRehoster;
use docimport_lib::config::{AttachmentConfig, ImportConfig};
use docimport_lib::converter::ConversionError;
use docimport_lib::document::{StateCodec, YrsStateCodec};
use docimport_lib::importer::normalize::normalize_formatting;
use docimport_lib::{Actor, ImportError, ImportNormalizer, ImportRequest, ImportScope};
use tempfile::TempDir;

fn config_with_assets(dir: &Path) -> ImportConfig {
    ImportConfig {
        attachments: AttachmentConfig {
            assets_dir: dir.to_path_buf(),
            fetch_remote: false,
            ..AttachmentConfig::default()
        },
        ..ImportConfig::default()
    }
}

fn normalizer_in(dir: &TempDir) -> ImportNormalizer {
    ImportNormalizer::new(config_with_assets(dir.path())).unwrap()
}

fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

#[tokio::test]
async fn test_markdown_upload_end_to_end() {
    let dir = TempDir::new().unwrap();
    let request = ImportRequest::new(
        Actor::new("ada"),
        "text/markdown",
        "plan.md",
        "# Launch Plan\n\nBudget is $100 <br> per **day****s**.\n\n- ship\n- celebrate\n",
    );

    let result = normalizer_in(&dir).normalize(request).await.unwrap();

    assert_eq!(result.title, "Launch Plan");
    assert_eq!(result.emoji, None);
    assert_eq!(
        result.text,
        "Budget is \\$100 \\n per **days**.\n\n- ship\n- celebrate"
    );

    let tree = YrsStateCodec.decode(&result.state).unwrap();
    assert_eq!(tree.block_types(), vec!["paragraph", "list"]);
    assert_eq!(tree.blocks[0].data["text"], "Budget is $100 <br> per <b>days</b>.");
}

#[tokio::test]
async fn test_html_upload_end_to_end() {
    let dir = TempDir::new().unwrap();
    let html = "<html><body><h1>Weekly &amp; Notes</h1><p>line one<br>line two</p></body></html>";
    let request = ImportRequest::new(Actor::new("ada"), "text/html", "weekly.html", html.as_bytes().to_vec());

    let result = normalizer_in(&dir).normalize(request).await.unwrap();

    assert_eq!(result.title, "Weekly & Notes");
    assert_eq!(result.text, "line one\\nline two");
}

#[tokio::test]
async fn test_emoji_title_and_fallback() {
    let dir = TempDir::new().unwrap();
    let request = ImportRequest::new(Actor::new("ada"), "text/plain", "notes.txt", "😀 Hello world");

    let result = normalizer_in(&dir).normalize(request).await.unwrap();

    assert_eq!(result.emoji.as_deref(), Some("😀"));
    assert!(!result.text.starts_with('😀'));
    assert_eq!(result.text, "Hello world");
    assert_eq!(result.title, "notes");
}

#[tokio::test]
async fn test_unknown_extension_title_fallback() {
    let request = ImportRequest::new(
        Actor::new("ada"),
        "text/plain",
        "notes.docx",
        "No heading in here.",
    );
    let normalizer = ImportNormalizer::new(ImportConfig::default())
        .unwrap()
        .with_rehoster(Arc::new(NoopRehoster));

    let result = normalizer.normalize(request).await.unwrap();
    assert_eq!(result.title, "notes");
}

#[tokio::test]
async fn test_long_multibyte_title_truncated() {
    let dir = TempDir::new().unwrap();
    let normalizer = normalizer_in(&dir);
    let max = normalizer.config().max_title_length;
    let heading: String = "日本語のタイトル".chars().cycle().take(max + 50).collect();
    let request = ImportRequest::new(
        Actor::new("ada"),
        "text/markdown",
        "long.md",
        format!("# {}\n\nBody", heading),
    );

    let result = normalizer.normalize(request).await.unwrap();

    assert!(result.title.chars().count() <= max);
    assert!(result.title.ends_with("..."));
    assert!(heading.starts_with(result.title.trim_end_matches("...")));
    assert_eq!(result.text, "Body");
}

#[tokio::test]
async fn test_embedded_image_rehosted() {
    let dir = TempDir::new().unwrap();
    let actor = Actor::new("ada");
    let payload = base64::engine::general_purpose::STANDARD.encode(b"\x89PNG fake image");
    let body = format!("Diagram:\n\n![arch](data:image/png;base64,{})", payload);
    let request = ImportRequest::new(actor.clone(), "text/markdown", "arch.md", body)
        .with_ip("203.0.113.7")
        .with_scope(ImportScope::new());

    let result = normalizer_in(&dir).normalize(request).await.unwrap();

    let prefix = format!("![arch](/api/attachments/{}/", actor.id);
    assert!(result.text.contains(&prefix), "text: {}", result.text);
    assert!(!result.text.contains("data:image"));
    // Image plus its metadata sidecar.
    assert_eq!(count_files(&dir.path().join(actor.id.to_string())), 2);
}

#[tokio::test]
async fn test_oversized_state_rejected_without_writes() {
    let dir = TempDir::new().unwrap();
    let config = ImportConfig {
        max_state_length: 512,
        ..config_with_assets(dir.path())
    };
    let normalizer = ImportNormalizer::new(config).unwrap();
    let body = format!("# Big Report\n\n{}", "Quarterly numbers and commentary. ".repeat(200));
    let request = ImportRequest::new(Actor::new("ada"), "text/markdown", "report.md", body);

    let err = normalizer.normalize(request).await.unwrap_err();

    assert!(err.is_content_too_large());
    assert_eq!(
        err.to_string(),
        "The document \"Big Report\" is too large to import, please reduce the length and try again"
    );
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn test_unsupported_format_propagates() {
    let dir = TempDir::new().unwrap();
    let request = ImportRequest::new(
        Actor::new("ada"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "notes.docx",
        vec![0x50, 0x4b, 0x03, 0x04],
    );

    let err = normalizer_in(&dir).normalize(request).await.unwrap_err();

    assert!(!err.is_content_too_large());
    assert!(matches!(
        err,
        ImportError::Conversion(ConversionError::UnsupportedMimeType(_))
    ));
}

#[tokio::test]
async fn test_concurrent_imports_are_independent() {
    let dir = TempDir::new().unwrap();
    let normalizer = Arc::new(normalizer_in(&dir));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let normalizer = normalizer.clone();
            tokio::spawn(async move {
                let request = ImportRequest::new(
                    Actor::new("ada"),
                    "text/markdown",
                    format!("doc-{}.md", i),
                    format!("# Doc {}\n\nBody {}", i, i),
                );
                normalizer.normalize(request).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.title, format!("Doc {}", i));
        assert_eq!(result.text, format!("Body {}", i));
    }
}

#[test]
fn test_formatting_normalization_is_idempotent() {
    let input = "$100 <br> text a****b____c <BR> \\$ kept";
    let once = normalize_formatting(input);
    assert_eq!(once, "\\$100 \\n text abc \\n \\$ kept");
    assert_eq!(normalize_formatting(&once), once);
}

#[test]
fn test_result_serializes_for_clients() {
    let result = docimport_lib::ImportResult {
        emoji: Some("📝".to_string()),
        text: "Body".to_string(),
        title: "Notes".to_string(),
        state: vec![1, 2, 3],
    };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["title"], "Notes");
    assert_eq!(json["emoji"], "📝");
    assert_eq!(json["state"], "AQID");
}
