//! Markdown to block-tree conversion.
//!
//! Produces the block structure that the state codec stores. Inline
//! formatting is carried as the small HTML subset the editor understands
//! (`<b>`, `<i>`, `<code>`, `<a>`, `<br>`).

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use uuid::Uuid;

use super::models::{EditorBlock, EditorData};

/// Literal hard-break token written by the formatting normalizer.
const HARD_BREAK_TOKEN: &str = "\\n";

fn callout_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^\[!(\w+)\][ \t]*(.*)").expect("valid callout regex"))
}

/// Build the document tree for normalized markdown.
pub fn build_tree(markdown: &str) -> EditorData {
    EditorData::with_blocks(parse_markdown_to_blocks(markdown))
}

fn parse_markdown_to_blocks(markdown: &str) -> Vec<EditorBlock> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut blocks: Vec<EditorBlock> = Vec::new();
    let mut current_text = String::new();
    let mut in_code_block = false;
    let mut code_content = String::new();
    let mut code_language = String::new();
    let mut list_items: Vec<String> = Vec::new();
    let mut checklist_items: Vec<(String, bool)> = Vec::new();
    let mut is_ordered_list = false;
    let mut in_quote = false;
    let mut quote_text = String::new();
    let mut current_heading_level = 0;
    let mut in_table = false;
    let mut table_rows: Vec<Vec<String>> = Vec::new();
    let mut current_table_row: Vec<String> = Vec::new();
    let mut current_table_cell = String::new();
    let mut table_has_header = false;
    let mut current_image_url = String::new();
    let mut current_image_alt = String::new();
    let mut current_image_title = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush_paragraph(&mut blocks, &mut current_text);
                current_heading_level = heading_level_to_int(level);
            }
            Event::End(TagEnd::Heading(_)) => {
                if !current_text.is_empty() {
                    blocks.push(EditorBlock {
                        id: generate_block_id(),
                        block_type: "header".to_string(),
                        data: serde_json::json!({
                            "text": render_hard_breaks(current_text.trim()),
                            "level": current_heading_level
                        }),
                    });
                    current_text.clear();
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if in_quote {
                    if !quote_text.is_empty() {
                        quote_text.push('\n');
                    }
                    quote_text.push_str(current_text.trim());
                    current_text.clear();
                } else if !current_text.trim().is_empty() {
                    if let Some(items) = try_parse_checklist(&current_text) {
                        checklist_items.extend(items);
                        flush_checklist(&mut blocks, &mut checklist_items);
                        current_text.clear();
                    } else {
                        flush_paragraph(&mut blocks, &mut current_text);
                    }
                } else {
                    current_text.clear();
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                flush_paragraph(&mut blocks, &mut current_text);
                in_code_block = true;
                if let CodeBlockKind::Fenced(info) = kind {
                    code_language = info.split_whitespace().next().unwrap_or("").to_string();
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                blocks.push(EditorBlock {
                    id: generate_block_id(),
                    block_type: "code".to_string(),
                    data: serde_json::json!({
                        "code": code_content.trim_end(),
                        "language": code_language
                    }),
                });
                code_content.clear();
                code_language.clear();
            }
            Event::Start(Tag::List(first_item)) => {
                flush_paragraph(&mut blocks, &mut current_text);
                is_ordered_list = first_item.is_some();
            }
            Event::End(TagEnd::List(_)) => {
                if !checklist_items.is_empty() {
                    flush_checklist(&mut blocks, &mut checklist_items);
                } else if !list_items.is_empty() {
                    blocks.push(EditorBlock {
                        id: generate_block_id(),
                        block_type: "list".to_string(),
                        data: serde_json::json!({
                            "style": if is_ordered_list { "ordered" } else { "unordered" },
                            "items": list_items
                        }),
                    });
                    list_items.clear();
                }
            }
            Event::Start(Tag::Item) => {
                current_text.clear();
            }
            Event::End(TagEnd::Item) => {
                let text = render_hard_breaks(current_text.trim());
                if let Some((content, checked)) = parse_checklist_item(&text) {
                    checklist_items.push((content, checked));
                } else {
                    list_items.push(text);
                }
                current_text.clear();
            }
            Event::Start(Tag::BlockQuote) => {
                flush_paragraph(&mut blocks, &mut current_text);
                in_quote = true;
            }
            Event::End(TagEnd::BlockQuote) => {
                in_quote = false;
                if !quote_text.is_empty() {
                    blocks.push(quote_block(quote_text.trim()));
                    quote_text.clear();
                }
            }
            Event::Start(Tag::Strong) => current_text.push_str("<b>"),
            Event::End(TagEnd::Strong) => current_text.push_str("</b>"),
            Event::Start(Tag::Emphasis) => current_text.push_str("<i>"),
            Event::End(TagEnd::Emphasis) => current_text.push_str("</i>"),
            Event::Start(Tag::Strikethrough) => current_text.push_str("<s>"),
            Event::End(TagEnd::Strikethrough) => current_text.push_str("</s>"),
            Event::Code(text) => {
                // Backslashes inside code spans must survive hard-break rendering.
                current_text.push_str(&format!("<code>{}</code>", text.replace('\\', "&#92;")));
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                current_text.push_str(&format!("<a href=\"{}\">", dest_url));
            }
            Event::End(TagEnd::Link) => current_text.push_str("</a>"),
            Event::Text(text) => {
                if in_code_block {
                    code_content.push_str(&text);
                } else if in_table {
                    current_table_cell.push_str(&text);
                } else if !current_image_url.is_empty() {
                    current_image_alt.push_str(&text);
                } else {
                    current_text.push_str(&text);
                }
            }
            Event::SoftBreak => {
                if in_code_block {
                    code_content.push('\n');
                } else if in_quote {
                    current_text.push('\n');
                } else {
                    current_text.push(' ');
                }
            }
            Event::HardBreak => {
                if in_code_block {
                    code_content.push('\n');
                } else {
                    current_text.push_str("<br>");
                }
            }
            Event::Rule => {
                flush_paragraph(&mut blocks, &mut current_text);
                blocks.push(EditorBlock {
                    id: generate_block_id(),
                    block_type: "delimiter".to_string(),
                    data: serde_json::json!({}),
                });
            }
            Event::Start(Tag::Table(_)) => {
                flush_paragraph(&mut blocks, &mut current_text);
                in_table = true;
                table_rows.clear();
                table_has_header = false;
            }
            Event::End(TagEnd::Table) => {
                in_table = false;
                if !table_rows.is_empty() {
                    blocks.push(EditorBlock {
                        id: generate_block_id(),
                        block_type: "table".to_string(),
                        data: serde_json::json!({
                            "withHeadings": table_has_header,
                            "content": table_rows
                        }),
                    });
                }
                table_rows.clear();
            }
            Event::Start(Tag::TableHead) => {
                table_has_header = true;
                current_table_row.clear();
            }
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                if !current_table_row.is_empty() {
                    table_rows.push(std::mem::take(&mut current_table_row));
                }
            }
            Event::Start(Tag::TableRow) => current_table_row.clear(),
            Event::Start(Tag::TableCell) => current_table_cell.clear(),
            Event::End(TagEnd::TableCell) => {
                current_table_row.push(render_hard_breaks(current_table_cell.trim()));
                current_table_cell.clear();
            }
            Event::Start(Tag::Image { dest_url, title, .. }) => {
                flush_paragraph(&mut blocks, &mut current_text);
                current_image_url = dest_url.to_string();
                current_image_title = title.to_string();
                current_image_alt.clear();
            }
            Event::End(TagEnd::Image) => {
                if !current_image_url.is_empty() {
                    let caption = if current_image_alt.trim().is_empty() {
                        current_image_title.trim().to_string()
                    } else {
                        current_image_alt.trim().to_string()
                    };
                    blocks.push(EditorBlock {
                        id: generate_block_id(),
                        block_type: "image".to_string(),
                        data: serde_json::json!({
                            "file": {
                                "url": current_image_url
                            },
                            "caption": caption,
                            "withBorder": false,
                            "withBackground": false,
                            "stretched": false
                        }),
                    });
                    current_image_url.clear();
                    current_image_alt.clear();
                    current_image_title.clear();
                }
            }
            _ => {}
        }
    }

    flush_paragraph(&mut blocks, &mut current_text);

    blocks
}

fn heading_level_to_int(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Turn the literal `\n` token into an inline line break.
fn render_hard_breaks(text: &str) -> String {
    text.replace(HARD_BREAK_TOKEN, "<br>")
}

fn flush_paragraph(blocks: &mut Vec<EditorBlock>, text: &mut String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        blocks.push(EditorBlock {
            id: generate_block_id(),
            block_type: "paragraph".to_string(),
            data: serde_json::json!({
                "text": render_hard_breaks(trimmed)
            }),
        });
    }
    text.clear();
}

fn flush_checklist(blocks: &mut Vec<EditorBlock>, items: &mut Vec<(String, bool)>) {
    blocks.push(EditorBlock {
        id: generate_block_id(),
        block_type: "checklist".to_string(),
        data: serde_json::json!({
            "items": items.iter()
                .map(|(text, checked)| serde_json::json!({
                    "text": text,
                    "checked": checked
                }))
                .collect::<Vec<_>>()
        }),
    });
    items.clear();
}

/// A quote, or a callout when it opens with `[!TYPE]`.
fn quote_block(quote: &str) -> EditorBlock {
    let Some(caps) = callout_regex().captures(quote) else {
        return EditorBlock {
            id: generate_block_id(),
            block_type: "quote".to_string(),
            data: serde_json::json!({ "text": render_hard_breaks(quote) }),
        };
    };

    let callout_type = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let (title, content) = match rest.find('\n') {
        Some(pos) => (rest[..pos].trim().to_string(), rest[pos + 1..].trim().to_string()),
        None if rest.chars().count() < 50 => (rest.trim().to_string(), String::new()),
        None => (String::new(), rest.trim().to_string()),
    };

    let valid_type = match callout_type.as_str() {
        "info" | "warning" | "tip" | "danger" => callout_type,
        "caution" => "warning".to_string(),
        _ => "info".to_string(),
    };

    EditorBlock {
        id: generate_block_id(),
        block_type: "callout".to_string(),
        data: serde_json::json!({
            "type": valid_type,
            "title": render_hard_breaks(&title),
            "content": render_hard_breaks(&content)
        }),
    }
}

/// Parse a checklist item pattern: "[ ]" or "[x]" at the start
fn parse_checklist_item(text: &str) -> Option<(String, bool)> {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("[ ] ") {
        Some((rest.to_string(), false))
    } else if let Some(rest) = text.strip_prefix("[x] ").or_else(|| text.strip_prefix("[X] ")) {
        Some((rest.to_string(), true))
    } else {
        None
    }
}

/// Try to parse entire text as checklist items
fn try_parse_checklist(text: &str) -> Option<Vec<(String, bool)>> {
    let mut items = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("- [ ] ") {
            items.push((rest.to_string(), false));
        } else if let Some(rest) = line
            .strip_prefix("- [x] ")
            .or_else(|| line.strip_prefix("- [X] "))
        {
            items.push((rest.to_string(), true));
        } else if !line.is_empty() {
            return None;
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Short random block id in the Editor.js style.
fn generate_block_id() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(tree: &'a EditorData, block_type: &str) -> Option<&'a EditorBlock> {
        tree.blocks.iter().find(|b| b.block_type == block_type)
    }

    #[test]
    fn test_build_simple_tree() {
        let markdown = r#"# Hello World

This is a paragraph.

- Item 1
- Item 2

> A quote
"#;
        let tree = build_tree(markdown);
        let block_types = tree.block_types();

        assert!(block_types.contains(&"header"));
        assert!(block_types.contains(&"paragraph"));
        assert!(block_types.contains(&"list"));
        assert!(block_types.contains(&"quote"));
        assert_eq!(tree.version.as_deref(), Some("2.28.0"));
    }

    #[test]
    fn test_hard_break_token_becomes_line_break() {
        let tree = build_tree("first line\\nsecond line");
        let paragraph = find(&tree, "paragraph").unwrap();
        assert_eq!(paragraph.data["text"], "first line<br>second line");
    }

    #[test]
    fn test_escaped_dollar_renders_plain() {
        let tree = build_tree("costs \\$100");
        let paragraph = find(&tree, "paragraph").unwrap();
        assert_eq!(paragraph.data["text"], "costs $100");
    }

    #[test]
    fn test_code_span_keeps_backslash_n() {
        let tree = build_tree("use `printf(\"\\n\")` here");
        let text = find(&tree, "paragraph").unwrap().data["text"].as_str().unwrap().to_string();
        assert!(!text.contains("<br>"));
        assert!(text.contains("<code>"));
    }

    #[test]
    fn test_checklist() {
        let tree = build_tree("- [ ] Task 1\n- [x] Task 2\n");
        let checklist = find(&tree, "checklist").unwrap();
        let items = checklist.data["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["checked"], true);
    }

    #[test]
    fn test_code_block() {
        let markdown = "```rust\nfn main() {\n    println!(\"Hello\");\n}\n```\n";
        let tree = build_tree(markdown);
        let block = find(&tree, "code").unwrap();
        assert_eq!(block.data["language"], "rust");
        assert!(block.data["code"].as_str().unwrap().contains("fn main()"));
    }

    #[test]
    fn test_table() {
        let markdown = "| Name | Age |\n| --- | --- |\n| Alice | 30 |\n| Bob | 25 |\n";
        let tree = build_tree(markdown);
        let block = find(&tree, "table").unwrap();
        assert_eq!(block.data["withHeadings"], true);
        assert_eq!(block.data["content"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_callout() {
        let tree = build_tree("> [!WARNING] Be Careful\n> This is important information.\n");
        let block = find(&tree, "callout").unwrap();
        assert_eq!(block.data["type"], "warning");
        assert_eq!(block.data["title"], "Be Careful");
        assert_eq!(block.data["content"], "This is important information.");
    }

    #[test]
    fn test_ordered_list_and_rule() {
        let tree = build_tree("1. First\n2. Second\n\n---\n\nMore text\n");
        assert_eq!(find(&tree, "list").unwrap().data["style"], "ordered");
        assert!(find(&tree, "delimiter").is_some());
    }

    #[test]
    fn test_inline_formatting() {
        let tree = build_tree("This has **bold** and *italic* and [a link](https://example.com).");
        let text = find(&tree, "paragraph").unwrap().data["text"].as_str().unwrap().to_string();
        assert!(text.contains("<b>bold</b>"));
        assert!(text.contains("<i>italic</i>"));
        assert!(text.contains("<a href=\"https://example.com\">a link</a>"));
    }

    #[test]
    fn test_image() {
        let tree = build_tree("![Alt text](https://example.com/image.png)");
        let block = find(&tree, "image").unwrap();
        assert_eq!(block.data["file"]["url"], "https://example.com/image.png");
        assert_eq!(block.data["caption"], "Alt text");
        assert!(find(&tree, "paragraph").is_none());
    }

    #[test]
    fn test_heading_levels() {
        let tree = build_tree("# H1\n## H2\n### H3\n#### H4\n##### H5\n###### H6\n");
        let headers: Vec<_> = tree.blocks.iter().filter(|b| b.block_type == "header").collect();
        assert_eq!(headers.len(), 6);
        for (i, header) in headers.iter().enumerate() {
            assert_eq!(header.data["level"].as_u64().unwrap(), (i + 1) as u64);
        }
    }

    #[test]
    fn test_empty_markdown_has_no_blocks() {
        assert!(build_tree("").blocks.is_empty());
    }
}
