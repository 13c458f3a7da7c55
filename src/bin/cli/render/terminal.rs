use std::sync::OnceLock;

use docimport_lib::document::EditorBlock;
use docimport_lib::importer::ImportResult;
use regex::Regex;

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const STRIKETHROUGH: &str = "\x1b[9m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Title, emoji, state size and body of an import result
pub fn render_summary(result: &ImportResult, use_color: bool) -> String {
    let title = match &result.emoji {
        Some(emoji) => format!("{} {}", emoji, result.title),
        None => result.title.clone(),
    };
    let mut out = String::new();
    if use_color {
        out.push_str(&format!("{}{}{}\n", Color::BOLD, title, Color::RESET));
        out.push_str(&format!("{}{} bytes of state{}\n", Color::DIM, result.state.len(), Color::RESET));
    } else {
        out.push_str(&format!("{}\n", title));
        out.push_str(&format!("{} bytes of state\n", result.state.len()));
    }
    out.push('\n');
    out.push_str(&result.text);
    out.push('\n');
    out
}

/// Render editor blocks to terminal text
pub fn render_blocks(blocks: &[EditorBlock], use_color: bool) -> String {
    let mut lines = Vec::new();

    for block in blocks {
        let block_lines = render_block(block, use_color);
        if !block_lines.is_empty() {
            lines.extend(block_lines);
            lines.push(String::new());
        }
    }

    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn render_block(block: &EditorBlock, use_color: bool) -> Vec<String> {
    match block.block_type.as_str() {
        "header" => render_header(block, use_color),
        "list" => render_list(block),
        "checklist" => render_checklist(block, use_color),
        "code" => render_code(block, use_color),
        "quote" => render_quote(block, use_color),
        "table" => render_table(block),
        "callout" => render_callout(block, use_color),
        "image" => render_image(block),
        "delimiter" => vec!["~~~".to_string()],
        _ => render_text(block),
    }
}

fn text_field<'a>(block: &'a EditorBlock, key: &str) -> &'a str {
    block.data.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn render_text(block: &EditorBlock) -> Vec<String> {
    let text = text_field(block, "text");
    if text.is_empty() {
        return Vec::new();
    }
    wrap_lines(&html_to_text(text), 80)
}

fn render_header(block: &EditorBlock, use_color: bool) -> Vec<String> {
    let level = block.data.get("level").and_then(|v| v.as_u64()).unwrap_or(2);
    let hashes = "#".repeat(level as usize);
    let plain = html_to_text(text_field(block, "text"));

    if use_color {
        vec![format!("{}{} {}{}", Color::BOLD, hashes, plain, Color::RESET)]
    } else {
        vec![format!("{} {}", hashes, plain)]
    }
}

fn render_list(block: &EditorBlock) -> Vec<String> {
    let ordered = text_field(block, "style") == "ordered";
    let Some(items) = block.data.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| item.as_str())
        .enumerate()
        .map(|(i, item)| {
            let bullet = if ordered { format!("{}.", i + 1) } else { "\u{2022}".to_string() };
            format!("{} {}", bullet, html_to_text(item))
        })
        .collect()
}

fn render_checklist(block: &EditorBlock, use_color: bool) -> Vec<String> {
    let Some(items) = block.data.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| {
            let text = html_to_text(item.get("text").and_then(|v| v.as_str()).unwrap_or(""));
            let checked = item.get("checked").and_then(|v| v.as_bool()).unwrap_or(false);
            match (checked, use_color) {
                (true, true) => format!("[x] {}{}{}", Color::STRIKETHROUGH, text, Color::RESET),
                (true, false) => format!("[x] {}", text),
                (false, _) => format!("[ ] {}", text),
            }
        })
        .collect()
}

fn render_code(block: &EditorBlock, use_color: bool) -> Vec<String> {
    let (start, end) = if use_color { (Color::CYAN, Color::RESET) } else { ("", "") };
    let mut lines = vec![format!("{}```{}{}", start, text_field(block, "language"), end)];
    for line in text_field(block, "code").lines() {
        lines.push(format!("{}{}{}", start, line, end));
    }
    lines.push(format!("{}```{}", start, end));
    lines
}

fn render_quote(block: &EditorBlock, use_color: bool) -> Vec<String> {
    html_to_text(text_field(block, "text"))
        .lines()
        .map(|line| {
            if use_color {
                format!("{}\u{2502} {}{}", Color::DIM, line, Color::RESET)
            } else {
                format!("> {}", line)
            }
        })
        .collect()
}

fn render_table(block: &EditorBlock) -> Vec<String> {
    let with_headings = block.data.get("withHeadings").and_then(|v| v.as_bool()).unwrap_or(false);
    let Some(rows) = block.data.get("content").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let rows: Vec<Vec<String>> = rows
        .iter()
        .filter_map(|row| row.as_array())
        .map(|cells| cells.iter().map(|c| html_to_text(c.as_str().unwrap_or(""))).collect())
        .collect();

    let mut widths: Vec<usize> = Vec::new();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            let width = cell.chars().count().max(3);
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    let mut lines = Vec::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let parts: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(3)))
            .collect();
        lines.push(format!("\u{2502} {} \u{2502}", parts.join(" \u{2502} ")));

        if row_idx == 0 && with_headings {
            let sep: Vec<String> = widths.iter().map(|w| "\u{2500}".repeat(*w)).collect();
            lines.push(format!("\u{251c}\u{2500}{}\u{2500}\u{2524}", sep.join("\u{2500}\u{253c}\u{2500}")));
        }
    }
    lines
}

fn render_callout(block: &EditorBlock, use_color: bool) -> Vec<String> {
    let callout_type = text_field(block, "type");
    let (icon, color) = match callout_type {
        "warning" => ("[!]", Color::YELLOW),
        "danger" => ("[X]", Color::RED),
        "tip" | "success" => ("[*]", Color::GREEN),
        _ => ("[i]", Color::BLUE),
    };
    let (color, reset) = if use_color { (color, Color::RESET) } else { ("", "") };

    let title = html_to_text(text_field(block, "title"));
    let mut lines = vec![format!("{}{} {}{}", color, icon, title, reset)];
    for line in html_to_text(text_field(block, "content")).lines() {
        lines.push(format!("{}    {}{}", color, line, reset));
    }
    lines
}

fn render_image(block: &EditorBlock) -> Vec<String> {
    let url = block
        .data
        .get("file")
        .and_then(|v| v.get("url"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let caption = html_to_text(text_field(block, "caption"));

    if caption.is_empty() {
        vec![format!("[Image: {}]", url)]
    } else {
        vec![format!("[Image: {} - {}]", url, caption)]
    }
}

fn break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid br regex"))
}

/// Turn line breaks into newlines, then strip tags and decode entities
fn html_to_text(html: &str) -> String {
    let text = break_regex().replace_all(html, "\n");
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;

    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    html_escape::decode_html_entities(&result).to_string()
}

/// Simple word-wrapping for terminal output
fn wrap_lines(text: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use docimport_lib::document::build_tree;

    #[test]
    fn test_render_paragraph_with_line_break() {
        let tree = build_tree("first\\nsecond");
        assert_eq!(render_blocks(&tree.blocks, false), "first\nsecond");
    }

    #[test]
    fn test_render_mixed_blocks() {
        let tree = build_tree("## Plan\n\n- one\n- two\n\n> quoted");
        let out = render_blocks(&tree.blocks, false);
        assert!(out.contains("## Plan"));
        assert!(out.contains("\u{2022} one"));
        assert!(out.contains("> quoted"));
    }

    #[test]
    fn test_wrap_lines() {
        let lines = wrap_lines("aaa bbb ccc", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc"]);
    }
}
