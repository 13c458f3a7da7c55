//! Title extraction from a leading markdown heading.

use std::sync::OnceLock;

use regex::Regex;

/// Title found at the top of a document, plus the text that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    pub text: String,
}

pub trait TitleParser: Send + Sync {
    fn parse(&self, markdown: &str) -> ParsedTitle;
}

/// Reads the title from the first line, treating it as a `#` heading.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingTitleParser;

fn markdown_escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\([!-/:-@\[-`{-~])").expect("valid markdown escape regex")
    })
}

/// Remove markdown backslash escapes (`\*` -> `*`).
pub fn unescape_markdown(text: &str) -> String {
    markdown_escape_regex().replace_all(text, "$1").into_owned()
}

impl TitleParser for HeadingTitleParser {
    fn parse(&self, markdown: &str) -> ParsedTitle {
        let trimmed = markdown.trim();
        let (first_line, rest) = match trimmed.split_once('\n') {
            Some((first, rest)) => (first.trim_end_matches('\r'), rest),
            None => (trimmed, ""),
        };

        let heading = first_line.strip_prefix('#').unwrap_or(first_line).trim();

        ParsedTitle {
            title: unescape_markdown(heading),
            text: rest.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_heading() {
        let parsed = HeadingTitleParser.parse("# My Document\nBody");
        assert_eq!(parsed.title, "My Document");
        assert_eq!(parsed.text, "Body");
    }

    #[test]
    fn test_parse_heading_with_surrounding_whitespace() {
        let parsed = HeadingTitleParser.parse("\n\n  #   Spaced Out  \r\nBody\nMore");
        assert_eq!(parsed.title, "Spaced Out");
        assert_eq!(parsed.text, "Body\nMore");
    }

    #[test]
    fn test_parse_single_line() {
        let parsed = HeadingTitleParser.parse("# Only a title");
        assert_eq!(parsed.title, "Only a title");
        assert_eq!(parsed.text, "");
    }

    #[test]
    fn test_parse_unescapes_markdown() {
        let parsed = HeadingTitleParser.parse("# Price \\* \\[draft\\]\n");
        assert_eq!(parsed.title, "Price * [draft]");
    }

    #[test]
    fn test_parse_without_heading_marker_uses_first_line() {
        let parsed = HeadingTitleParser.parse("Plain first line\nrest");
        assert_eq!(parsed.title, "Plain first line");
    }

    #[test]
    fn test_unescape_leaves_plain_backslashes() {
        assert_eq!(unescape_markdown("C:\\temp"), "C:\\temp");
        assert_eq!(unescape_markdown("\\_x\\_"), "_x_");
    }
}
