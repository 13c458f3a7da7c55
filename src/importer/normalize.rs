//! Text normalization steps applied to converted markdown.
//!
//! Each step is a pure function of its input; the importer applies them in a
//! fixed order.

use std::sync::OnceLock;

use regex::{NoExpand, Regex, RegexSet};

use crate::title::TitleParser;

/// Appended to titles that had to be shortened.
pub const ELLIPSIS: &str = "...";
/// Title used when the file name has no usable stem.
pub const UNTITLED: &str = "Untitled";
/// Number of leading characters searched for a title emoji.
pub const EMOJI_SCAN_CHARS: usize = 10;
/// Hard-break token understood by the editor's markdown parser.
pub const HARD_BREAK: &str = "\\n";

fn emoji_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
              [\x{1F1E6}-\x{1F1FF}]{2}
            | [0-9\x23\x2A]\x{FE0F}?\x{20E3}
            | \p{Extended_Pictographic}
              (?:\x{FE0F}|\p{Emoji_Modifier})?
              [\x{E0020}-\x{E007F}]*
              (?:\x{200D}\p{Extended_Pictographic}(?:\x{FE0F}|\p{Emoji_Modifier})?)*
            ",
        )
        .expect("valid emoji regex")
    })
}

fn hard_break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br>").expect("valid br regex"))
}

/// Grapheme cluster break classes, in the order of [`break_class_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakClass {
    Cr,
    Lf,
    Control,
    Extend,
    Zwj,
    RegionalIndicator,
    Prepend,
    SpacingMark,
    L,
    V,
    T,
    Lv,
    Lvt,
    Other,
}

const BREAK_CLASSES: [BreakClass; 13] = [
    BreakClass::Cr,
    BreakClass::Lf,
    BreakClass::Control,
    BreakClass::Extend,
    BreakClass::Zwj,
    BreakClass::RegionalIndicator,
    BreakClass::Prepend,
    BreakClass::SpacingMark,
    BreakClass::L,
    BreakClass::V,
    BreakClass::T,
    BreakClass::Lv,
    BreakClass::Lvt,
];

fn break_class_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"^\p{gcb=CR}$",
            r"^\p{gcb=LF}$",
            r"^\p{gcb=Control}$",
            r"^\p{gcb=Extend}$",
            r"^\p{gcb=ZWJ}$",
            r"^\p{gcb=Regional_Indicator}$",
            r"^\p{gcb=Prepend}$",
            r"^\p{gcb=SpacingMark}$",
            r"^\p{gcb=L}$",
            r"^\p{gcb=V}$",
            r"^\p{gcb=T}$",
            r"^\p{gcb=LV}$",
            r"^\p{gcb=LVT}$",
        ])
        .expect("valid grapheme break classes")
    })
}

fn pictographic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\p{Extended_Pictographic}$").expect("valid pictographic regex"))
}

/// File name without its final extension (`notes.v2.docx` -> `notes.v2`).
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(pos) if pos + 1 < file_name.len() && !file_name[pos + 1..].contains('/') => {
            &file_name[..pos]
        }
        _ => file_name,
    }
}

/// Title derived from the file name, never empty.
pub fn title_from_file_name(file_name: &str) -> String {
    let stem = strip_extension(file_name).trim();
    if stem.is_empty() {
        UNTITLED.to_string()
    } else {
        stem.to_string()
    }
}

/// Find an emoji in the first characters of `text` and remove its first
/// occurrence from the text.
///
/// Returns the text and the emoji, if any. At most one emoji is extracted.
pub fn extract_emoji(text: &str) -> (String, Option<String>) {
    let head_end = text
        .char_indices()
        .nth(EMOJI_SCAN_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    match emoji_regex().find(&text[..head_end]) {
        Some(found) => {
            let emoji = found.as_str().to_string();
            (text.replacen(&emoji, "", 1), Some(emoji))
        }
        None => (text.to_string(), None),
    }
}

/// Promote a leading `# ` heading to the document title.
///
/// Returns the title and the trimmed text with the heading removed, or
/// `None` when the text does not open with a level-1 heading or the heading
/// is empty.
pub fn promote_heading(text: &str, parser: &dyn TitleParser) -> Option<(String, String)> {
    let trimmed = text.trim();
    if !trimmed.starts_with("# ") {
        return None;
    }

    let parsed = parser.parse(text);
    if parsed.title.trim().is_empty() {
        return None;
    }

    // The title is derived from user content and must be matched literally.
    // A parser that unescapes the heading yields a title that no longer
    // matches the source line; drop the line it consumed instead.
    let pattern = format!(r"#\s+{}", regex::escape(&parsed.title));
    let remainder = match Regex::new(&pattern) {
        Ok(heading) if heading.is_match(trimmed) => {
            heading.replace(trimmed, "").trim_start().to_string()
        }
        Ok(_) => parsed.text.trim_start().to_string(),
        Err(e) => {
            log::warn!("Could not build heading pattern, dropping parsed heading line: {}", e);
            parsed.text.trim_start().to_string()
        }
    };

    Some((parsed.title, remainder))
}

/// Replace `<br>` tags (any case) with the literal `\n` hard-break token.
pub fn normalize_hard_breaks(text: &str) -> String {
    hard_break_regex().replace_all(text, NoExpand(HARD_BREAK)).into_owned()
}

/// Escape `$` so it is never read as a math delimiter.
///
/// A `$` already preceded by a backslash is left as is.
pub fn escape_math_delimiters(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if c == '$' && previous != Some('\\') {
            escaped.push('\\');
        }
        escaped.push(c);
        previous = Some(c);
    }
    escaped
}

/// Remove `****` and `____` runs left by closed-and-reopened emphasis.
///
/// Repeats until none remain, since removing one run can join two halves of
/// another.
pub fn collapse_redundant_marks(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = current.replace("****", "").replace("____", "");
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Hard breaks, then math escaping, then mark collapse.
///
/// Collapsing marks can join the halves of a `<br>` tag, so breaks and marks
/// are normalized again until neither changes the text.
pub fn normalize_formatting(text: &str) -> String {
    let text = normalize_hard_breaks(text);
    let text = escape_math_delimiters(&text);
    let mut current = collapse_redundant_marks(&text);
    loop {
        let next = collapse_redundant_marks(&normalize_hard_breaks(&current));
        if next == current {
            return current;
        }
        current = next;
    }
}

fn break_class(c: char) -> BreakClass {
    let mut buf = [0u8; 4];
    break_class_set()
        .matches(c.encode_utf8(&mut buf))
        .iter()
        .next()
        .map(|i| BREAK_CLASSES[i])
        .unwrap_or(BreakClass::Other)
}

fn is_pictographic(c: char) -> bool {
    let mut buf = [0u8; 4];
    pictographic_regex().is_match(c.encode_utf8(&mut buf))
}

fn is_regional_indicator(c: char) -> bool {
    break_class(c) == BreakClass::RegionalIndicator
}

/// Whether cutting `text` at byte `cut` would split a user-perceived
/// character, following the extended grapheme cluster rules of UAX #29.
fn splits_cluster(text: &str, cut: usize) -> bool {
    use BreakClass::*;

    let (before, after) = text.split_at(cut);
    let (Some(prev), Some(next)) = (before.chars().next_back(), after.chars().next()) else {
        return false;
    };

    match (break_class(prev), break_class(next)) {
        (Cr, Lf) => true,
        (Cr | Lf | Control, _) | (_, Cr | Lf | Control) => false,
        (L, L | V | Lv | Lvt) | (Lv | V, V | T) | (Lvt | T, T) => true,
        (_, Extend | Zwj | SpacingMark) | (Prepend, _) => true,
        (Zwj, _) if is_pictographic(next) => {
            // Pictographic Extend* ZWJ x Pictographic
            before
                .chars()
                .rev()
                .skip(1)
                .find(|c| break_class(*c) != Extend)
                .map_or(false, is_pictographic)
        }
        (RegionalIndicator, RegionalIndicator) => {
            let run = before.chars().rev().take_while(|c| is_regional_indicator(*c)).count();
            run % 2 == 1
        }
        _ => false,
    }
}

/// Shorten `title` to at most `max_length` characters, ending in `...`.
///
/// Cuts fall on character-cluster boundaries and prefer the last word
/// boundary when one is reasonably close.
pub fn truncate_title(title: &str, max_length: usize) -> String {
    if title.chars().count() <= max_length {
        return title.to_string();
    }

    let budget = max_length.saturating_sub(ELLIPSIS.chars().count());
    if budget == 0 {
        return ELLIPSIS[..max_length.min(ELLIPSIS.len())].to_string();
    }
    let mut cut = title
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(title.len());

    while cut > 0 && splits_cluster(title, cut) {
        let step = title[..cut].chars().next_back().map(char::len_utf8).unwrap_or(1);
        cut -= step;
    }

    let at_word_boundary = title[cut..].starts_with(char::is_whitespace);
    if !at_word_boundary {
        if let Some(space) = title[..cut].rfind(char::is_whitespace) {
            if title[..space].chars().count() >= budget / 2 {
                cut = space;
            }
        }
    }

    format!("{}{}", title[..cut].trim_end(), ELLIPSIS)
}
