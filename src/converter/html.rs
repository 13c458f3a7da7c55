//! HTML to markdown conversion.
//!
//! A regex pass in the spirit of turndown: block elements become markdown
//! blocks, inline formatting becomes emphasis markers, and `<br>` tags are
//! kept verbatim for the importer's hard-break normalization.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Stand-in for `<br>` while the remaining tags are stripped.
const BR_PLACEHOLDER: char = '\u{E000}';
/// Delimits the index of an extracted `<pre>` block.
const PRE_PLACEHOLDER: char = '\u{E001}';

struct HtmlPatterns {
    dropped: Regex,
    comment: Regex,
    pre: Regex,
    whitespace: Regex,
    br: Regex,
    heading: Regex,
    strong: Regex,
    emphasis: Regex,
    strike: Regex,
    code: Regex,
    link: Regex,
    image: Regex,
    attr_src: Regex,
    attr_alt: Regex,
    ordered_list: Regex,
    list_item: Regex,
    blockquote: Regex,
    rule: Regex,
    block: Regex,
    tag: Regex,
    pre_marker: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("valid html pattern");
        HtmlPatterns {
            dropped: re(r"(?is)<(script|style|head|noscript)[^>]*>.*?</(?:script|style|head|noscript)>"),
            comment: re(r"(?s)<!--.*?-->"),
            pre: re(r"(?is)<pre[^>]*>(?:\s*<code[^>]*>)?(.*?)(?:</code>\s*)?</pre>"),
            whitespace: re(r"\s+"),
            br: re(r"(?i)<br\s*/?>"),
            heading: re(r"(?is)<h([1-6])(?:\s[^>]*)?>(.*?)</h[1-6]>"),
            strong: re(r"(?is)<(?:strong|b)(?:\s[^>]*)?>(.*?)</(?:strong|b)>"),
            emphasis: re(r"(?is)<(?:em|i)(?:\s[^>]*)?>(.*?)</(?:em|i)>"),
            strike: re(r"(?is)<(?:s|del|strike)(?:\s[^>]*)?>(.*?)</(?:s|del|strike)>"),
            code: re(r"(?is)<code(?:\s[^>]*)?>(.*?)</code>"),
            link: re(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#),
            image: re(r"(?is)<img\s[^>]*>"),
            attr_src: re(r#"(?is)\ssrc\s*=\s*["']([^"']*)["']"#),
            attr_alt: re(r#"(?is)\salt\s*=\s*["']([^"']*)["']"#),
            ordered_list: re(r"(?is)<ol(?:\s[^>]*)?>(.*?)</ol>"),
            list_item: re(r"(?is)<li(?:\s[^>]*)?>(.*?)</li>"),
            blockquote: re(r"(?is)<blockquote(?:\s[^>]*)?>(.*?)</blockquote>"),
            rule: re(r"(?i)<hr\s*/?>"),
            block: re(r"(?i)</?(p|div|section|article|header|footer|main|aside|figure|figcaption|table|tr|ul|ol|body|html)(?:\s[^>]*)?>"),
            tag: re(r"<[^>]+>"),
            pre_marker: re("\u{E001}(\\d+)\u{E001}"),
            blank_lines: re(r"\n[ \t]*\n(?:[ \t]*\n)+"),
        }
    })
}

/// Convert an HTML document (or fragment) to markdown.
pub fn html_to_markdown(html: &str) -> String {
    let p = patterns();

    let text = p.dropped.replace_all(html, "");
    let text = p.comment.replace_all(&text, "");

    // Preformatted blocks keep their whitespace; park them until the end.
    let mut pre_blocks: Vec<String> = Vec::new();
    let text = p.pre.replace_all(&text, |caps: &Captures| {
        let code = strip_tags_and_decode(&caps[1]);
        pre_blocks.push(format!("```\n{}\n```", code.trim_matches('\n')));
        format!("{}{}{}", PRE_PLACEHOLDER, pre_blocks.len() - 1, PRE_PLACEHOLDER)
    });

    let text = p.whitespace.replace_all(&text, " ");
    let text = p.br.replace_all(&text, BR_PLACEHOLDER.to_string().as_str());

    let text = p.image.replace_all(&text, |caps: &Captures| {
        let tag = &caps[0];
        let src = p.attr_src.captures(tag).map(|c| c[1].to_string());
        let alt = p.attr_alt.captures(tag).map(|c| c[1].to_string()).unwrap_or_default();
        match src {
            Some(src) => format!("![{}]({})", alt, src),
            None => String::new(),
        }
    });
    let text = p.link.replace_all(&text, "[$2]($1)");
    let text = p.strong.replace_all(&text, "**$1**");
    let text = p.emphasis.replace_all(&text, "*$1*");
    let text = p.strike.replace_all(&text, "~~$1~~");
    let text = p.code.replace_all(&text, "`$1`");

    let text = p.heading.replace_all(&text, |caps: &Captures| {
        let level: usize = caps[1].parse().unwrap_or(1);
        format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
    });

    let text = p.ordered_list.replace_all(&text, |caps: &Captures| {
        let mut index = 0;
        let items = p.list_item.replace_all(&caps[1], |item: &Captures| {
            index += 1;
            format!("\n{}. {}", index, item[1].trim())
        });
        format!("\n\n{}\n\n", items.trim())
    });
    let text = p.list_item.replace_all(&text, |caps: &Captures| {
        format!("\n- {}", caps[1].trim())
    });

    let text = p.blockquote.replace_all(&text, |caps: &Captures| {
        let inner = p.block.replace_all(&caps[1], "\n");
        let quoted = inner
            .trim()
            .lines()
            .map(|line| format!("> {}", line.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\n\n{}\n\n", quoted)
    });

    let text = p.rule.replace_all(&text, "\n\n---\n\n");
    let text = p.block.replace_all(&text, "\n\n");
    let text = strip_tags_and_decode(&text);

    let text = p.pre_marker.replace_all(&text, |caps: &Captures| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|i| pre_blocks.get(i))
            .map(|block| format!("\n\n{}\n\n", block))
            .unwrap_or_default()
    });

    let text = text.replace(BR_PLACEHOLDER, "<br>");
    let text = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let text = p.blank_lines.replace_all(&text, "\n\n");

    text.trim().to_string()
}

fn strip_tags_and_decode(html: &str) -> String {
    let stripped = patterns().tag.replace_all(html, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}
