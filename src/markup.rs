use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::matcher::Query;

pub const HIGHLIGHT_OPEN: &str = r#"<span class="search-highlight">"#;
pub const HIGHLIGHT_CLOSE: &str = "</span>";
const BULLET: &str = "• ";

static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").expect("valid link pattern"));

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("invalid highlight pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// One piece of section content after the restricted markdown pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment<'a> {
    Text(&'a str),
    Link { label: &'a str, target: &'a str },
    Bullet,
    LineBreak,
}

/// Splits content into links, bullet markers, line breaks and plain text.
///
/// Links are recognised first, then a `*` followed by whitespace at the start
/// of a line, then newlines. Links never span lines.
pub fn parse_restricted_markdown(content: &str) -> Vec<Fragment<'_>> {
    let mut fragments = Vec::new();
    for (line_no, line) in content.split('\n').enumerate() {
        if line_no > 0 {
            fragments.push(Fragment::LineBreak);
        }
        let mut rest = line;
        if let Some(after) = line.strip_prefix('*') {
            if after.starts_with(char::is_whitespace) {
                fragments.push(Fragment::Bullet);
                rest = after.trim_start();
            }
        }
        push_links(rest, &mut fragments);
    }
    fragments
}

fn push_links<'a>(line: &'a str, fragments: &mut Vec<Fragment<'a>>) {
    let mut last = 0;
    for caps in LINK_PATTERN.captures_iter(line) {
        let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        if whole.start() > last {
            fragments.push(Fragment::Text(&line[last..whole.start()]));
        }
        fragments.push(Fragment::Link {
            label: label.as_str(),
            target: target.as_str(),
        });
        last = whole.end();
    }
    if last < line.len() {
        fragments.push(Fragment::Text(&line[last..]));
    }
}

/// Marks every case-insensitive occurrence of a query.
#[derive(Debug, Clone)]
pub struct Highlighter {
    pattern: Regex,
}

impl Highlighter {
    pub fn new(query: &Query) -> Result<Self, HighlightError> {
        let pattern = RegexBuilder::new(&regex::escape(query.as_str()))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern })
    }

    /// HTML-escapes `text`, wrapping matches in highlight markers.
    pub fn highlight(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 32);
        let mut last = 0;
        for found in self.pattern.find_iter(text) {
            out.push_str(&escape_html(&text[last..found.start()]));
            out.push_str(HIGHLIGHT_OPEN);
            out.push_str(&escape_html(found.as_str()));
            out.push_str(HIGHLIGHT_CLOSE);
            last = found.end();
        }
        out.push_str(&escape_html(&text[last..]));
        out
    }

    /// Converts the restricted markdown subset to markup, then highlights
    /// text and link labels. Link targets are never highlighted.
    pub fn highlight_markdown(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len() + 64);
        for fragment in parse_restricted_markdown(content) {
            match fragment {
                Fragment::Text(text) => out.push_str(&self.highlight(text)),
                Fragment::Link { label, target } if is_safe_target(target) => {
                    out.push_str(r#"<a href=""#);
                    out.push_str(&escape_html(target));
                    out.push_str(r#"" target="_blank" rel="noopener">"#);
                    out.push_str(&self.highlight(label));
                    out.push_str("</a>");
                }
                Fragment::Link { label, .. } => out.push_str(&self.highlight(label)),
                Fragment::Bullet => out.push_str(&self.highlight(BULLET)),
                Fragment::LineBreak => out.push_str("<br>"),
            }
        }
        out
    }
}

pub(crate) fn is_safe_target(target: &str) -> bool {
    let scheme: String = target
        .trim_start()
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(11)
        .collect();
    !scheme.to_ascii_lowercase().starts_with("javascript:")
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
