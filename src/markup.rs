//! Plain-text rendering of the HTML fragments carried by posts and comments.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const HN_BASE: &str = "https://news.ycombinator.com/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub links: Vec<String>,
}

pub fn to_plain(html: &str) -> Rendered {
    static PARAGRAPH_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)</?p(\s[^>]*)?>").expect("valid paragraph regex"));
    static BREAK_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid break regex"));
    static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*"([^"]*)"[^>]*>(.*?)</a>"#).expect("valid anchor regex")
    });
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
    static BLANK_RUN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));

    if html.trim().is_empty() {
        return Rendered::default();
    }

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let text = PARAGRAPH_RE.replace_all(html, "\n\n");
    let text = BREAK_RE.replace_all(&text, "\n");
    let text = ANCHOR_RE.replace_all(&text, |caps: &Captures| {
        let href = absolute(&html_escape::decode_html_entities(&caps[1]));
        if !href.is_empty() && seen.insert(href.clone()) {
            links.push(href);
        }
        TAG_RE.replace_all(&caps[2], "").into_owned()
    });
    let text = TAG_RE.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);

    let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
    let text = BLANK_RUN_RE
        .replace_all(&trimmed.join("\n"), "\n\n")
        .trim()
        .to_string();

    Rendered { text, links }
}

fn absolute(href: &str) -> String {
    let href = href.trim();
    if href.starts_with("item?") || href.starts_with("user?") {
        return format!("{HN_BASE}{href}");
    }
    href.to_string()
}
