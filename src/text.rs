// src/text.rs
//! Text helpers shared by fingerprinting, prompts and publishing.

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Normalize free text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Title form used for content fingerprints: normalized, lowercased, trailing
/// sentence punctuation removed.
pub fn normalize_title(title: &str) -> String {
    let mut out = normalize_text(title).to_lowercase();
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',' | ':' | ';') {
            out.pop();
        } else {
            break;
        }
    }
    out.trim_end().to_string()
}

/// URL-safe slug: lowercase ASCII letters, digits and single hyphens, at most 80 chars.
/// Returns an empty string when nothing usable remains.
pub fn slugify(title: &str) -> String {
    static RE_DROP: OnceCell<Regex> = OnceCell::new();
    static RE_SEP: OnceCell<Regex> = OnceCell::new();
    let re_drop = RE_DROP.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").expect("slug regex"));
    let re_sep = RE_SEP.get_or_init(|| Regex::new(r"[\s-]+").expect("slug sep regex"));

    let lower = normalize_text(title).to_lowercase();
    let kept = re_drop.replace_all(&lower, "");
    let joined = re_sep.replace_all(kept.trim(), "-");
    let mut slug: String = joined.trim_matches('-').chars().take(80).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Hex SHA-256 of `input`.
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Single line, collapsed whitespace, capped at `max` chars (char boundary safe).
pub fn one_line(input: &str, max: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max).collect();
    if let Some(pos) = cut.rfind(' ') {
        if pos > max / 2 {
            cut.truncate(pos);
        }
    }
    cut.trim_end().to_string()
}
