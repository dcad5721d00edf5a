// src/publish/render.rs
//! Article page rendering.

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use once_cell::sync::OnceCell;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;
use serde_json::{json, Map, Value};

const ID_META: &str = "newsroom:candidate-id";
const MAX_LD_KEYWORDS: usize = 10;

pub struct PageInput<'a> {
    pub id: &'a str,
    pub title_tag: &'a str,
    pub meta_description: &'a str,
    pub h1: &'a str,
    pub body_md: &'a str,
    pub tags: &'a [String],
    pub source_link: &'a str,
    pub canonical_url: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub published_at: DateTime<Utc>,
}

/// Markdown → HTML. Raw HTML blocks from the model are dropped.
pub fn markdown_to_html(md: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(md, opts).filter(|ev| !matches!(ev, Event::Html(_)));
    let mut out = String::with_capacity(md.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn render_page(p: &PageInput<'_>) -> String {
    let mut head = String::new();
    head.push_str(&format!("<title>{}</title>\n", text(p.title_tag)));
    head.push_str(&format!(
        "<meta name=\"description\" content=\"{}\">\n",
        attr(p.meta_description)
    ));
    head.push_str(&format!("<meta name=\"{ID_META}\" content=\"{}\">\n", attr(p.id)));
    if let Some(url) = p.canonical_url {
        head.push_str(&format!("<link rel=\"canonical\" href=\"{}\">\n", attr(url)));
    }
    if let Some(img) = p.image_url {
        head.push_str(&format!("<meta property=\"og:image\" content=\"{}\">\n", attr(img)));
    }
    head.push_str(&format!(
        "<script type=\"application/ld+json\">{}</script>\n",
        structured_data(p)
    ));

    let tags: String = p
        .tags
        .iter()
        .map(|t| format!("<li>{}</li>", text(t)))
        .collect();

    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n{head}</head>\n<body>\n<article>\n\
         <h1>{h1}</h1>\n<time datetime=\"{ts}\">{date}</time>\n{body}\
         <ul class=\"tags\">{tags}</ul>\n\
         <p class=\"source\">Source: <a href=\"{src}\" rel=\"nofollow\">{src_text}</a></p>\n\
         </article>\n</body>\n</html>\n",
        h1 = text(p.h1),
        ts = p.published_at.to_rfc3339(),
        date = p.published_at.format("%Y-%m-%d"),
        body = markdown_to_html(p.body_md),
        src = attr(p.source_link),
        src_text = text(p.source_link),
    )
}

/// schema.org `NewsArticle` for the page head, safe to inline in a script tag.
pub fn structured_data(p: &PageInput<'_>) -> String {
    let published = p.published_at.to_rfc3339();
    let mut ld = Map::new();
    ld.insert("@context".into(), json!("https://schema.org"));
    ld.insert("@type".into(), json!("NewsArticle"));
    ld.insert("headline".into(), json!(p.h1));
    ld.insert("description".into(), json!(p.meta_description));
    ld.insert("datePublished".into(), json!(published));
    ld.insert("dateModified".into(), json!(published));
    ld.insert("isBasedOn".into(), json!(p.source_link));
    if let Some(url) = p.canonical_url {
        ld.insert("mainEntityOfPage".into(), json!({"@type": "WebPage", "@id": url}));
    }
    if let Some(img) = p.image_url.filter(|u| u.starts_with("http")) {
        ld.insert("image".into(), json!([{"@type": "ImageObject", "url": img}]));
    }
    let keywords: Vec<&str> = p
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(MAX_LD_KEYWORDS)
        .collect();
    if !keywords.is_empty() {
        ld.insert("keywords".into(), json!(keywords));
    }
    // `</` would close the script element early.
    Value::Object(ld).to_string().replace("</", "<\\/")
}

/// Candidate id embedded by [`render_page`], if any.
pub fn embedded_id(page: &str) -> Option<String> {
    static RE_ID: OnceCell<Regex> = OnceCell::new();
    let re = RE_ID.get_or_init(|| {
        Regex::new(r#"<meta name="newsroom:candidate-id" content="([^"]*)">"#).expect("id regex")
    });
    re.captures(page)
        .and_then(|c| c.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_embeds_id_and_escapes() {
        let tags = vec!["AI & ML".to_string()];
        let page = render_page(&PageInput {
            id: "abc123",
            title_tag: "Chips <fast>",
            meta_description: "Say \"hi\"",
            h1: "Chips",
            body_md: "## Part\n\nHello **world**\n\n<script>x</script>\n",
            tags: &tags,
            source_link: "https://src.example/a?b=1&c=2",
            canonical_url: Some("https://news.example/articles/chips.html"),
            image_url: None,
            published_at: Utc::now(),
        });
        assert_eq!(embedded_id(&page).as_deref(), Some("abc123"));
        assert!(page.contains("<title>Chips &lt;fast&gt;</title>"));
        assert!(page.contains("<h2>Part</h2>"));
        assert!(page.contains("<strong>world</strong>"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("AI &amp; ML"));
        assert!(page.contains("rel=\"canonical\""));
    }

    #[test]
    fn structured_data_describes_the_article() {
        let tags = vec!["Chips".to_string(), " ".to_string(), "Nvidia".to_string()];
        let input = PageInput {
            id: "abc123",
            title_tag: "Chips",
            meta_description: "New accelerator </script><b>",
            h1: "Nvidia unveils B200",
            body_md: "Body",
            tags: &tags,
            source_link: "https://src.example/a",
            canonical_url: Some("https://news.example/articles/b200.html"),
            image_url: Some("https://img.example/b200.png"),
            published_at: Utc::now(),
        };
        let ld = structured_data(&input);
        assert!(!ld.contains("</script>"));

        let v: Value = serde_json::from_str(&ld).unwrap();
        assert_eq!(v["@type"], json!("NewsArticle"));
        assert_eq!(v["headline"], json!("Nvidia unveils B200"));
        assert_eq!(v["description"], json!("New accelerator </script><b>"));
        assert_eq!(v["keywords"], json!(["Chips", "Nvidia"]));
        assert_eq!(
            v["mainEntityOfPage"]["@id"],
            json!("https://news.example/articles/b200.html")
        );
        assert_eq!(v["image"][0]["url"], json!("https://img.example/b200.png"));

        let page = render_page(&input);
        assert!(page.contains(&format!("<script type=\"application/ld+json\">{ld}</script>")));
    }
}
