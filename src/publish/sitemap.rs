// src/publish/sitemap.rs
use html_escape::encode_text;

use super::index::PublishedArticleSummary;

pub const SITEMAP_FILE: &str = "sitemap.xml";

/// `sitemap.xml` for the home page plus every indexed article.
pub fn render_sitemap(base_url: &str, articles: &[PublishedArticleSummary]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    out.push_str(&format!(
        "  <url><loc>{}/</loc><changefreq>hourly</changefreq><priority>1.0</priority></url>\n",
        encode_text(base)
    ));
    for a in articles {
        out.push_str(&format!(
            "  <url><loc>{}/{}</loc><lastmod>{}</lastmod><priority>0.8</priority></url>\n",
            encode_text(base),
            encode_text(a.link.trim_start_matches('/')),
            a.published_at.format("%Y-%m-%d"),
        ));
    }
    out.push_str("</urlset>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn lists_home_and_articles() {
        let a = PublishedArticleSummary {
            id: "1".into(),
            title: "T".into(),
            link: "articles/q-a.html".into(),
            published_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            summary_short: String::new(),
            image_url: None,
            topic: "Other".into(),
            is_breaking: false,
            tags: vec![],
            trend_score: 0.0,
        };
        let xml = render_sitemap("https://news.example/", &[a]);
        assert!(xml.contains("<loc>https://news.example/</loc>"));
        assert!(xml.contains("<loc>https://news.example/articles/q-a.html</loc><lastmod>2025-03-01</lastmod>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }
}
