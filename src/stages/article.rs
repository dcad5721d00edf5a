// src/stages/article.rs
use serde_json::{json, Value};

use super::{candidate_brief, Stage};
use crate::ai::CompletionRequest;
use crate::candidate::{Candidate, StageName};
use crate::schema::{catalog, Schema};
use crate::text::one_line;

pub struct ArticleStage;

impl ArticleStage {
    fn headings(c: &Candidate) -> Vec<String> {
        c.results
            .get(StageName::Outline)
            .and_then(|v| v.get("sections"))
            .and_then(Value::as_array)
            .map(|secs| {
                secs.iter()
                    .filter_map(|s| s.get("heading").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Stage for ArticleStage {
    fn name(&self) -> StageName {
        StageName::Article
    }

    fn schema(&self) -> &'static Schema {
        catalog::article()
    }

    fn build_request(&self, c: &Candidate) -> CompletionRequest {
        let system = "You write clear, factual news articles in Markdown. Use only facts from the \
                      source text. Return ONLY a JSON object with keys: title_tag (<= 60 chars), \
                      meta_description (<= 155 chars), body_md (Markdown, one `##` heading per \
                      planned section, in order)."
            .to_string();
        let plan = c
            .results
            .get(StageName::Outline)
            .map(Value::to_string)
            .unwrap_or_default();
        let user = format!(
            "{}Primary keyword: {}\nSection plan: {}\n",
            candidate_brief(c, 6_000),
            c.primary_keyword(),
            plan
        );
        CompletionRequest {
            stage: self.name(),
            system,
            user,
        }
    }

    /// Assembled from the outline headings and the source text.
    fn fallback(&self, c: &Candidate) -> Option<Value> {
        let text = c.summary(4_000);
        let headings = Self::headings(c);
        let mut body = String::new();
        if headings.is_empty() {
            body.push_str(&text);
        } else {
            let paragraphs = split_evenly(&text, headings.len());
            for (h, p) in headings.iter().zip(paragraphs) {
                body.push_str(&format!("## {h}\n\n"));
                if !p.is_empty() {
                    body.push_str(&p);
                    body.push_str("\n\n");
                }
            }
        }
        let title = c.title.trim();
        Some(json!({
            "title_tag": one_line(title, 60),
            "meta_description": one_line(if text.is_empty() { title } else { &text }, 155),
            "body_md": body.trim_end(),
        }))
    }

    fn tolerates_synthesized(&self) -> bool {
        false
    }
}

/// Split `text` on word boundaries into `parts` roughly equal chunks.
fn split_evenly(text: &str, parts: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if parts == 0 {
        return Vec::new();
    }
    let per = words.len().div_ceil(parts).max(1);
    let mut out: Vec<String> = words.chunks(per).map(|w| w.join(" ")).collect();
    out.resize(parts, String::new());
    out
}
