// src/stages/tags.rs
use serde_json::{json, Value};

use super::{candidate_brief, Stage};
use crate::ai::CompletionRequest;
use crate::candidate::{Candidate, StageName};
use crate::schema::{catalog, Schema};

pub struct TagsStage;

impl Stage for TagsStage {
    fn name(&self) -> StageName {
        StageName::Tags
    }

    fn schema(&self) -> &'static Schema {
        catalog::tags()
    }

    fn build_request(&self, c: &Candidate) -> CompletionRequest {
        let system = format!(
            "You tag news articles. Return ONLY a JSON object {{\"tags\": [string]}} with 3 to \
             {} short, distinct tags (companies, products, technologies, themes).",
            catalog::MAX_TAGS
        );
        let user = format!(
            "{}Primary keyword: {}\nTopic: {}\n",
            candidate_brief(c, 1_000),
            c.primary_keyword(),
            c.topic()
        );
        CompletionRequest {
            stage: self.name(),
            system,
            user,
        }
    }

    fn fallback(&self, c: &Candidate) -> Option<Value> {
        Some(json!({ "tags": [c.primary_keyword(), c.topic()] }))
    }
}
