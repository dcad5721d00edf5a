// src/stages/outline.rs
use serde_json::Value;

use super::{candidate_brief, Stage};
use crate::ai::CompletionRequest;
use crate::candidate::{Candidate, StageName};
use crate::schema::{catalog, synthesize, RepairContext, Schema};

pub struct OutlineStage;

impl Stage for OutlineStage {
    fn name(&self) -> StageName {
        StageName::Outline
    }

    fn schema(&self) -> &'static Schema {
        catalog::section_plan()
    }

    fn build_request(&self, c: &Candidate) -> CompletionRequest {
        let system = format!(
            "You plan SEO-friendly news articles. Return ONLY a JSON object:\n\
             {{\"h1\": string, \"sections\": [{{\"kind\": string, \"heading\": string, \"purpose\": string}}]}}\n\
             Rules: {min}-{max} sections; kind is one of {kinds}; the first section is the \
             introduction and the last is the conclusion; at most one faq section.",
            min = catalog::MIN_SECTIONS,
            max = catalog::MAX_SECTIONS,
            kinds = catalog::SECTION_KINDS.join(", "),
        );
        let user = format!(
            "{}Primary keyword: {}\nTopic: {}\n",
            candidate_brief(c, 1_500),
            c.primary_keyword(),
            c.topic()
        );
        CompletionRequest {
            stage: self.name(),
            system,
            user,
        }
    }

    /// Introduction, three body sections and a conclusion built from the keyword.
    fn fallback(&self, c: &Candidate) -> Option<Value> {
        Some(synthesize(self.schema(), &RepairContext::for_candidate(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;
    use chrono::Utc;

    #[test]
    fn fallback_plan_is_valid() {
        let c = Candidate::new("Quantum chip milestone", "l", "", Utc::now());
        let plan = OutlineStage.fallback(&c).unwrap();
        assert!(validate(&plan, catalog::section_plan()).is_empty());
        assert_eq!(plan["sections"].as_array().unwrap().len(), catalog::MIN_SECTIONS);
    }
}
