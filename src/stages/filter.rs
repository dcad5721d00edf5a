// src/stages/filter.rs
//! Editorial triage: importance, topic, primary keyword.

use serde_json::Value;

use super::{candidate_brief, Stage, Verdict};
use crate::ai::CompletionRequest;
use crate::candidate::{Candidate, Importance, StageName};
use crate::schema::{catalog, Schema};

pub struct FilterStage;

impl Stage for FilterStage {
    fn name(&self) -> StageName {
        StageName::Filter
    }

    fn schema(&self) -> &'static Schema {
        catalog::filter_verdict()
    }

    fn build_request(&self, c: &Candidate) -> CompletionRequest {
        let system = format!(
            "You are the news editor of an AI and technology news site. Classify the story.\n\
             Return ONLY a JSON object with keys:\n\
             - importance: one of {levels}. Breaking = major release, large funding, regulation or \
             security incident. Interesting = notable but not urgent. Boring = minor, promotional or off-topic.\n\
             - topic: one of {topics}.\n\
             - primary_keyword: the 2-5 word search phrase this story is about.\n\
             - reasoning: one sentence.",
            levels = catalog::IMPORTANCE_LEVELS.join(", "),
            topics = catalog::TOPICS.join(", "),
        );
        CompletionRequest {
            stage: self.name(),
            system,
            user: candidate_brief(c, 1_500),
        }
    }

    /// A user pick's importance override wins over the model.
    fn evaluate(&self, c: &Candidate, result: &Value) -> Verdict {
        let importance = c.importance_override.or_else(|| {
            result
                .get("importance")
                .and_then(Value::as_str)
                .and_then(Importance::parse)
        });
        match importance {
            Some(Importance::Boring) | None => {
                Verdict::Reject(format!("importance={}", Importance::Boring.as_str()))
            }
            Some(_) => Verdict::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn boring_is_rejected_unless_overridden() {
        let c = Candidate::new("t", "l", "", Utc::now());
        let boring = json!({"importance": "Boring"});
        assert_eq!(
            FilterStage.evaluate(&c, &boring),
            Verdict::Reject("importance=Boring".into())
        );
        let pick = c.clone().with_importance_override(Importance::Interesting);
        assert_eq!(FilterStage.evaluate(&pick, &boring), Verdict::Continue);
        assert_eq!(
            FilterStage.evaluate(&c, &json!({"importance": "Breaking"})),
            Verdict::Continue
        );
    }

    #[test]
    fn filter_has_no_fallback() {
        let c = Candidate::new("t", "l", "", Utc::now());
        assert!(FilterStage.fallback(&c).is_none());
    }
}
