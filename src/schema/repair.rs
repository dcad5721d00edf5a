// src/schema/repair.rs
//! Deterministic repair of schema-invalid stage output.
//!
//! Rules, applied in order (each idempotent):
//! 1. missing required scalar → context-derived default
//! 2. enum value outside the allowed set → schema default (logged)
//! 3. list length outside `[min, max]` → truncate / pad with synthesized elements
//! 4. missing positional element → move an existing one into place, else synthesize
//! 5. duplicate of a unique kind → keep the first occurrence
//!
//! Rule 3 runs once more after rule 5 so the result is a fixpoint. Truncation
//! keeps the earliest elements plus any anchor elements, and padding leaves room
//! for the anchors rule 4 is about to add.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{validate_map, ElementList, ElementTemplate, FieldRule, FieldSpec, Schema};
use crate::candidate::Candidate;

type Element = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Input was already valid.
    Unchanged,
    /// Input was an object and has been corrected.
    PartialRepair,
    /// Input was not an object at all; the result is synthesized from context.
    TotalFailure,
}

impl RepairOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairOutcome::Unchanged => "unchanged",
            RepairOutcome::PartialRepair => "partial_repair",
            RepairOutcome::TotalFailure => "total_failure",
        }
    }
}

/// Context the repair rules draw defaults from.
#[derive(Debug, Clone, Default)]
pub struct RepairContext {
    pub keyword: String,
    pub title: String,
    pub summary: String,
    pub topic: String,
}

impl RepairContext {
    pub fn new(keyword: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            title: title.into(),
            summary: String::new(),
            topic: String::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn for_candidate(c: &Candidate) -> Self {
        Self {
            keyword: c.primary_keyword(),
            title: c.title.trim().to_string(),
            summary: c.summary(600),
            topic: c.topic(),
        }
    }

    /// Fill `{keyword}`, `{title}`, `{summary}`, `{topic}` and `{n}`. Never empty.
    pub fn render(&self, template: &str, n: usize) -> String {
        let title = or_default(&self.title, "Untitled");
        let keyword = or_default(&self.keyword, title);
        let summary = or_default(&self.summary, title);
        let topic = or_default(&self.topic, "Other");
        let out = template
            .replace("{keyword}", keyword)
            .replace("{title}", title)
            .replace("{summary}", summary)
            .replace("{topic}", topic)
            .replace("{n}", &n.to_string());
        let out = out.trim();
        if out.is_empty() {
            title.to_string()
        } else {
            out.to_string()
        }
    }
}

fn or_default<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    let t = s.trim();
    if t.is_empty() {
        fallback
    } else {
        t
    }
}

/// Pull the JSON object out of raw model text: plain JSON, a fenced code block,
/// or the outermost `{...}` span inside prose.
pub fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re = RE_FENCE
        .get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)\s*```").expect("fence regex"));

    let trimmed = raw.trim();
    let body = re
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(body) {
        return Some(m);
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&body[start..=end]) {
        Ok(Value::Object(m)) => Some(m),
        _ => None,
    }
}

/// Parse and repair raw model text. Always returns a schema-valid structure.
pub fn repair(raw: &str, schema: &Schema, ctx: &RepairContext) -> (Value, RepairOutcome) {
    match extract_object(raw) {
        Some(map) => repair_value(Value::Object(map), schema, ctx),
        None => total_failure(schema, ctx, raw.len()),
    }
}

/// Repair an already-parsed value. Always returns a schema-valid structure.
pub fn repair_value(value: Value, schema: &Schema, ctx: &RepairContext) -> (Value, RepairOutcome) {
    let Value::Object(mut map) = value else {
        return total_failure(schema, ctx, 0);
    };

    let violations = validate_map(&map, schema);
    if violations.is_empty() {
        record(schema, RepairOutcome::Unchanged);
        return (Value::Object(map), RepairOutcome::Unchanged);
    }
    debug!(
        target: "repair",
        schema = schema.name,
        violations = violations.len(),
        first = %violations[0],
        "repairing stage output"
    );

    for rule in &schema.fields {
        repair_field(&mut map, rule, ctx, schema.name);
    }
    record(schema, RepairOutcome::PartialRepair);
    (Value::Object(map), RepairOutcome::PartialRepair)
}

/// Minimal valid structure built purely from context.
pub fn synthesize(schema: &Schema, ctx: &RepairContext) -> Value {
    let mut map = Map::new();
    for rule in &schema.fields {
        repair_field(&mut map, rule, ctx, schema.name);
    }
    Value::Object(map)
}

fn total_failure(schema: &Schema, ctx: &RepairContext, raw_len: usize) -> (Value, RepairOutcome) {
    warn!(
        target: "repair",
        schema = schema.name,
        raw_len,
        "output is not a JSON object; synthesizing from context"
    );
    record(schema, RepairOutcome::TotalFailure);
    (synthesize(schema, ctx), RepairOutcome::TotalFailure)
}

fn record(schema: &Schema, outcome: RepairOutcome) {
    counter!("schema_repairs_total", "schema" => schema.name, "outcome" => outcome.as_str())
        .increment(1);
}

fn repair_field(map: &mut Map<String, Value>, rule: &FieldRule, ctx: &RepairContext, schema: &str) {
    match &rule.spec {
        FieldSpec::Text { fallback } => {
            let fixed = coerce_text(map.get(rule.name)).unwrap_or_else(|| {
                debug!(target: "repair", schema, field = rule.name, "filling missing text");
                ctx.render(fallback, 1)
            });
            map.insert(rule.name.to_string(), Value::String(fixed));
        }
        FieldSpec::Enum { allowed, default } => {
            let current = map.get(rule.name);
            let fixed = match current.and_then(Value::as_str).and_then(|s| canonical(s, allowed)) {
                Some(c) => c,
                None => {
                    warn!(
                        target: "repair",
                        schema,
                        field = rule.name,
                        value = ?current,
                        default = *default,
                        "enum value outside allowed set"
                    );
                    *default
                }
            };
            map.insert(rule.name.to_string(), Value::String(fixed.to_string()));
        }
        FieldSpec::Strings {
            min,
            max,
            fallbacks,
            unique,
        } => {
            let fixed = repair_strings(map.remove(rule.name), *min, *max, fallbacks, *unique, ctx);
            map.insert(
                rule.name.to_string(),
                Value::Array(fixed.into_iter().map(Value::String).collect()),
            );
        }
        FieldSpec::Elements(list) => {
            let fixed = repair_elements(map.remove(rule.name), list, ctx, schema);
            map.insert(
                rule.name.to_string(),
                Value::Array(fixed.into_iter().map(Value::Object).collect()),
            );
        }
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Exact match, else a loose match ignoring case, punctuation and a `_section` suffix.
fn canonical(value: &str, allowed: &[&'static str]) -> Option<&'static str> {
    let v = value.trim();
    if let Some(exact) = allowed.iter().copied().find(|a| *a == v) {
        return Some(exact);
    }
    let key = enum_key(v);
    allowed.iter().copied().find(|a| enum_key(a) == key)
}

fn enum_key(s: &str) -> String {
    let lower = s.to_lowercase();
    let stem = lower
        .strip_suffix("_section")
        .or_else(|| lower.strip_suffix(" section"))
        .unwrap_or(&lower);
    stem.chars().filter(|c| c.is_alphanumeric()).collect()
}

// ---------------------------------------------------------------
// String lists
// ---------------------------------------------------------------

fn repair_strings(
    items: Option<Value>,
    min: usize,
    max: usize,
    fallbacks: &[&str],
    unique: bool,
    ctx: &RepairContext,
) -> Vec<String> {
    let mut out: Vec<String> = match items {
        Some(Value::Array(a)) => a
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        // Models sometimes answer with a comma-separated string.
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    out.truncate(max);
    pad_strings(&mut out, min, fallbacks, ctx);
    if unique {
        let mut seen: Vec<String> = Vec::with_capacity(out.len());
        out.retain(|s| {
            let key = s.to_lowercase();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
        pad_strings(&mut out, min, fallbacks, ctx);
    }
    out
}

fn pad_strings(out: &mut Vec<String>, min: usize, fallbacks: &[&str], ctx: &RepairContext) {
    let base = fallbacks.first().copied().unwrap_or("{keyword}");
    let mut templates = fallbacks.iter();
    let mut n = 1;
    while out.len() < min {
        let next = match templates.next() {
            Some(t) => ctx.render(t, n),
            None => format!("{} {n}", ctx.render(base, n)),
        };
        n += 1;
        let key = next.to_lowercase();
        if !out.iter().any(|s| s.to_lowercase() == key) {
            out.push(next);
        }
    }
}

// ---------------------------------------------------------------
// Element lists
// ---------------------------------------------------------------

fn repair_elements(
    items: Option<Value>,
    list: &ElementList,
    ctx: &RepairContext,
    schema: &str,
) -> Vec<Element> {
    let raw = match items {
        Some(Value::Array(a)) => a,
        Some(_) => {
            debug!(target: "repair", schema, "element list is not an array; rebuilding");
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut elems: Vec<Element> = Vec::with_capacity(raw.len());
    for v in raw {
        match v {
            Value::Object(m) => elems.push(m),
            other => debug!(target: "repair", schema, element = %other, "dropping non-object element"),
        }
    }

    // Rules 1 and 2 inside each element.
    for i in 0..elems.len() {
        let kind = normalize_kind(&mut elems[i], list, schema);
        let ordinal = elems[..i].iter().filter(|e| kind_of(e, list) == kind).count() + 1;
        fill_fields(&mut elems[i], kind, ordinal, list, ctx);
    }

    fit_cardinality(&mut elems, list, ctx);
    place_anchors(&mut elems, list, ctx);
    drop_duplicates(&mut elems, list);
    fit_cardinality(&mut elems, list, ctx);
    elems
}

fn kind_of(e: &Element, list: &ElementList) -> &'static str {
    let current = e.get(list.kind_field).and_then(Value::as_str);
    list.kinds
        .iter()
        .copied()
        .find(|k| Some(*k) == current)
        .unwrap_or(list.default_kind)
}

fn normalize_kind(e: &mut Element, list: &ElementList, schema: &str) -> &'static str {
    let current = e.get(list.kind_field);
    let kind = match current.and_then(Value::as_str).and_then(|s| canonical(s, list.kinds)) {
        Some(k) => k,
        None => {
            warn!(
                target: "repair",
                schema,
                value = ?current,
                default = list.default_kind,
                "element kind outside allowed set"
            );
            list.default_kind
        }
    };
    e.insert(list.kind_field.to_string(), Value::String(kind.to_string()));
    kind
}

fn template_for<'a>(list: &'a ElementList, kind: &str, ordinal: usize) -> Option<&'a ElementTemplate> {
    let matching: Vec<&ElementTemplate> = list.templates.iter().filter(|t| t.kind == kind).collect();
    if matching.is_empty() {
        None
    } else {
        Some(matching[(ordinal.saturating_sub(1)) % matching.len()])
    }
}

fn fill_fields(e: &mut Element, kind: &str, ordinal: usize, list: &ElementList, ctx: &RepairContext) {
    let template = template_for(list, kind, ordinal);
    for (field, fallback) in list.fields {
        if let Some(text) = coerce_text(e.get(*field)) {
            e.insert(field.to_string(), Value::String(text));
            continue;
        }
        let tpl = template
            .and_then(|t| t.fields.iter().find(|(f, _)| f == field))
            .map(|(_, t)| *t)
            .unwrap_or(fallback);
        e.insert(field.to_string(), Value::String(ctx.render(tpl, ordinal)));
    }
}

fn synth_element(list: &ElementList, kind: &'static str, ordinal: usize, ctx: &RepairContext) -> Element {
    let mut e = Element::new();
    e.insert(list.kind_field.to_string(), Value::String(kind.to_string()));
    fill_fields(&mut e, kind, ordinal, list, ctx);
    e
}

fn is_anchor_kind(list: &ElementList, kind: &str) -> bool {
    list.first == Some(kind) || list.last == Some(kind)
}

/// Rule 3.
fn fit_cardinality(elems: &mut Vec<Element>, list: &ElementList, ctx: &RepairContext) {
    if elems.len() > list.max {
        keep_earliest(elems, list);
    }

    let mut reserved = 0;
    for anchor in [list.first, list.last].into_iter().flatten() {
        if !elems.iter().any(|e| kind_of(e, list) == anchor) {
            reserved += 1;
        }
    }
    let target = list.min.saturating_sub(reserved);
    while elems.len() < target {
        let ordinal = elems
            .iter()
            .filter(|e| kind_of(e, list) == list.default_kind)
            .count()
            + 1;
        let filler = synth_element(list, list.default_kind, ordinal, ctx);
        let before_last = match (list.last, elems.last()) {
            (Some(last), Some(tail)) => kind_of(tail, list) == last,
            _ => false,
        };
        let at = if before_last { elems.len() - 1 } else { elems.len() };
        elems.insert(at, filler);
    }
}

/// Keeps the earliest `max` elements. The leading and trailing anchor
/// elements always stay, wherever they sit, so rule 4 can still place them.
fn keep_earliest(elems: &mut Vec<Element>, list: &ElementList) {
    let n = elems.len();
    let mut keep = vec![false; n];
    let mut slots = list.max;

    let lead = list
        .first
        .and_then(|k| elems.iter().position(|e| kind_of(e, list) == k));
    let tail = list
        .last
        .and_then(|k| elems.iter().rposition(|e| kind_of(e, list) == k));
    for i in [lead, tail].into_iter().flatten() {
        if slots > 0 && !keep[i] {
            keep[i] = true;
            slots -= 1;
        }
    }

    // Ordinary elements first, spare anchor-kind copies only if room is left.
    for spare_anchor in [false, true] {
        for i in 0..n {
            if slots == 0 {
                break;
            }
            if !keep[i] && is_anchor_kind(list, kind_of(&elems[i], list)) == spare_anchor {
                keep[i] = true;
                slots -= 1;
            }
        }
    }

    debug!(target: "repair", from = n, to = list.max, "truncated element list");
    let mut i = 0;
    elems.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

/// Rule 4.
fn place_anchors(elems: &mut Vec<Element>, list: &ElementList, ctx: &RepairContext) {
    if let Some(first) = list.first {
        if elems.first().map(|e| kind_of(e, list)) != Some(first) {
            match elems.iter().position(|e| kind_of(e, list) == first) {
                Some(i) => {
                    let e = elems.remove(i);
                    elems.insert(0, e);
                    debug!(target: "repair", kind = first, from = i, "moved element to front");
                }
                None => {
                    elems.insert(0, synth_element(list, first, 1, ctx));
                    debug!(target: "repair", kind = first, "synthesized leading element");
                }
            }
        }
    }
    if let Some(last) = list.last {
        if elems.last().map(|e| kind_of(e, list)) != Some(last) {
            match elems.iter().rposition(|e| kind_of(e, list) == last) {
                Some(i) => {
                    let e = elems.remove(i);
                    elems.push(e);
                    debug!(target: "repair", kind = last, from = i, "moved element to end");
                }
                None => {
                    elems.push(synth_element(list, last, 1, ctx));
                    debug!(target: "repair", kind = last, "synthesized trailing element");
                }
            }
        }
    }
}

/// Rule 5. The anchored occurrence of a trailing kind is the one kept.
fn drop_duplicates(elems: &mut Vec<Element>, list: &ElementList) {
    for kind in list.unique.iter().copied() {
        let idx: Vec<usize> = elems
            .iter()
            .enumerate()
            .filter(|(_, e)| kind_of(e, list) == kind)
            .map(|(i, _)| i)
            .collect();
        if idx.len() < 2 {
            continue;
        }
        let tail_anchored = list.last == Some(kind)
            && elems.last().map(|e| kind_of(e, list)) == Some(kind);
        let keep = if tail_anchored { idx[idx.len() - 1] } else { idx[0] };
        debug!(target: "repair", kind, dropped = idx.len() - 1, "dropping duplicate elements");
        let mut i = 0;
        elems.retain(|e| {
            let cur = i;
            i += 1;
            kind_of(e, list) != kind || cur == keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{catalog, validate};
    use serde_json::json;

    fn ctx() -> RepairContext {
        RepairContext::new("B200 accelerator", "Nvidia unveils B200")
            .with_summary("Nvidia announced the B200 accelerator.")
            .with_topic("Hardware")
    }

    fn kinds(v: &Value) -> Vec<String> {
        v["sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["kind"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn empty_section_plan_gets_intro_min_body_and_conclusion() {
        let (v, outcome) = repair(r#"{"h1": "B200", "sections": []}"#, catalog::section_plan(), &ctx());
        assert_eq!(outcome, RepairOutcome::PartialRepair);
        assert_eq!(
            kinds(&v),
            vec!["introduction", "body", "body", "body", "conclusion"]
        );
        assert!(v["sections"][1]["heading"]
            .as_str()
            .unwrap()
            .contains("B200 accelerator"));
        assert!(validate(&v, catalog::section_plan()).is_empty());
    }

    #[test]
    fn misplaced_anchors_are_moved_not_replaced() {
        let raw = json!({
            "h1": "B200",
            "sections": [
                {"kind": "conclusion", "heading": "Wrap-up by the model", "purpose": "p"},
                {"kind": "body", "heading": "b1", "purpose": "p"},
                {"kind": "faq", "heading": "faq one", "purpose": "p"},
                {"kind": "Introduction", "heading": "Opening by the model", "purpose": "p"},
                {"kind": "faq", "heading": "faq two", "purpose": "p"},
                {"kind": "body_section", "heading": "b2", "purpose": "p"}
            ]
        });
        let (v, outcome) = repair_value(raw, catalog::section_plan(), &ctx());
        assert_eq!(outcome, RepairOutcome::PartialRepair);
        let k = kinds(&v);
        assert_eq!(k.first().map(String::as_str), Some("introduction"));
        assert_eq!(k.last().map(String::as_str), Some("conclusion"));
        assert_eq!(k.iter().filter(|x| *x == "faq").count(), 1);
        assert_eq!(v["sections"][0]["heading"], json!("Opening by the model"));
        let n = v["sections"].as_array().unwrap().len();
        assert_eq!(v["sections"][n - 1]["heading"], json!("Wrap-up by the model"));
        assert!(v["sections"]
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["heading"] == json!("faq one")));
        assert!(validate(&v, catalog::section_plan()).is_empty());
    }

    #[test]
    fn truncation_keeps_earliest_middle_sections_in_order() {
        let mut sections = vec![json!({"kind": "introduction", "heading": "intro", "purpose": "p"})];
        sections.extend(
            (1..=12).map(|i| json!({"kind": "body", "heading": format!("b{i}"), "purpose": "p"})),
        );
        sections.push(json!({"kind": "conclusion", "heading": "end", "purpose": "p"}));
        let (v, outcome) = repair_value(
            json!({"h1": "x", "sections": sections}),
            catalog::section_plan(),
            &ctx(),
        );
        assert_eq!(outcome, RepairOutcome::PartialRepair);
        let headings: Vec<&str> = v["sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["heading"].as_str().unwrap())
            .collect();
        assert_eq!(
            headings,
            vec!["intro", "b1", "b2", "b3", "b4", "b5", "b6", "b7", "b8", "end"]
        );
    }

    #[test]
    fn oversized_plan_keeps_earliest_bodies_and_model_conclusion() {
        let mut sections: Vec<Value> = (1..=14)
            .map(|i| json!({"kind": "body", "heading": format!("b{i}"), "purpose": "p"}))
            .collect();
        sections.push(json!({"kind": "conclusion", "heading": "model end", "purpose": "p"}));
        let (v, _) = repair_value(
            json!({"h1": "x", "sections": sections}),
            catalog::section_plan(),
            &ctx(),
        );
        let arr = v["sections"].as_array().unwrap();
        assert_eq!(arr.len(), catalog::MAX_SECTIONS);
        assert_eq!(arr[0]["kind"], json!("introduction"));
        assert_eq!(arr[1]["heading"], json!("b1"));
        assert_eq!(arr[arr.len() - 1]["heading"], json!("model end"));
        assert!(validate(&v, catalog::section_plan()).is_empty());
    }

    #[test]
    fn enum_values_fall_back_to_schema_default() {
        let raw = r#"{"importance": "Very Important", "topic": "hardware", "primary_keyword": "", "reasoning": 42}"#;
        let (v, outcome) = repair(raw, catalog::filter_verdict(), &ctx());
        assert_eq!(outcome, RepairOutcome::PartialRepair);
        assert_eq!(v["importance"], json!("Boring"));
        assert_eq!(v["topic"], json!("Hardware"));
        assert_eq!(v["primary_keyword"], json!("Nvidia unveils B200"));
        assert_eq!(v["reasoning"], json!("42"));
    }

    #[test]
    fn prose_is_total_failure_with_valid_synthesis() {
        let (v, outcome) = repair(
            "I'm sorry, I cannot help with that.",
            catalog::section_plan(),
            &ctx(),
        );
        assert_eq!(outcome, RepairOutcome::TotalFailure);
        assert!(validate(&v, catalog::section_plan()).is_empty());

        let (v, outcome) = repair("[1, 2, 3]", catalog::tags(), &ctx());
        assert_eq!(outcome, RepairOutcome::TotalFailure);
        assert_eq!(v["tags"], json!(["B200 accelerator"]));
    }

    #[test]
    fn fenced_valid_json_is_unchanged() {
        let raw = "Here you go:\n```json\n{\"tags\": [\"AI\", \"Chips\"]}\n```";
        let (v, outcome) = repair(raw, catalog::tags(), &ctx());
        assert_eq!(outcome, RepairOutcome::Unchanged);
        assert_eq!(v["tags"], json!(["AI", "Chips"]));
    }

    #[test]
    fn tags_are_deduplicated_case_insensitively_and_capped() {
        let mut tags: Vec<String> = vec!["AI".into(), "ai".into(), " Chips ".into()];
        tags.extend((0..12).map(|i| format!("t{i}")));
        let (v, _) = repair_value(json!({ "tags": tags }), catalog::tags(), &ctx());
        let out = v["tags"].as_array().unwrap();
        assert!(out.len() <= catalog::MAX_TAGS);
        assert_eq!(out[0], json!("AI"));
        assert_eq!(out[1], json!("Chips"));
        assert!(validate(&v, catalog::tags()).is_empty());

        let (v, _) = repair_value(json!({ "tags": "gpu, datacenter" }), catalog::tags(), &ctx());
        assert_eq!(v["tags"], json!(["gpu", "datacenter"]));
    }

    #[test]
    fn repair_is_total_and_idempotent_over_malformed_inputs() {
        let schemas = [
            catalog::filter_verdict(),
            catalog::section_plan(),
            catalog::article(),
            catalog::tags(),
        ];
        let inputs = [
            "",
            "null",
            "{}",
            r#"{"sections": "none"}"#,
            r#"{"sections": [1, "two", null, {"kind": 7}]}"#,
            r#"{"sections": [{"kind": "faq"}, {"kind": "faq"}, {"kind": "faq"}]}"#,
            r#"{"tags": [null, "", "  "]}"#,
            r#"{"importance": null, "topic": ["x"], "body_md": {"a": 1}}"#,
            "```\n{\"title_tag\": \"ok\"}\n```",
        ];
        for schema in schemas {
            for raw in inputs {
                let (v, _) = repair(raw, schema, &ctx());
                assert!(
                    validate(&v, schema).is_empty(),
                    "{} not valid after repair of {raw:?}: {:?}",
                    schema.name,
                    validate(&v, schema)
                );
                let (again, outcome) = repair_value(v.clone(), schema, &ctx());
                assert_eq!(outcome, RepairOutcome::Unchanged);
                assert_eq!(again, v);
            }
        }
    }
}
