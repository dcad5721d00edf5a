// src/schema/mod.rs
//! Declarative schemas for structured stage output, plus validation.
//!
//! A [`Schema`] describes one JSON object: required text fields, enum fields,
//! string lists and lists of kind-tagged elements with cardinality, positional
//! and uniqueness constraints. [`validate`] reports every violation; the
//! [`repair`] engine turns any input into a structure with zero violations.

pub mod catalog;
mod repair;

use std::fmt;

use serde_json::{Map, Value};

pub use repair::{extract_object, repair, repair_value, synthesize, RepairContext, RepairOutcome};

/// One object-level schema.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: Vec<FieldRule>,
}

#[derive(Debug)]
pub struct FieldRule {
    pub name: &'static str,
    pub spec: FieldSpec,
}

#[derive(Debug)]
pub enum FieldSpec {
    /// Required, non-empty string. `fallback` is a context template.
    Text { fallback: &'static str },
    /// String restricted to `allowed`; `default` replaces anything else.
    Enum {
        allowed: &'static [&'static str],
        default: &'static str,
    },
    /// List of non-empty strings within `[min, max]`.
    Strings {
        min: usize,
        max: usize,
        fallbacks: &'static [&'static str],
        unique: bool,
    },
    /// List of objects tagged by a kind field.
    Elements(ElementList),
}

/// Constraints for a list of kind-tagged objects (e.g. article sections).
///
/// Invariant: `max >= 2` when both `first` and `last` are set, and `min <= max`.
#[derive(Debug)]
pub struct ElementList {
    pub min: usize,
    pub max: usize,
    pub kind_field: &'static str,
    pub kinds: &'static [&'static str],
    /// Kind used for unknown values and for padding.
    pub default_kind: &'static str,
    /// Text fields every element must carry.
    pub fields: &'static [(&'static str, &'static str)],
    /// Element 0 must be of this kind.
    pub first: Option<&'static str>,
    /// The final element must be of this kind.
    pub last: Option<&'static str>,
    /// Kinds allowed at most once.
    pub unique: &'static [&'static str],
    /// Per-kind templates for synthesized elements. Several entries for one kind rotate.
    pub templates: &'static [ElementTemplate],
}

#[derive(Debug)]
pub struct ElementTemplate {
    pub kind: &'static str,
    pub fields: &'static [(&'static str, &'static str)],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single schema violation, addressed by a dotted/indexed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotAnObject,
    Missing {
        path: String,
    },
    WrongType {
        path: String,
        expected: &'static str,
    },
    BadEnum {
        path: String,
        value: String,
    },
    Cardinality {
        path: String,
        len: usize,
        min: usize,
        max: usize,
    },
    Position {
        path: String,
        index: usize,
        expected: &'static str,
    },
    Duplicate {
        path: String,
        index: usize,
        value: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotAnObject => write!(f, "input is not a JSON object"),
            Violation::Missing { path } => write!(f, "{path}: missing"),
            Violation::WrongType { path, expected } => write!(f, "{path}: expected {expected}"),
            Violation::BadEnum { path, value } => write!(f, "{path}: `{value}` not allowed"),
            Violation::Cardinality { path, len, min, max } => {
                write!(f, "{path}: length {len} outside [{min}, {max}]")
            }
            Violation::Position {
                path,
                index,
                expected,
            } => write!(f, "{path}[{index}]: expected kind `{expected}`"),
            Violation::Duplicate { path, index, value } => {
                write!(f, "{path}[{index}]: duplicate `{value}`")
            }
        }
    }
}

/// Report every violation of `schema` in `raw`. Unknown extra fields are ignored.
pub fn validate(raw: &Value, schema: &Schema) -> Vec<Violation> {
    match raw.as_object() {
        Some(map) => validate_map(map, schema),
        None => vec![Violation::NotAnObject],
    }
}

pub(crate) fn validate_map(map: &Map<String, Value>, schema: &Schema) -> Vec<Violation> {
    let mut out = Vec::new();
    for rule in &schema.fields {
        validate_field(map, rule, &mut out);
    }
    out
}

fn validate_field(map: &Map<String, Value>, rule: &FieldRule, out: &mut Vec<Violation>) {
    let path = rule.name.to_string();
    let value = map.get(rule.name);
    match &rule.spec {
        FieldSpec::Text { .. } => check_text(value, path, out),
        FieldSpec::Enum { allowed, .. } => match value {
            None | Some(Value::Null) => out.push(Violation::Missing { path }),
            Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
            Some(Value::String(s)) => out.push(Violation::BadEnum {
                path,
                value: s.clone(),
            }),
            Some(_) => out.push(Violation::WrongType {
                path,
                expected: "string",
            }),
        },
        FieldSpec::Strings {
            min, max, unique, ..
        } => {
            let Some(items) = value.and_then(Value::as_array) else {
                out.push(missing_or_type(value, path, "array"));
                return;
            };
            if items.len() < *min || items.len() > *max {
                out.push(Violation::Cardinality {
                    path: path.clone(),
                    len: items.len(),
                    min: *min,
                    max: *max,
                });
            }
            let mut seen: Vec<String> = Vec::new();
            for (i, it) in items.iter().enumerate() {
                let p = format!("{path}[{i}]");
                match it.as_str().map(str::trim) {
                    Some("") => out.push(Violation::Missing { path: p }),
                    Some(s) => {
                        let key = s.to_lowercase();
                        if *unique && seen.contains(&key) {
                            out.push(Violation::Duplicate {
                                path: path.clone(),
                                index: i,
                                value: s.to_string(),
                            });
                        }
                        seen.push(key);
                    }
                    None => out.push(Violation::WrongType {
                        path: p,
                        expected: "string",
                    }),
                }
            }
        }
        FieldSpec::Elements(list) => {
            let Some(items) = value.and_then(Value::as_array) else {
                out.push(missing_or_type(value, path, "array"));
                return;
            };
            validate_elements(items, list, &path, out);
        }
    }
}

fn validate_elements(items: &[Value], list: &ElementList, path: &str, out: &mut Vec<Violation>) {
    if items.len() < list.min || items.len() > list.max {
        out.push(Violation::Cardinality {
            path: path.to_string(),
            len: items.len(),
            min: list.min,
            max: list.max,
        });
    }

    let mut kinds: Vec<Option<&str>> = Vec::with_capacity(items.len());
    for (i, it) in items.iter().enumerate() {
        let p = format!("{path}[{i}]");
        let Some(obj) = it.as_object() else {
            out.push(Violation::WrongType {
                path: p,
                expected: "object",
            });
            kinds.push(None);
            continue;
        };
        let kp = format!("{p}.{}", list.kind_field);
        match obj.get(list.kind_field) {
            Some(Value::String(k)) if list.kinds.contains(&k.as_str()) => {
                kinds.push(Some(k.as_str()))
            }
            Some(Value::String(k)) => {
                out.push(Violation::BadEnum {
                    path: kp,
                    value: k.clone(),
                });
                kinds.push(None);
            }
            other => {
                out.push(missing_or_type(other, kp, "string"));
                kinds.push(None);
            }
        }
        for (field, _) in list.fields {
            check_text(obj.get(*field), format!("{p}.{field}"), out);
        }
    }

    if let Some(first) = list.first {
        if kinds.first().copied().flatten() != Some(first) {
            out.push(Violation::Position {
                path: path.to_string(),
                index: 0,
                expected: first,
            });
        }
    }
    if let Some(last) = list.last {
        if kinds.last().copied().flatten() != Some(last) {
            out.push(Violation::Position {
                path: path.to_string(),
                index: items.len().saturating_sub(1),
                expected: last,
            });
        }
    }
    for kind in list.unique {
        for (i, _) in kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == Some(*kind))
            .skip(1)
        {
            out.push(Violation::Duplicate {
                path: path.to_string(),
                index: i,
                value: kind.to_string(),
            });
        }
    }
}

fn check_text(value: Option<&Value>, path: String, out: &mut Vec<Violation>) {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(Value::String(_)) | Some(Value::Null) | None => out.push(Violation::Missing { path }),
        Some(_) => out.push(Violation::WrongType {
            path,
            expected: "string",
        }),
    }
}

fn missing_or_type(value: Option<&Value>, path: String, expected: &'static str) -> Violation {
    match value {
        None | Some(Value::Null) => Violation::Missing { path },
        Some(_) => Violation::WrongType { path, expected },
    }
}
