// src/schema/catalog.rs
//! Schema descriptors for every AI-backed stage.

use once_cell::sync::Lazy;

use super::{ElementList, ElementTemplate, FieldRule, FieldSpec, Schema};

pub const IMPORTANCE_LEVELS: &[&str] = &["Breaking", "Interesting", "Boring"];

pub const TOPICS: &[&str] = &[
    "AI Models",
    "Hardware",
    "Software",
    "Ethics",
    "Society",
    "Business",
    "Startups",
    "Regulation",
    "Robotics",
    "Research",
    "Open Source",
    "Health",
    "Finance",
    "Art & Media",
    "Compute",
    "Other",
];

pub const SECTION_KINDS: &[&str] = &["introduction", "body", "faq", "conclusion"];

/// Lower bound on total sections: introduction + 3 body sections + conclusion.
pub const MIN_SECTIONS: usize = 5;
pub const MAX_SECTIONS: usize = 10;
pub const MAX_TAGS: usize = 10;

static FILTER_VERDICT: Lazy<Schema> = Lazy::new(|| Schema {
    name: "filter_verdict",
    fields: vec![
        FieldRule {
            name: "importance",
            spec: FieldSpec::Enum {
                allowed: IMPORTANCE_LEVELS,
                default: "Boring",
            },
        },
        FieldRule {
            name: "topic",
            spec: FieldSpec::Enum {
                allowed: TOPICS,
                default: "Other",
            },
        },
        FieldRule {
            name: "primary_keyword",
            spec: FieldSpec::Text { fallback: "{title}" },
        },
        FieldRule {
            name: "reasoning",
            spec: FieldSpec::Text {
                fallback: "No reasoning returned for {title}.",
            },
        },
    ],
});

static SECTION_PLAN: Lazy<Schema> = Lazy::new(|| Schema {
    name: "section_plan",
    fields: vec![
        FieldRule {
            name: "h1",
            spec: FieldSpec::Text {
                fallback: "{keyword}: An In-Depth Analysis",
            },
        },
        FieldRule {
            name: "sections",
            spec: FieldSpec::Elements(ElementList {
                min: MIN_SECTIONS,
                max: MAX_SECTIONS,
                kind_field: "kind",
                kinds: SECTION_KINDS,
                default_kind: "body",
                fields: &[
                    ("heading", "{keyword}"),
                    ("purpose", "Cover the essentials of {keyword}."),
                ],
                first: Some("introduction"),
                last: Some("conclusion"),
                unique: &["introduction", "faq", "conclusion"],
                templates: &[
                    ElementTemplate {
                        kind: "introduction",
                        fields: &[
                            ("heading", "Understanding {keyword}: What You Need to Know"),
                            (
                                "purpose",
                                "Introduce {keyword}, why it matters now and what the article covers.",
                            ),
                        ],
                    },
                    ElementTemplate {
                        kind: "body",
                        fields: &[
                            ("heading", "Key Features and Capabilities of {keyword}"),
                            ("purpose", "Detail the main facts and technical aspects of {keyword}."),
                        ],
                    },
                    ElementTemplate {
                        kind: "body",
                        fields: &[
                            ("heading", "Real-World Impact of {keyword}"),
                            ("purpose", "Explore how {keyword} is used and who it affects."),
                        ],
                    },
                    ElementTemplate {
                        kind: "body",
                        fields: &[
                            ("heading", "Challenges and Outlook for {keyword}"),
                            ("purpose", "Discuss limitations and the likely next steps for {keyword}."),
                        ],
                    },
                    ElementTemplate {
                        kind: "faq",
                        fields: &[
                            ("heading", "Frequently Asked Questions about {keyword}"),
                            ("purpose", "Answer the most common reader questions about {keyword}."),
                        ],
                    },
                    ElementTemplate {
                        kind: "conclusion",
                        fields: &[
                            ("heading", "{keyword}: What Comes Next"),
                            ("purpose", "Summarize the main points and give a final perspective."),
                        ],
                    },
                ],
            }),
        },
    ],
});

static ARTICLE: Lazy<Schema> = Lazy::new(|| Schema {
    name: "article",
    fields: vec![
        FieldRule {
            name: "title_tag",
            spec: FieldSpec::Text { fallback: "{title}" },
        },
        FieldRule {
            name: "meta_description",
            spec: FieldSpec::Text {
                fallback: "{title}. Key facts about {keyword}.",
            },
        },
        FieldRule {
            name: "body_md",
            spec: FieldSpec::Text { fallback: "{summary}" },
        },
    ],
});

static TAGS: Lazy<Schema> = Lazy::new(|| Schema {
    name: "tags",
    fields: vec![FieldRule {
        name: "tags",
        spec: FieldSpec::Strings {
            min: 1,
            max: MAX_TAGS,
            fallbacks: &["{keyword}", "{topic}"],
            unique: true,
        },
    }],
});

pub fn filter_verdict() -> &'static Schema {
    &FILTER_VERDICT
}

pub fn section_plan() -> &'static Schema {
    &SECTION_PLAN
}

pub fn article() -> &'static Schema {
    &ARTICLE
}

pub fn tags() -> &'static Schema {
    &TAGS
}
