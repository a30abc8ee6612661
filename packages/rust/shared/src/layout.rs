//! Listing-page layout schema.
//!
//! A [`ListingLayout`] names, for each page-context field, how to get from the
//! article's link on a listing page to the value: pick an anchor element whose
//! `href` equals the link, walk a list of [`Step`]s, then [`Take`] text or an
//! attribute. Layouts can be overridden from the `[listing]` config section.

use serde::{Deserialize, Serialize};

use crate::error::{PressfeatError, Result};

/// One navigation step away from the current element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Move to the parent element.
    Parent,
    /// Move to the nearest ancestor matching `selector`.
    Closest { selector: String },
    /// Move to the previous element sibling.
    PrevSibling,
    /// Move to the next element sibling.
    NextSibling,
    /// Move to the first descendant matching `selector`.
    Find { selector: String },
}

/// What to read from the element reached by the steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Take {
    /// All descendant text, trimmed.
    Text,
    /// The named attribute.
    Attr { name: String },
}

/// How to resolve a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Selector for candidate anchors; the first candidate whose `href`
    /// equals the article link is used.
    pub anchor: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    pub take: Take,
}

/// The four page-context fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRules {
    pub date: FieldRule,
    pub time: FieldRule,
    pub summary: FieldRule,
    pub img: FieldRule,
}

/// Field → rule map for a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingLayout {
    pub fields: FieldRules,
}

impl Default for ListingLayout {
    /// The PR Newswire listing layout.
    ///
    /// Date and time live in the element preceding the release link's
    /// great-grandparent; the summary is the element after the link's
    /// parent; the thumbnail is the first `img` under the first element
    /// linking to the article.
    fn default() -> Self {
        let release = ".news-release".to_string();
        let meta_block = |class: &str| FieldRule {
            anchor: release.clone(),
            steps: vec![
                Step::Parent,
                Step::Parent,
                Step::Parent,
                Step::PrevSibling,
                Step::Find {
                    selector: class.to_string(),
                },
            ],
            take: Take::Text,
        };

        Self {
            fields: FieldRules {
                date: meta_block(".date"),
                time: meta_block(".time"),
                summary: FieldRule {
                    anchor: release.clone(),
                    steps: vec![Step::Parent, Step::NextSibling],
                    take: Take::Text,
                },
                img: FieldRule {
                    anchor: "[href]".into(),
                    steps: vec![Step::Find {
                        selector: "img".into(),
                    }],
                    take: Take::Attr { name: "src".into() },
                },
            },
        }
    }
}

impl ListingLayout {
    /// Iterate `(field name, rule)` pairs.
    pub fn rules(&self) -> [(&'static str, &FieldRule); 4] {
        [
            ("date", &self.fields.date),
            ("time", &self.fields.time),
            ("summary", &self.fields.summary),
            ("img", &self.fields.img),
        ]
    }

    /// Structural checks that do not need an HTML engine.
    ///
    /// Selector syntax is checked when the layout is compiled by the
    /// extractor.
    pub fn validate(&self) -> Result<()> {
        for (field, rule) in self.rules() {
            if rule.anchor.trim().is_empty() {
                return Err(PressfeatError::validation(format!(
                    "listing field `{field}`: anchor selector is empty"
                )));
            }
            for step in &rule.steps {
                if let Step::Closest { selector } | Step::Find { selector } = step {
                    if selector.trim().is_empty() {
                        return Err(PressfeatError::validation(format!(
                            "listing field `{field}`: step selector is empty"
                        )));
                    }
                }
            }
            if let Take::Attr { name } = &rule.take {
                if name.trim().is_empty() {
                    return Err(PressfeatError::validation(format!(
                        "listing field `{field}`: attribute name is empty"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        ListingLayout::default().validate().expect("default layout");
    }

    #[test]
    fn layout_parses_from_toml() {
        let toml_str = r#"
[fields.date]
anchor = ".news-release"
steps = [{ op = "closest", selector = ".row" }, { op = "find", selector = ".date" }]
take = { kind = "text" }

[fields.time]
anchor = ".news-release"
steps = [{ op = "closest", selector = ".row" }, { op = "find", selector = ".time" }]
take = { kind = "text" }

[fields.summary]
anchor = ".news-release"
steps = [{ op = "parent" }, { op = "next_sibling" }]
take = { kind = "text" }

[fields.img]
anchor = "a"
steps = [{ op = "find", selector = "img" }]
take = { kind = "attr", name = "data-src" }
"#;
        let layout: ListingLayout = toml::from_str(toml_str).expect("parse layout");
        layout.validate().expect("valid");
        assert_eq!(
            layout.fields.date.steps[0],
            Step::Closest {
                selector: ".row".into()
            }
        );
        assert_eq!(
            layout.fields.img.take,
            Take::Attr {
                name: "data-src".into()
            }
        );
    }

    #[test]
    fn empty_attribute_name_rejected() {
        let mut layout = ListingLayout::default();
        layout.fields.img.take = Take::Attr { name: " ".into() };
        let err = layout.validate().unwrap_err();
        assert!(err.to_string().contains("`img`"));
    }
}
