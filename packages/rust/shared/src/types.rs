//! Core domain types for the featurization pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pass identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// RawDocument
// ---------------------------------------------------------------------------

/// A scraped press release as handed over by the scraping stage.
///
/// Field aliases accept the scraper's export names (`_id`, `body_soup`,
/// `page_soup`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Headline, doubling as the unique document id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Canonical article URL.
    pub link: String,
    /// Listing the document was scraped from.
    pub source: String,
    /// Raw HTML of the article page.
    #[serde(alias = "body_soup")]
    pub body_html: String,
    /// Raw HTML of the listing page the article was linked from.
    #[serde(alias = "page_soup")]
    pub page_html: String,
}

// ---------------------------------------------------------------------------
// ArticleRecord / PageContext
// ---------------------------------------------------------------------------

/// Structured view of an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleRecord {
    pub authors: Vec<String>,
    pub body: String,
    pub keywords: Vec<String>,
    pub lang: Option<String>,
    pub meta_desc: Option<String>,
    pub source_url: Option<String>,
}

/// Per-article metadata found on the listing page.
///
/// Every field is independently `""` when it could not be located.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub date: String,
    pub time: String,
    pub summary: String,
    pub img: String,
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Features for a single headline token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenFeatures {
    pub word: String,
    pub all_lower: bool,
    pub all_upper: bool,
    pub word_pct: f64,
    #[serde(rename = "POS")]
    pub pos: String,
    pub ner: String,
}

/// Token position → features, in token order.
///
/// Serialized as a JSON object keyed `"0".."n-1"`; deserialization rejects
/// key sets with gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap(Vec<TokenFeatures>);

impl LabelMap {
    pub fn new(entries: Vec<TokenFeatures>) -> Self {
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a token by its stringified position.
    pub fn get(&self, key: &str) -> Option<&TokenFeatures> {
        key.parse::<usize>().ok().and_then(|i| self.0.get(i))
    }

    /// Iterate `(key, features)` pairs in token order.
    pub fn iter(&self) -> impl Iterator<Item = (String, &TokenFeatures)> {
        self.0.iter().enumerate().map(|(i, f)| (i.to_string(), f))
    }

    pub fn into_inner(self) -> Vec<TokenFeatures> {
        self.0
    }
}

impl Serialize for LabelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, features) in self.iter() {
            map.serialize_entry(&key, features)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LabelMapVisitor;

        impl<'de> Visitor<'de> for LabelMapVisitor {
            type Value = LabelMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by token positions \"0\"..\"n-1\"")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<LabelMap, A::Error> {
                let mut entries = BTreeMap::new();
                while let Some((key, features)) = access.next_entry::<String, TokenFeatures>()? {
                    let pos: usize = key.parse().map_err(|_| {
                        de::Error::custom(format!("label key {key:?} is not a token position"))
                    })?;
                    if entries.insert(pos, features).is_some() {
                        return Err(de::Error::custom(format!("duplicate label key {key:?}")));
                    }
                }
                if let Some((&last, _)) = entries.last_key_value() {
                    if last + 1 != entries.len() {
                        return Err(de::Error::custom(format!(
                            "label keys are not contiguous: {} entries, highest key {last}",
                            entries.len()
                        )));
                    }
                }
                Ok(LabelMap(entries.into_values().collect()))
            }
        }

        deserializer.deserialize_map(LabelMapVisitor)
    }
}

// ---------------------------------------------------------------------------
// FeatureRecord
// ---------------------------------------------------------------------------

/// The persisted unit: everything the modeling stage consumes for one release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    pub link: String,
    pub source: String,
    pub date: String,
    pub time: String,
    pub summary: String,
    pub img: String,
    pub text: String,
    pub location: String,
    pub org: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub label: LabelMap,
}

// ---------------------------------------------------------------------------
// ProcessOutcome
// ---------------------------------------------------------------------------

/// What happened to a document on its visit; stored as the processed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// A feature record was written.
    Persisted,
    /// Text, location or org could not be derived; nothing was written.
    Skipped,
    /// Extraction or tagging failed for this document.
    Failed,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "persisted" => Ok(Self::Persisted),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown outcome {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(word: &str, pct: f64) -> TokenFeatures {
        TokenFeatures {
            word: word.into(),
            all_lower: false,
            all_upper: false,
            word_pct: pct,
            pos: "NNP".into(),
            ner: "O".into(),
        }
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn raw_document_accepts_scraper_names() {
        let json = r#"{
            "_id": "Jane Doe Named VP",
            "link": "https://www.prnewswire.com/news-releases/jane-doe.html",
            "source": "personnel-announcements-list",
            "body_soup": "<html></html>",
            "page_soup": "<ul></ul>"
        }"#;
        let doc: RawDocument = serde_json::from_str(json).expect("deserialize");
        assert_eq!(doc.id, "Jane Doe Named VP");
        assert_eq!(doc.body_html, "<html></html>");
        assert_eq!(doc.page_html, "<ul></ul>");
    }

    #[test]
    fn label_map_keys_follow_token_order() {
        let labels = LabelMap::new((0..12).map(|i| token(&format!("w{i}"), i as f64 / 12.0)).collect());
        let json = serde_json::to_string(&labels).expect("serialize");
        // "10" must come after "9", not after "1".
        let nine = json.find("\"9\"").unwrap();
        let ten = json.find("\"10\"").unwrap();
        assert!(nine < ten);

        let parsed: LabelMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, labels);
        assert_eq!(parsed.get("11").map(|t| t.word.as_str()), Some("w11"));
    }

    #[test]
    fn label_map_rejects_gaps() {
        let json = r#"{
            "0": {"word":"a","all_lower":true,"all_upper":false,"word_pct":0.0,"POS":"DT","ner":"O"},
            "2": {"word":"b","all_lower":true,"all_upper":false,"word_pct":0.5,"POS":"NN","ner":"O"}
        }"#;
        let err = serde_json::from_str::<LabelMap>(json).unwrap_err();
        assert!(err.to_string().contains("not contiguous"));
    }

    #[test]
    fn token_features_use_pos_key() {
        let json = serde_json::to_string(&token("Jane", 0.0)).unwrap();
        assert!(json.contains(r#""POS":"NNP""#));
        assert!(json.contains(r#""ner":"O""#));
    }

    #[test]
    fn outcome_roundtrip() {
        for outcome in [ProcessOutcome::Persisted, ProcessOutcome::Skipped, ProcessOutcome::Failed] {
            assert_eq!(outcome.as_str().parse::<ProcessOutcome>(), Ok(outcome));
        }
        assert!("pulled".parse::<ProcessOutcome>().is_err());
    }
}
