//! Per-token headline labels.

use tracing::instrument;

use pressfeat_shared::{LabelMap, PressfeatError, Result, TokenFeatures};

use crate::tagger::Tagger;

/// Build the label map for `headline`.
///
/// Tokens are the whitespace-separated words of the headline, unchanged.
/// Each tagger must return exactly one tag per token.
#[instrument(skip(tagger))]
pub fn build_labels(headline: &str, tagger: &dyn Tagger) -> Result<LabelMap> {
    let tokens: Vec<String> = headline.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return Ok(LabelMap::default());
    }
    let n = tokens.len();

    let pos = checked(tagger.pos_tags(&tokens)?, "pos", n)?;
    let ner = checked(tagger.ner_tags(&tokens)?, "ner", n)?;

    let entries = tokens
        .into_iter()
        .zip(pos.into_iter().zip(ner))
        .enumerate()
        .map(|(i, (word, (pos, ner)))| TokenFeatures {
            all_lower: is_all_lower(&word),
            all_upper: is_all_upper(&word),
            word_pct: i as f64 / n as f64,
            word,
            pos,
            ner,
        })
        .collect();

    Ok(LabelMap::new(entries))
}

fn checked(tags: Vec<String>, tagger: &'static str, expected: usize) -> Result<Vec<String>> {
    if tags.len() != expected {
        return Err(PressfeatError::TagCountMismatch {
            tagger,
            expected,
            actual: tags.len(),
        });
    }
    Ok(tags)
}

/// At least one cased character, and no uppercase ones.
fn is_all_lower(word: &str) -> bool {
    word.chars().any(char::is_lowercase) && !word.chars().any(char::is_uppercase)
}

/// At least one cased character, and no lowercase ones.
fn is_all_upper(word: &str) -> bool {
    word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns fixed tag columns.
    struct FixedTagger {
        pos: Vec<&'static str>,
        ner: Vec<&'static str>,
    }

    impl Tagger for FixedTagger {
        fn pos_tags(&self, _tokens: &[String]) -> Result<Vec<String>> {
            Ok(self.pos.iter().map(|s| s.to_string()).collect())
        }
        fn ner_tags(&self, _tokens: &[String]) -> Result<Vec<String>> {
            Ok(self.ner.iter().map(|s| s.to_string()).collect())
        }
    }

    /// Panics if called.
    struct UnreachableTagger;

    impl Tagger for UnreachableTagger {
        fn pos_tags(&self, _tokens: &[String]) -> Result<Vec<String>> {
            panic!("pos tagger must not be called")
        }
        fn ner_tags(&self, _tokens: &[String]) -> Result<Vec<String>> {
            panic!("ner tagger must not be called")
        }
    }

    #[test]
    fn headline_example() {
        let tagger = FixedTagger {
            pos: vec!["NNP", "NNP", "VBN", "NNP"],
            ner: vec!["PERSON", "PERSON", "O", "O"],
        };
        let labels = build_labels("Jane Doe Named VP", &tagger).unwrap();

        assert_eq!(labels.len(), 4);
        let jane = labels.get("0").unwrap();
        assert_eq!(jane.word, "Jane");
        assert!(!jane.all_lower && !jane.all_upper);
        assert_eq!(jane.word_pct, 0.0);
        assert_eq!(jane.pos, "NNP");
        assert_eq!(jane.ner, "PERSON");

        let named = labels.get("2").unwrap();
        assert_eq!(named.word_pct, 0.5);
        assert_eq!(named.pos, "VBN");

        let vp = labels.get("3").unwrap();
        assert_eq!(vp.word, "VP");
        assert!(vp.all_upper);
        assert!(!vp.all_lower);
        assert_eq!(vp.word_pct, 0.75);
        assert_eq!(vp.ner, "O");
    }

    #[test]
    fn keys_are_contiguous_positions() {
        let tagger = FixedTagger {
            pos: vec!["X"; 3],
            ner: vec!["O"; 3],
        };
        let labels = build_labels("  a\tb \n c ", &tagger).unwrap();
        let keys: Vec<String> = labels.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["0", "1", "2"]);
        for (i, (_, features)) in labels.iter().enumerate() {
            assert_eq!(features.word_pct, i as f64 / 3.0);
        }
    }

    #[test]
    fn pos_count_mismatch_surfaces() {
        let tagger = FixedTagger {
            pos: vec!["NNP"],
            ner: vec!["O", "O"],
        };
        let err = build_labels("Acme Corp", &tagger).unwrap_err();
        assert!(matches!(
            err,
            PressfeatError::TagCountMismatch {
                tagger: "pos",
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn ner_count_mismatch_surfaces() {
        let tagger = FixedTagger {
            pos: vec!["NNP", "NNP"],
            ner: vec!["O", "O", "O"],
        };
        let err = build_labels("Acme Corp", &tagger).unwrap_err();
        assert_eq!(err.to_string(), "ner tagger returned 3 tags for 2 tokens");
    }

    #[test]
    fn empty_headline_skips_taggers() {
        let labels = build_labels("   ", &UnreachableTagger).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn lexical_flags() {
        assert!(is_all_lower("acme"));
        assert!(is_all_lower("e-commerce2"));
        assert!(!is_all_lower("Acme"));
        assert!(!is_all_lower("2015"));
        assert!(is_all_upper("CEO,"));
        assert!(is_all_upper("Ü"));
        assert!(!is_all_upper("--"));
        assert!(!is_all_upper("iPhone"));
    }
}
