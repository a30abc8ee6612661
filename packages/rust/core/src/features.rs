//! Derived downstream fields: cleaned body text, location, organization.

use pressfeat_shared::{ArticleRecord, PageContext};

/// Wire-service dateline separator; the release text starts after it.
const DATELINE_DELIMITER: &str = "/ -- ";

/// The three fields a feature record cannot be persisted without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineeredFields {
    pub text: String,
    pub location: String,
    pub org: String,
}

/// Body text after the first dateline separator, trimmed.
pub fn clean_text(body: &str) -> Option<String> {
    body.split_once(DATELINE_DELIMITER)
        .map(|(_, rest)| rest.trim().to_string())
}

/// Text of the meta description before the publish month, trimmed.
///
/// The month is the first three characters of `date`. `None` when the date
/// is empty, the description is missing, or the month does not occur in it.
pub fn derive_location(date: &str, meta_desc: Option<&str>) -> Option<String> {
    let month: String = date.chars().take(3).collect();
    if month.is_empty() {
        return None;
    }
    let desc = meta_desc?;
    desc.find(&month).map(|idx| desc[..idx].trim().to_string())
}

/// The first author, which for wire releases is the issuing organization.
pub fn derive_org(authors: &[String]) -> Option<String> {
    authors.first().cloned()
}

/// Derive text, location and org. All three must resolve to non-empty
/// values; otherwise nothing is returned.
pub fn engineer(article: &ArticleRecord, context: &PageContext) -> Option<EngineeredFields> {
    let text = clean_text(&article.body).filter(|s| !s.is_empty())?;
    let location =
        derive_location(&context.date, article.meta_desc.as_deref()).filter(|s| !s.is_empty())?;
    let org = derive_org(&article.authors).filter(|s| !s.is_empty())?;
    Some(EngineeredFields {
        text,
        location,
        org,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(body: &str, meta_desc: Option<&str>, authors: &[&str]) -> ArticleRecord {
        ArticleRecord {
            authors: authors.iter().map(|a| a.to_string()).collect(),
            body: body.into(),
            meta_desc: meta_desc.map(str::to_string),
            ..Default::default()
        }
    }

    fn context(date: &str) -> PageContext {
        PageContext {
            date: date.into(),
            ..Default::default()
        }
    }

    #[test]
    fn text_after_dateline() {
        assert_eq!(
            clean_text("NEW YORK, Jan 5, 2015 /PRNewswire/ -- Acme Corp announced..."),
            Some("Acme Corp announced...".into())
        );
    }

    #[test]
    fn text_splits_on_first_delimiter_only() {
        assert_eq!(clean_text("a/ -- b / -- c/ -- d"), Some("b / -- c/ -- d".into()));
    }

    #[test]
    fn text_without_delimiter() {
        assert_eq!(clean_text("NEW YORK -- Acme Corp announced"), None);
        assert_eq!(clean_text(""), None);
    }

    #[test]
    fn location_before_month() {
        assert_eq!(
            derive_location("Jan 5, 2015", Some("NEW YORK, Jan 5 -- Acme Corp today...")),
            Some("NEW YORK,".into())
        );
    }

    #[test]
    fn location_month_absent() {
        assert_eq!(derive_location("Feb 5, 2015", Some("NEW YORK, Jan 5 --")), None);
    }

    #[test]
    fn location_missing_inputs() {
        assert_eq!(derive_location("", Some("NEW YORK, Jan 5")), None);
        assert_eq!(derive_location("Jan 5, 2015", None), None);
    }

    #[test]
    fn location_short_date_uses_what_is_there() {
        assert_eq!(derive_location("Ma", Some("BOSTON, Mar 3")), Some("BOSTON,".into()));
    }

    #[test]
    fn org_is_first_author() {
        assert_eq!(derive_org(&["Acme Corp".into(), "Jane".into()]), Some("Acme Corp".into()));
        assert_eq!(derive_org(&[]), None);
    }

    #[test]
    fn engineer_all_present() {
        let a = article(
            "NEW YORK, Jan 5, 2015 /PRNewswire/ -- Acme Corp announced",
            Some("NEW YORK, Jan 5 -- Acme Corp today"),
            &["Acme Corp"],
        );
        let fields = engineer(&a, &context("Jan 5, 2015")).expect("complete");
        assert_eq!(fields.text, "Acme Corp announced");
        assert_eq!(fields.location, "NEW YORK,");
        assert_eq!(fields.org, "Acme Corp");
    }

    #[test]
    fn engineer_is_all_or_nothing() {
        let body = "NEW YORK /PRNewswire/ -- Acme";
        let desc = Some("NEW YORK, Jan 5");

        assert!(engineer(&article(body, desc, &[]), &context("Jan 5")).is_none());
        assert!(engineer(&article("no dateline", desc, &["Acme"]), &context("Jan 5")).is_none());
        assert!(engineer(&article(body, desc, &["Acme"]), &context("")).is_none());
    }

    #[test]
    fn engineer_rejects_empty_values() {
        // Month at the very start leaves an empty location.
        let a = article("x/ -- y", Some("Jan 5, NEW YORK"), &["Acme"]);
        assert!(engineer(&a, &context("Jan 5")).is_none());

        // Delimiter at the very end leaves empty text.
        let a = article("NEW YORK /PRNewswire/ -- ", Some("NY, Jan 5"), &["Acme"]);
        assert!(engineer(&a, &context("Jan 5")).is_none());
    }
}
