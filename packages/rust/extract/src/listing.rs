//! Listing page → [`PageContext`].
//!
//! A listing page carries many releases. For each field the layout names an
//! anchor selector; the first candidate whose `href` equals the article link
//! is the starting point, the rule's steps walk the DOM from there, and the
//! element reached yields text or an attribute. Each field resolves on its
//! own and falls back to `""`.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use pressfeat_shared::{FieldRule, ListingLayout, PageContext, PressfeatError, Result, Step, Take};

/// A [`ListingLayout`] with every selector parsed.
#[derive(Debug, Clone)]
pub struct CompiledLayout {
    date: CompiledRule,
    time: CompiledRule,
    summary: CompiledRule,
    img: CompiledRule,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    anchor: Selector,
    steps: Vec<CompiledStep>,
    take: Take,
}

#[derive(Debug, Clone)]
enum CompiledStep {
    Parent,
    Closest(Selector),
    PrevSibling,
    NextSibling,
    Find(Selector),
}

impl CompiledLayout {
    /// Validate `layout` and parse all of its selectors.
    pub fn compile(layout: &ListingLayout) -> Result<Self> {
        layout.validate()?;
        let fields = &layout.fields;
        Ok(Self {
            date: CompiledRule::compile("date", &fields.date)?,
            time: CompiledRule::compile("time", &fields.time)?,
            summary: CompiledRule::compile("summary", &fields.summary)?,
            img: CompiledRule::compile("img", &fields.img)?,
        })
    }
}

impl CompiledRule {
    fn compile(field: &str, rule: &FieldRule) -> Result<Self> {
        let steps = rule
            .steps
            .iter()
            .map(|step| {
                Ok(match step {
                    Step::Parent => CompiledStep::Parent,
                    Step::Closest { selector } => CompiledStep::Closest(parse_selector(field, selector)?),
                    Step::PrevSibling => CompiledStep::PrevSibling,
                    Step::NextSibling => CompiledStep::NextSibling,
                    Step::Find { selector } => CompiledStep::Find(parse_selector(field, selector)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            anchor: parse_selector(field, &rule.anchor)?,
            steps,
            take: rule.take.clone(),
        })
    }

    /// Resolve this rule against `doc`, or `None` at the first failed lookup.
    fn resolve(&self, doc: &Html, link: &str) -> Option<String> {
        let anchor = doc
            .select(&self.anchor)
            .find(|el| el.value().attr("href") == Some(link))?;

        let target = self
            .steps
            .iter()
            .try_fold(anchor, |el, step| apply_step(el, step))?;

        match &self.take {
            Take::Text => Some(target.text().collect::<String>().trim().to_string()),
            Take::Attr { name } => target.value().attr(name).map(str::to_string),
        }
    }
}

fn parse_selector(field: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| {
        PressfeatError::validation(format!(
            "listing field `{field}`: invalid selector {selector:?}: {e}"
        ))
    })
}

fn apply_step<'a>(el: ElementRef<'a>, step: &CompiledStep) -> Option<ElementRef<'a>> {
    match step {
        CompiledStep::Parent => el.parent().and_then(ElementRef::wrap),
        CompiledStep::Closest(sel) => el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| sel.matches(a)),
        CompiledStep::PrevSibling => el.prev_siblings().find_map(ElementRef::wrap),
        CompiledStep::NextSibling => el.next_siblings().find_map(ElementRef::wrap),
        CompiledStep::Find(sel) => el.select(sel).next(),
    }
}

/// Extract date, time, summary and thumbnail for the article at `link`.
///
/// Never fails: any field that cannot be located is `""`.
#[instrument(skip(listing_html, layout), fields(link = %link))]
pub fn extract_page_context(listing_html: &str, link: &str, layout: &CompiledLayout) -> PageContext {
    let doc = Html::parse_document(listing_html);

    let field = |name: &str, rule: &CompiledRule| {
        rule.resolve(&doc, link).unwrap_or_else(|| {
            debug!(field = name, "listing field not found");
            String::new()
        })
    };

    PageContext {
        date: field("date", &layout.date),
        time: field("time", &layout.time),
        summary: field("summary", &layout.summary),
        img: field("img", &layout.img),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::load_fixture;

    const FIRST: &str = "https://www.prnewswire.com/news-releases/jane-doe-named-vp-of-acme-corp-300015.html";
    const SECOND: &str = "https://www.prnewswire.com/news-releases/globex-appoints-cfo-300016.html";

    fn default_layout() -> CompiledLayout {
        CompiledLayout::compile(&ListingLayout::default()).expect("default layout compiles")
    }

    #[test]
    fn fixture_listing_full_context() {
        let html = load_fixture("html/listing.fixture.html");
        let ctx = extract_page_context(&html, FIRST, &default_layout());

        assert_eq!(ctx.date, "Jan 05, 2015");
        assert_eq!(ctx.time, "08:00 ET");
        assert_eq!(
            ctx.summary,
            "NEW YORK, Jan. 5, 2015 /PRNewswire/ -- Acme Corp today announced that Jane Doe has been named Vice President."
        );
        assert_eq!(ctx.img, "https://mma.prnewswire.com/media/acme-logo.jpg");
    }

    #[test]
    fn fields_fail_independently() {
        let html = load_fixture("html/listing.fixture.html");
        let ctx = extract_page_context(&html, SECOND, &default_layout());

        // No dateline block and no thumbnail for this release.
        assert_eq!(ctx.date, "");
        assert_eq!(ctx.time, "");
        assert_eq!(ctx.img, "");
        assert_eq!(ctx.summary, "Globex Corporation names John Roe chief financial officer.");
    }

    #[test]
    fn unknown_link_yields_empty_context() {
        let html = load_fixture("html/listing.fixture.html");
        let ctx = extract_page_context(&html, "https://example.com/missing", &default_layout());
        assert_eq!(ctx, PageContext::default());
    }

    #[test]
    fn closest_step_decouples_from_depth() {
        let html = r#"
            <section class="item">
              <div class="meta"><span class="date">Feb 02, 2016</span></div>
              <div><div><div><div><a class="news-release" href="/a">A</a></div></div></div></div>
            </section>"#;
        let mut layout = ListingLayout::default();
        layout.fields.date.steps = vec![
            Step::Closest {
                selector: ".item".into(),
            },
            Step::Find {
                selector: ".meta .date".into(),
            },
        ];
        let compiled = CompiledLayout::compile(&layout).unwrap();
        let ctx = extract_page_context(html, "/a", &compiled);
        assert_eq!(ctx.date, "Feb 02, 2016");
        assert_eq!(ctx.time, "");
    }

    #[test]
    fn invalid_selector_rejected() {
        let mut layout = ListingLayout::default();
        layout.fields.summary.anchor = "a[href".into();
        let err = CompiledLayout::compile(&layout).unwrap_err();
        assert!(err.to_string().contains("listing field `summary`"));
    }

    #[test]
    fn attr_take_missing_attribute_is_empty() {
        let html = r#"<a href="/x"><img alt="no src"></a>"#;
        let ctx = extract_page_context(html, "/x", &default_layout());
        assert_eq!(ctx.img, "");
    }
}
