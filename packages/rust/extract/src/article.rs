//! Article page → [`ArticleRecord`].
//!
//! Metadata comes from `<meta>` tags and a few well-known markup hooks; the
//! body is the paragraph text of the first recognised content container.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use pressfeat_shared::{ArticleRecord, PressfeatError, Result};

/// Content containers, tried in order. `body` always matches.
const CONTENT_SELECTORS: &[&str] = &[
    ".release-body",
    "[itemprop=\"articleBody\"]",
    "article",
    "main",
    ".content",
    "body",
];

/// Elements whose text never counts as article body.
const CHROME_TAGS: &[&str] = &["script", "style", "noscript", "nav", "header", "footer", "aside"];

static META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("valid selector"));
static PARAGRAPH_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));
static AUTHOR_EL_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[rel="author"], [itemprop="author"], .author, .byline"#)
        .expect("valid selector")
});

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static BY_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^by[:\s]+").expect("valid regex"));
static AUTHOR_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:,|&|\s+and\s+)\s*").expect("valid regex"));

/// Build an [`ArticleRecord`] from a stored article page.
///
/// Fails only when `link` is not an absolute http(s) URL or `html` is blank.
/// Every field is otherwise best-effort and may come back empty.
#[instrument(skip(html), fields(link = %link))]
pub fn extract_article(html: &str, link: &str) -> Result<ArticleRecord> {
    let url = Url::parse(link)
        .map_err(|e| PressfeatError::parse(format!("invalid article link {link:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(PressfeatError::parse(format!(
            "article link {link:?} is not an absolute http(s) URL"
        )));
    }
    if html.trim().is_empty() {
        return Err(PressfeatError::parse("article html is empty"));
    }

    let doc = Html::parse_document(html);

    let record = ArticleRecord {
        authors: extract_authors(&doc),
        body: extract_body(&doc),
        keywords: extract_keywords(&doc),
        lang: extract_lang(&doc),
        meta_desc: extract_meta_desc(&doc),
        source_url: Some(url.origin().ascii_serialization()),
    };

    debug!(
        authors = record.authors.len(),
        body_len = record.body.len(),
        lang = record.lang.as_deref().unwrap_or(""),
        "article extracted"
    );
    Ok(record)
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Non-empty `content` values of `<meta>` tags whose `key_attr` equals `key`
/// (ASCII case-insensitive), in document order.
fn meta_contents<'a>(doc: &'a Html, key_attr: &str, key: &str) -> Vec<&'a str> {
    doc.select(&META_SEL)
        .filter(|el| {
            el.value()
                .attr(key_attr)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(key))
        })
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

fn first_meta(doc: &Html, key_attr: &str, key: &str) -> Option<String> {
    meta_contents(doc, key_attr, key)
        .first()
        .map(|s| s.to_string())
}

fn extract_authors(doc: &Html) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    for (attr, key) in [
        ("name", "author"),
        ("property", "article:author"),
        ("name", "dc.creator"),
        ("name", "byl"),
    ] {
        candidates.extend(
            meta_contents(doc, attr, key)
                .into_iter()
                // Profile URLs, not names
                .filter(|c| !c.starts_with("http"))
                .map(str::to_string),
        );
    }

    for el in doc.select(&AUTHOR_EL_SEL) {
        let value = match el.value().attr("content") {
            Some(content) => content.to_string(),
            None => el.text().collect::<String>(),
        };
        candidates.push(value);
    }

    let mut seen = HashSet::new();
    let mut authors = Vec::new();
    for candidate in candidates {
        let collapsed = collapse_ws(&candidate);
        let stripped = BY_PREFIX_RE.replace(&collapsed, "");
        for name in AUTHOR_SPLIT_RE.split(&stripped) {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if seen.insert(name.to_lowercase()) {
                authors.push(name.to_string());
            }
        }
    }
    authors
}

fn extract_keywords(doc: &Html) -> Vec<String> {
    first_meta(doc, "name", "keywords")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `meta[name=description]` only, never Open Graph.
fn extract_meta_desc(doc: &Html) -> Option<String> {
    first_meta(doc, "name", "description")
}

fn extract_lang(doc: &Html) -> Option<String> {
    let html_lang = doc.root_element().value().attr("lang").map(str::to_string);

    html_lang
        .into_iter()
        .chain(first_meta(doc, "http-equiv", "content-language"))
        .chain(first_meta(doc, "name", "lang"))
        .chain(first_meta(doc, "name", "language"))
        .find_map(|raw| normalize_lang(&raw))
}

/// Two-letter lowercase language code, if `raw` starts with one.
fn normalize_lang(raw: &str) -> Option<String> {
    let code: String = raw.trim().chars().take(2).collect();
    if code.chars().count() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_lowercase())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Body text
// ---------------------------------------------------------------------------

fn extract_body(doc: &Html) -> String {
    for sel_str in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let Some(container) = doc.select(&sel).next() else {
            continue;
        };

        let paragraphs: Vec<String> = container
            .select(&PARAGRAPH_SEL)
            .filter(|p| !inside_chrome(*p, container))
            .map(visible_text)
            .filter(|t| !t.is_empty())
            .collect();

        debug!(container = sel_str, paragraphs = paragraphs.len(), "body container");

        if paragraphs.is_empty() {
            return visible_text(container);
        }
        return paragraphs.join("\n\n");
    }
    String::new()
}

/// Whether `el` sits inside a chrome element below `container`.
fn inside_chrome(el: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(
            el.ancestors()
                .take_while(|a| a.id() != container.id())
                .filter_map(ElementRef::wrap),
        )
        .any(|a| CHROME_TAGS.contains(&a.value().name()))
}

/// Whitespace-collapsed text of `el`, leaving out chrome descendants.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_chrome = node
            .ancestors()
            .take_while(|a| a.id() != el.id())
            .filter_map(ElementRef::wrap)
            .any(|a| CHROME_TAGS.contains(&a.value().name()));
        if !in_chrome {
            out.push_str(text);
        }
    }
    collapse_ws(&out)
}

fn collapse_ws(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}
