//! HTML extraction for press releases.
//!
//! Two extractors live here:
//! - [`extract_article`] turns the stored article page into an
//!   [`ArticleRecord`](pressfeat_shared::ArticleRecord) (authors, body,
//!   keywords, language, meta description, source URL).
//! - [`extract_page_context`] walks the listing page the article was linked
//!   from and pulls date, time, summary and thumbnail, following a
//!   [`CompiledLayout`].

mod article;
mod listing;

pub use article::extract_article;
pub use listing::{CompiledLayout, extract_page_context};

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;

    pub fn fixture_path(name: &str) -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name)
    }

    pub fn load_fixture(name: &str) -> String {
        fs::read_to_string(fixture_path(name))
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }
}
