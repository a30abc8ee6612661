//! Shared types, error model, and configuration for pressfeat.
//!
//! This crate is the foundation depended on by all other pressfeat crates.
//! It provides:
//! - [`PressfeatError`]: the unified error type
//! - Domain types ([`RawDocument`], [`ArticleRecord`], [`PageContext`],
//!   [`FeatureRecord`], [`LabelMap`])
//! - The listing layout schema ([`ListingLayout`])
//! - Configuration ([`AppConfig`], [`PassConfig`], config loading)

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, PassConfig, TaggerCommand, TaggersConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_taggers,
};
pub use error::{PressfeatError, Result};
pub use layout::{FieldRule, FieldRules, ListingLayout, Step, Take};
pub use types::{
    ArticleRecord, FeatureRecord, LabelMap, PageContext, ProcessOutcome, RawDocument, RunId,
    TokenFeatures,
};
