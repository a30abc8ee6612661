//! Featurization pipeline for scraped press releases.
//!
//! This crate ties together article and listing extraction, field
//! engineering, headline labeling, and the result store into a single
//! batch pass (`run_pass`).

pub mod features;
pub mod labels;
pub mod pipeline;
pub mod tagger;

pub use features::{EngineeredFields, clean_text, derive_location, derive_org, engineer};
pub use labels::build_labels;
pub use pipeline::{PassSummary, ProgressReporter, SilentProgress, featurize, run_pass};
pub use tagger::{BridgeTagger, Tagger};
