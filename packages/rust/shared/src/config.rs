//! Application configuration for pressfeat.
//!
//! User config lives at `~/.pressfeat/pressfeat.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PressfeatError, Result};
use crate::layout::ListingLayout;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pressfeat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pressfeat";

// ---------------------------------------------------------------------------
// Config structs (matching pressfeat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Tagger subprocess commands.
    #[serde(default)]
    pub taggers: TaggersConfig,

    /// Listing-page layout override. Omitted means the built-in layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing: Option<ListingLayout>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the libSQL database holding raw documents and results.
    #[serde(default = "default_database")]
    pub database: String,

    /// Source filter applied to raw documents.
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            source: default_source(),
        }
    }
}

fn default_database() -> String {
    "var/pressfeat.db".into()
}
fn default_source() -> String {
    "personnel-announcements-list".into()
}

/// `[taggers]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaggersConfig {
    /// Part-of-speech tagger process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<TaggerCommand>,

    /// Named-entity tagger process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ner: Option<TaggerCommand>,
}

/// How to launch one tagger subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggerCommand {
    /// Executable (e.g. `java`).
    pub command: String,
    /// Arguments passed verbatim.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; defaults to the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Pass config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one featurization pass.
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Only documents from this source are visited.
    pub source: String,
    /// Listing-page layout used for page context extraction.
    pub layout: ListingLayout,
}

impl From<&AppConfig> for PassConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source: config.defaults.source.clone(),
            layout: config.listing.clone().unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pressfeat/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PressfeatError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pressfeat/pressfeat.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PressfeatError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PressfeatError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if let Some(layout) = &config.listing {
        layout.validate()?;
    }
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PressfeatError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PressfeatError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PressfeatError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that both tagger commands are configured. Returns `(pos, ner)`.
pub fn validate_taggers(config: &AppConfig) -> Result<(&TaggerCommand, &TaggerCommand)> {
    fn pick<'a>(cmd: Option<&'a TaggerCommand>, name: &str) -> Result<&'a TaggerCommand> {
        cmd.filter(|c| !c.command.trim().is_empty()).ok_or_else(|| {
            PressfeatError::config(format!(
                "{name} tagger not configured. Add a [taggers.{name}] section with `command` \
                 (and `args`) to {CONFIG_FILE_NAME}"
            ))
        })
    }

    Ok((
        pick(config.taggers.pos.as_ref(), "pos")?,
        pick(config.taggers.ner.as_ref(), "ner")?,
    ))
}
