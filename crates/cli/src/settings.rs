//! Effective settings for a run.
//!
//! Layers, lowest precedence first: the TOML config file (or built-in
//! defaults when it does not exist), the access token environment variable,
//! a `.phraseapp.yml` credentials file, and finally command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use phrasesync_core::config::{AppConfig, PhraseYmlCredentials};
use phrasesync_core::FileFormat;

/// Values given on the command line (or through their environment variables).
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub file_format: Option<FileFormat>,
    pub default_locale: Option<String>,
    pub credentials: Option<String>,
}

pub fn resolve(config_path: &Path, overrides: &Overrides) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        AppConfig::load_from_file(config_path).context("failed to load configuration file")?
    } else {
        debug!(path = %config_path.display(), "no configuration file, using defaults");
        AppConfig::with_defaults()
    };
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;

    if let Some(ref path) = overrides.credentials {
        let path = expand_tilde(path);
        let creds = PhraseYmlCredentials::load(&path)
            .with_context(|| format!("failed to read credentials from {}", path.display()))?;
        config.phraseapp.access_token = Some(creds.access_token);
        config.phraseapp.project_id = Some(creds.project_id);
    }

    if let Some(ref key) = overrides.api_key {
        config.phraseapp.access_token = Some(key.clone());
    }
    if let Some(ref id) = overrides.project_id {
        config.phraseapp.project_id = Some(id.clone());
    }
    if let Some(format) = overrides.file_format {
        config.locales.file_format = format;
    }
    if let Some(ref locale) = overrides.default_locale {
        config.locales.default_locale = locale.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Minimum log level named by the config file, if it can be read.
pub fn configured_log_level(config_path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(config_path).ok()?;
    let config: AppConfig = toml::from_str(&contents).ok()?;
    Some(config.log.level)
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
