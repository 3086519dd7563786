//! TOML-based configuration system for phrasesync.
//!
//! The API token is stored as an `_env` field that references an environment
//! variable name. The actual secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::locale::FileFormat;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote translation service settings.
    pub phraseapp: PhraseAppConfig,

    /// Locale file settings.
    #[serde(default)]
    pub locales: LocalesConfig,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// PhraseApp
// ---------------------------------------------------------------------------

/// Remote translation service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseAppConfig {
    /// API base URL (default `https://api.phrase.com/v2`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API access token.
    #[serde(default = "default_token_env")]
    pub access_token_env: String,

    /// Project ID. May be left out for commands that create or look up a
    /// project.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Resolved access token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub access_token: Option<String>,
}

fn default_api_url() -> String {
    "https://api.phrase.com/v2".into()
}
fn default_token_env() -> String {
    "PHRASEAPP_API_KEY".into()
}

// ---------------------------------------------------------------------------
// Locales
// ---------------------------------------------------------------------------

/// Locale file format and merge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalesConfig {
    /// On-disk format: `json`, `yml` or `yaml`.
    #[serde(default)]
    pub file_format: FileFormat,

    /// Locale holding every legitimate key (default `en`).
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Delimiter used to flatten nested keys; must not appear in any key.
    #[serde(default = "default_delimiter")]
    pub path_delimiter: String,
}

fn default_locale() -> String {
    "en".into()
}
fn default_delimiter() -> String {
    ".".into()
}

impl Default for LocalesConfig {
    fn default() -> Self {
        Self {
            file_format: FileFormat::default(),
            default_locale: default_locale(),
            path_delimiter: default_delimiter(),
        }
    }
}

impl LocalesConfig {
    /// The delimiter as a single character.
    pub fn delimiter(&self) -> Result<char, ConfigError> {
        let mut chars = self.path_delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(ConfigError::InvalidValue {
                field: "locales.path_delimiter".into(),
                detail: format!(
                    "delimiter must be exactly one character, got {:?}",
                    self.path_delimiter
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Configuration with every default and no project.
    pub fn with_defaults() -> Self {
        Self {
            phraseapp: PhraseAppConfig {
                api_url: default_api_url(),
                access_token_env: default_token_env(),
                project_id: None,
                access_token: None,
            },
            locales: LocalesConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the access token from its environment variable.
    ///
    /// A missing variable logs a warning but does **not** fail: local-only
    /// commands (merge, diff) never need the token.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        self.phraseapp.access_token = resolve_optional_env(
            &self.phraseapp.access_token_env,
            "phraseapp.access_token_env",
        );
        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phraseapp.api_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "phraseapp.api_url".into(),
                detail: "API URL must not be empty".into(),
            });
        }
        if self.phraseapp.access_token_env.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "phraseapp.access_token_env".into(),
                detail: "token environment variable name must not be empty".into(),
            });
        }
        if matches!(self.phraseapp.project_id.as_deref(), Some("")) {
            return Err(ConfigError::InvalidValue {
                field: "phraseapp.project_id".into(),
                detail: "project ID must not be empty when set".into(),
            });
        }
        if self.locales.default_locale.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "locales.default_locale".into(),
                detail: "default locale must not be empty".into(),
            });
        }
        self.locales.delimiter()?;

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// The resolved access token, or an error naming the variable to set.
    pub fn require_access_token(&self) -> Result<&str, ConfigError> {
        self.phraseapp
            .access_token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.phraseapp.access_token_env.clone(),
                field: "phraseapp.access_token_env".into(),
            })
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// .phraseapp.yml credentials
// ---------------------------------------------------------------------------

/// Credentials from a `.phraseapp.yml` file as written by the service's
/// own tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseYmlCredentials {
    pub access_token: String,
    pub project_id: String,
}

#[derive(Deserialize)]
struct PhraseYmlFile {
    phraseapp: PhraseYmlSection,
}

#[derive(Deserialize)]
struct PhraseYmlSection {
    access_token: String,
    project_id: String,
}

impl PhraseYmlCredentials {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let parsed: PhraseYmlFile = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
        Ok(Self {
            access_token: parsed.phraseapp.access_token,
            project_id: parsed.phraseapp.project_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[phraseapp]
api_url = "https://api.example.com/v2"
access_token_env = "PHRASESYNC_TEST_TOKEN"
project_id = "proj123"

[locales]
file_format = "yml"
default_locale = "en-GB"
path_delimiter = "/"

[log]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.phraseapp.api_url, "https://api.example.com/v2");
        assert_eq!(config.phraseapp.project_id.as_deref(), Some("proj123"));
        assert_eq!(config.locales.file_format, FileFormat::Yaml);
        assert_eq!(config.locales.default_locale, "en-GB");
        assert_eq!(config.locales.delimiter().unwrap(), '/');
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrasesync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.locales.default_locale, "en-GB");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/phrasesync.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unknown_file_format_rejected() {
        let toml_str = r#"
[phraseapp]
[locales]
file_format = "revx"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn test_validate_rejects_long_delimiter() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.locales.path_delimiter = "::".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "locales.path_delimiter"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_default_locale() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.locales.default_locale = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "locales.default_locale"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("PHRASESYNC_TEST_TOKEN_RESOLVE", "tok_abc");

        let toml_str = r#"
[phraseapp]
access_token_env = "PHRASESYNC_TEST_TOKEN_RESOLVE"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.phraseapp.access_token.as_deref(), Some("tok_abc"));
        assert_eq!(config.require_access_token().unwrap(), "tok_abc");

        std::env::remove_var("PHRASESYNC_TEST_TOKEN_RESOLVE");
    }

    #[test]
    fn test_missing_token_reported() {
        let toml_str = r#"
[phraseapp]
access_token_env = "PHRASESYNC_TEST_TOKEN_NEVER_SET"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();
        assert!(matches!(
            config.require_access_token(),
            Err(ConfigError::EnvVarMissing { ref var, .. }) if var == "PHRASESYNC_TEST_TOKEN_NEVER_SET"
        ));
    }

    #[test]
    fn test_defaults() {
        let minimal = "[phraseapp]\n";
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.phraseapp.api_url, "https://api.phrase.com/v2");
        assert_eq!(config.phraseapp.access_token_env, "PHRASEAPP_API_KEY");
        assert!(config.phraseapp.project_id.is_none());
        assert_eq!(config.locales.file_format, FileFormat::Json);
        assert_eq!(config.locales.default_locale, "en");
        assert_eq!(config.locales.delimiter().unwrap(), '.');
        assert_eq!(config.log.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_phrase_yml_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".phraseapp.yml");
        std::fs::write(
            &path,
            "phraseapp:\n  access_token: abc\n  project_id: p1\n",
        )
        .unwrap();
        let creds = PhraseYmlCredentials::load(&path).unwrap();
        assert_eq!(creds.access_token, "abc");
        assert_eq!(creds.project_id, "p1");

        std::fs::write(&path, "phraseapp:\n  access_token: abc\n").unwrap();
        assert!(matches!(
            PhraseYmlCredentials::load(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
