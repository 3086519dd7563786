//! Error types for the phrasesync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    LocaleFile(#[from] LocaleFileError),

    #[error(transparent)]
    PhraseApp(#[from] PhraseAppError),

    #[error(transparent)]
    Updater(#[from] UpdaterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Merge engine errors
// ---------------------------------------------------------------------------

/// Errors raised by the three-way merge engine.
///
/// The engine never applies a partial result: any of these aborts the merge
/// of the locale being processed and leaves every input untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    /// A key contains the path delimiter, so flattening would be ambiguous.
    #[error("key '{key}' contains the path delimiter '{delimiter}'")]
    DelimiterCollision { key: String, delimiter: char },

    /// A path is claimed both as a scalar and as a container after resolution.
    ///
    /// This is an internal invariant violation in conflict resolution, never
    /// a property of the input trees.
    #[error("internal merge invariant violated: '{path}' is both a scalar and a container")]
    TypeConflict { path: String },
}

// ---------------------------------------------------------------------------
// Locale file errors
// ---------------------------------------------------------------------------

/// Errors from parsing, rendering and reading locale files.
#[derive(Debug, Error)]
pub enum LocaleFileError {
    /// The requested file format is not one we know how to handle.
    #[error("invalid file format: {0}")]
    BadFileFormat(String),

    /// The file content could not be parsed.
    #[error("provided content was not valid {format}: {detail}")]
    Parse { format: String, detail: String },

    /// The content parsed but contains a value with no tree representation.
    #[error("unsupported value at '{path}': {detail}")]
    UnsupportedValue { path: String, detail: String },

    /// The document root is not a mapping.
    #[error("locale file root must be a mapping, found {0}")]
    NonMappingRoot(String),

    /// The locale file could not be read from disk.
    #[error("couldn't read localization file at {path}")]
    Unreadable { path: String },

    /// Rendering a tree back to text failed.
    #[error("failed to serialize locale '{locale}': {detail}")]
    Serialize { locale: String, detail: String },

    /// Generic I/O wrapper.
    #[error("locale file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Remote translation service errors
// ---------------------------------------------------------------------------

/// Errors from PhraseApp REST API interactions.
#[derive(Debug, Error)]
pub enum PhraseAppError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("PhraseApp HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The access token was rejected.
    #[error("PhraseApp rejected the API key: {0}")]
    BadApiKey(String),

    /// The project (or a resource inside it) does not exist.
    #[error("PhraseApp resource not found in project '{project_id}': {detail}")]
    NotFound { project_id: String, detail: String },

    /// A project with the requested name already exists.
    #[error("PhraseApp project name has already been taken: {0}")]
    ProjectNameTaken(String),

    /// Rate limit exceeded.
    #[error("PhraseApp rate limit exceeded, retry after {retry_after}")]
    RateLimited { retry_after: String },

    /// The API returned a non-success status code.
    #[error("PhraseApp API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// JSON deserialization failure.
    #[error("PhraseApp response parse error: {0}")]
    ParseError(String),

    /// No tag carrying the ancestor commit exists on the project.
    #[error("could not locate tag representing git ancestor commit")]
    MissingGitParent,

    /// No project with the requested name is visible to the token.
    #[error("project '{name}' not found")]
    ProjectNotFound { name: String },

    /// An operation needs a project ID but none was configured.
    #[error("no PhraseApp project ID configured")]
    MissingProjectId,
}

impl PhraseAppError {
    /// Whether a later attempt of the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::RateLimited { .. } => true,
            Self::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the request certainly never reached the server, so even a
    /// request that creates something may be sent again.
    pub fn is_unprocessed(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_connect(),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Updater (orchestration) errors
// ---------------------------------------------------------------------------

/// Errors from the locale updater that ties files, merges and the remote
/// together.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// The default locale is required for uploads but was not found.
    #[error("missing default locale '{0}'")]
    MissingDefaultLocale(String),

    /// Merging a single locale failed; no files were written.
    #[error("failed to merge locale '{locale}'")]
    LocaleMergeFailed {
        locale: String,
        #[source]
        source: MergeError,
    },

    /// Underlying merge error outside a per-locale merge.
    #[error("updater merge error: {0}")]
    Merge(#[from] MergeError),

    /// Underlying locale file error.
    #[error("updater locale file error: {0}")]
    LocaleFile(#[from] LocaleFileError),

    /// Underlying remote error.
    #[error("updater PhraseApp error: {0}")]
    PhraseApp(#[from] PhraseAppError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML or YAML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = MergeError::DelimiterCollision {
            key: "a.b".into(),
            delimiter: '.',
        };
        assert_eq!(
            err.to_string(),
            "key 'a.b' contains the path delimiter '.'"
        );

        let err = LocaleFileError::BadFileFormat("revx".into());
        assert_eq!(err.to_string(), "invalid file format: revx");

        let err = PhraseAppError::ProjectNotFound {
            name: "web".into(),
        };
        assert_eq!(err.to_string(), "project 'web' not found");

        let err = ConfigError::EnvVarMissing {
            var: "PHRASEAPP_API_KEY".into(),
            field: "phraseapp.access_token_env".into(),
        };
        assert!(err.to_string().contains("PHRASEAPP_API_KEY"));
    }

    #[test]
    fn test_locale_merge_failure_names_locale() {
        let err = UpdaterError::LocaleMergeFailed {
            locale: "de".into(),
            source: MergeError::TypeConflict { path: "a.b".into() },
        };
        assert_eq!(err.to_string(), "failed to merge locale 'de'");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("a.b"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(PhraseAppError::RateLimited {
            retry_after: "10".into()
        }
        .is_transient());
        assert!(PhraseAppError::ApiError {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!PhraseAppError::ApiError {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!PhraseAppError::BadApiKey("401".into()).is_transient());
    }

    #[test]
    fn test_unprocessed_classification() {
        assert!(PhraseAppError::RateLimited {
            retry_after: "10".into()
        }
        .is_unprocessed());
        assert!(!PhraseAppError::ApiError {
            status: 503,
            body: String::new()
        }
        .is_unprocessed());
        assert!(!PhraseAppError::ProjectNameTaken("taken".into()).is_unprocessed());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let merge_err = MergeError::TypeConflict { path: "x".into() };
        let core_err: CoreError = merge_err.into();
        assert!(matches!(core_err, CoreError::Merge(_)));

        let cfg_err = ConfigError::FileNotFound("/nope".into());
        let core_err: CoreError = cfg_err.into();
        assert!(matches!(core_err, CoreError::Config(_)));
    }
}
