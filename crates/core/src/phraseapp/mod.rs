//! Remote translation service access.
//!
//! [`TranslationRemote`] is the seam the updater talks through;
//! [`PhraseAppClient`] implements it against the PhraseApp v2 REST API.

pub mod client;
pub mod models;
pub mod retry;

use async_trait::async_trait;

use crate::errors::PhraseAppError;
use crate::locale::LocaleFile;

pub use client::PhraseAppClient;
pub use models::{KeysDeleted, Locale, Project, Tag, Upload};
pub use retry::RetryPolicy;

/// Project tags with this prefix record the git commit the remote content
/// was last synchronized against.
pub const GIT_TAG_PREFIX: &str = "gitancestor_";

/// The service allows two concurrent connections per token.
pub const MAX_CONCURRENT_REQUESTS: usize = 2;

/// Operations phrasesync needs from a translation service.
///
/// Project-scoped calls take the project ID explicitly so one remote can
/// serve a project created during the same run.
#[async_trait]
pub trait TranslationRemote: Send + Sync {
    /// Find the ID of the project called `name`.
    async fn lookup_project_id(&self, name: &str) -> Result<String, PhraseAppError>;

    /// Create a project whose main format is `main_format`.
    async fn create_project(&self, name: &str, main_format: &str)
        -> Result<Project, PhraseAppError>;

    async fn list_tags(&self, project_id: &str) -> Result<Vec<Tag>, PhraseAppError>;

    async fn create_tag(&self, project_id: &str, name: &str) -> Result<Tag, PhraseAppError>;

    async fn delete_tag(&self, project_id: &str, name: &str) -> Result<(), PhraseAppError>;

    async fn fetch_locales(&self, project_id: &str) -> Result<Vec<Locale>, PhraseAppError>;

    async fn create_locale(
        &self,
        project_id: &str,
        name: &str,
        default: bool,
    ) -> Result<Locale, PhraseAppError>;

    /// Download a locale's content rendered in `file_format`.
    async fn download_locale(
        &self,
        project_id: &str,
        locale: &Locale,
        file_format: &str,
        skip_unverified: bool,
    ) -> Result<String, PhraseAppError>;

    async fn upload_locale(
        &self,
        project_id: &str,
        file: &LocaleFile,
    ) -> Result<Upload, PhraseAppError>;

    /// Delete every key that the given upload did not mention.
    async fn remove_keys_not_in_upload(
        &self,
        project_id: &str,
        upload_id: &str,
    ) -> Result<KeysDeleted, PhraseAppError>;
}
