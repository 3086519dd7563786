//! Locale synchronization workflows.
//!
//! [`LocaleUpdater`] ties the merge engine, the locale file codecs and a
//! [`TranslationRemote`] together: merging locale directories, diffing them,
//! and moving locale files to and from the remote project.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::errors::{PhraseAppError, UpdaterError};
use crate::locale::{self, FileFormat, LocaleFile};
use crate::merge::{diff, MergeEngine, Operation, Tree};
use crate::phraseapp::{TranslationRemote, Upload, GIT_TAG_PREFIX, MAX_CONCURRENT_REQUESTS};

/// Per-locale differences between two locale directories.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleDiff {
    pub locale: String,
    pub operations: Vec<Operation>,
}

/// Result of uploading a locale directory.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// Uploads in the order they were made; the default locale comes first.
    pub uploads: Vec<(String, Upload)>,
    /// Locales created on the remote because they did not exist yet.
    pub created_locales: Vec<String>,
    /// Keys removed because the default locale no longer mentions them.
    /// `None` when the service refused the cleanup.
    pub keys_removed: Option<u64>,
}

pub struct LocaleUpdater<R> {
    remote: R,
    project_id: Option<String>,
    format: FileFormat,
    default_locale: String,
    engine: MergeEngine,
}

impl<R: TranslationRemote> LocaleUpdater<R> {
    pub fn new(remote: R, project_id: Option<String>, format: FileFormat) -> Self {
        Self {
            remote,
            project_id,
            format,
            default_locale: "en".to_string(),
            engine: MergeEngine::default(),
        }
    }

    pub fn with_default_locale(mut self, default_locale: impl Into<String>) -> Self {
        self.default_locale = default_locale.into();
        self
    }

    pub fn with_engine(mut self, engine: MergeEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn project_id(&self) -> Result<&str, PhraseAppError> {
        self.project_id.as_deref().ok_or(PhraseAppError::MissingProjectId)
    }

    // -----------------------------------------------------------------------
    // Local merging and diffing
    // -----------------------------------------------------------------------

    /// Merge two sets of locale files against their common ancestors.
    ///
    /// Ours is the primary side: where both sides changed the same key, our
    /// value wins. A locale present on only one side is taken as is. Either
    /// every locale merges or an error naming the failing locale is returned.
    pub fn merge_locale_sets(
        &self,
        ours: Vec<LocaleFile>,
        theirs: Vec<LocaleFile>,
        ancestors: Vec<LocaleFile>,
    ) -> Result<Vec<LocaleFile>, UpdaterError> {
        let mut ours = index_by_locale(ours);
        let mut theirs = index_by_locale(theirs);
        let ancestors = index_by_locale(ancestors);

        let names: BTreeSet<String> = ours.keys().chain(theirs.keys()).cloned().collect();
        let mut merged = Vec::with_capacity(names.len());
        for name in names {
            let file = match (ours.remove(&name), theirs.remove(&name)) {
                (Some(our_file), Some(their_file)) => {
                    self.merge_locale_file(&our_file, &their_file, ancestors.get(&name))?
                }
                (Some(only), None) | (None, Some(only)) => only,
                (None, None) => continue,
            };
            merged.push(file);
        }
        Ok(merged)
    }

    fn merge_locale_file(
        &self,
        ours: &LocaleFile,
        theirs: &LocaleFile,
        ancestor: Option<&LocaleFile>,
    ) -> Result<LocaleFile, UpdaterError> {
        let locale = ours.locale_name();
        let empty = Tree::new();
        let ancestor_tree = ancestor.map(LocaleFile::tree).unwrap_or(&empty);

        let (tree, report) = self
            .engine
            .merge_with_report(ancestor_tree, ours.tree(), theirs.tree())
            .map_err(|source| UpdaterError::LocaleMergeFailed {
                locale: locale.to_string(),
                source,
            })?;
        debug!(
            locale,
            has_ancestor = ancestor.is_some(),
            ours = report.primary_operations,
            theirs = report.secondary_operations,
            dropped = report.secondary_dropped,
            conflicts = report.conflicts,
            "merged locale"
        );
        Ok(LocaleFile::from_tree(locale, self.format, &tree)?)
    }

    /// Merge three locale directories and write the result to `result`.
    pub fn merge_directories(
        &self,
        ours: &Path,
        theirs: &Path,
        ancestor: &Path,
        result: &Path,
    ) -> Result<Vec<LocaleFile>, UpdaterError> {
        let our_files = locale::load_directory(ours, self.format)?;
        let their_files = locale::load_directory(theirs, self.format)?;
        let ancestor_files = locale::load_directory(ancestor, self.format)?;

        let merged = self.merge_locale_sets(our_files, their_files, ancestor_files)?;
        locale::write_directory(result, &merged)?;
        info!(result = %result.display(), locales = merged.len(), "merged locale directories");
        Ok(merged)
    }

    /// Merge two single locale files, optionally against an ancestor file.
    ///
    /// The result is named after our file.
    pub fn merge_files(
        &self,
        ours: &Path,
        theirs: &Path,
        ancestor: Option<&Path>,
        result: &Path,
    ) -> Result<LocaleFile, UpdaterError> {
        let our_file = locale::load_file(ours, self.format)?;
        let their_file = locale::load_file(theirs, self.format)?;
        let ancestor_file = ancestor
            .map(|path| locale::load_file(path, self.format))
            .transpose()?;

        let merged = self.merge_locale_file(&our_file, &their_file, ancestor_file.as_ref())?;
        locale::write_file(result, &merged)?;
        info!(result = %result.display(), locale = %merged, "merged locale files");
        Ok(merged)
    }

    /// Flattened per-locale differences from `ours` to `theirs`.
    ///
    /// A locale on one side only is compared against an empty tree. Locales
    /// without differences are omitted.
    pub fn diff_directories(&self, ours: &Path, theirs: &Path) -> Result<Vec<LocaleDiff>, UpdaterError> {
        let ours = index_by_locale(locale::load_directory(ours, self.format)?);
        let theirs = index_by_locale(locale::load_directory(theirs, self.format)?);
        let codec = self.engine.codec();
        let empty = Tree::new();

        let names: BTreeSet<&String> = ours.keys().chain(theirs.keys()).collect();
        let mut diffs = Vec::new();
        for name in names {
            let from = codec.flatten(ours.get(name).map(LocaleFile::tree).unwrap_or(&empty))?;
            let to = codec.flatten(theirs.get(name).map(LocaleFile::tree).unwrap_or(&empty))?;
            let operations = diff(&from, &to);
            if !operations.is_empty() {
                diffs.push(LocaleDiff {
                    locale: name.clone(),
                    operations,
                });
            }
        }
        Ok(diffs)
    }

    // -----------------------------------------------------------------------
    // Remote transfers
    // -----------------------------------------------------------------------

    /// Download every remote locale and write it into `dir`.
    pub async fn download_to_directory(&self, dir: &Path) -> Result<Vec<LocaleFile>, UpdaterError> {
        let project_id = self.project_id()?;
        let locales = self.remote.fetch_locales(project_id).await?;
        info!(project_id, count = locales.len(), "downloading locales");

        let files: Vec<LocaleFile> = futures::stream::iter(locales.iter())
            .map(|remote_locale| async move {
                debug!(locale = %remote_locale, "downloading locale");
                let content = self
                    .remote
                    .download_locale(project_id, remote_locale, self.format.remote_format(), false)
                    .await?;
                Ok::<_, UpdaterError>(LocaleFile::from_content(
                    remote_locale.name.clone(),
                    self.format,
                    &content,
                )?)
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .try_collect()
            .await?;

        locale::write_directory(dir, &files)?;
        Ok(files)
    }

    /// Upload every locale file in `dir`.
    ///
    /// The default locale holds every legitimate key, so it is uploaded first
    /// and remote keys it does not mention are removed afterwards.
    pub async fn upload_directory(&self, dir: &Path) -> Result<UploadOutcome, UpdaterError> {
        let project_id = self.project_id()?;
        let files = locale::load_directory(dir, self.format)?;
        let (defaults, others): (Vec<LocaleFile>, Vec<LocaleFile>) = files
            .into_iter()
            .partition(|f| f.locale_name() == self.default_locale);
        let default_file = defaults
            .into_iter()
            .next()
            .ok_or_else(|| UpdaterError::MissingDefaultLocale(self.default_locale.clone()))?;

        let known: HashSet<String> = self
            .remote
            .fetch_locales(project_id)
            .await?
            .into_iter()
            .map(|l| l.name)
            .collect();
        let mut created_locales = Vec::new();
        for file in std::iter::once(&default_file).chain(others.iter()) {
            if !known.contains(file.locale_name()) {
                let is_default = file.locale_name() == self.default_locale;
                self.remote
                    .create_locale(project_id, file.locale_name(), is_default)
                    .await?;
                created_locales.push(file.locale_name().to_string());
            }
        }

        info!(locale = %default_file, "uploading default locale");
        let default_upload = self.remote.upload_locale(project_id, &default_file).await?;

        let other_uploads: Vec<(String, Upload)> = futures::stream::iter(others.iter())
            .map(|file| async move {
                info!(locale = %file, "uploading locale");
                let upload = self.remote.upload_locale(project_id, file).await?;
                Ok::<_, UpdaterError>((file.locale_name().to_string(), upload))
            })
            .buffered(MAX_CONCURRENT_REQUESTS)
            .try_collect()
            .await?;

        info!(upload_id = %default_upload.id, "removing keys not in default locale upload");
        let keys_removed = match self
            .remote
            .remove_keys_not_in_upload(project_id, &default_upload.id)
            .await
        {
            Ok(deleted) => Some(deleted.records_affected),
            // The service refuses cleanup after an upload it marked invalid,
            // typically an empty file.
            Err(PhraseAppError::ApiError { status, body }) => {
                warn!(status, body = %body, upload_id = %default_upload.id, "key cleanup rejected, ignoring");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let mut uploads = Vec::with_capacity(other_uploads.len() + 1);
        uploads.push((default_file.locale_name().to_string(), default_upload));
        uploads.extend(other_uploads);
        Ok(UploadOutcome {
            uploads,
            created_locales,
            keys_removed,
        })
    }

    // -----------------------------------------------------------------------
    // Projects and parent commits
    // -----------------------------------------------------------------------

    /// The git commit the remote project was last synchronized against.
    pub async fn read_parent_commit(&self) -> Result<String, UpdaterError> {
        let project_id = self.project_id()?;
        let tags = self.remote.list_tags(project_id).await?;
        let commit = tags
            .iter()
            .find_map(|t| t.name.strip_prefix(GIT_TAG_PREFIX))
            .ok_or(PhraseAppError::MissingGitParent)?;
        debug!(project_id, commit, "read parent commit");
        Ok(commit.to_string())
    }

    /// Replace the parent commit tag. A project without one simply gains it.
    pub async fn update_parent_commit(&self, commit: &str) -> Result<(), UpdaterError> {
        let project_id = self.project_id()?;
        match self.read_parent_commit().await {
            Ok(previous) => {
                self.remote
                    .delete_tag(project_id, &format!("{GIT_TAG_PREFIX}{previous}"))
                    .await?;
            }
            Err(UpdaterError::PhraseApp(PhraseAppError::MissingGitParent)) => {
                warn!(project_id, "project had no parent commit tag");
            }
            Err(e) => return Err(e),
        }
        self.store_parent_commit(project_id, commit).await?;
        info!(project_id, commit, "updated parent commit");
        Ok(())
    }

    async fn store_parent_commit(&self, project_id: &str, commit: &str) -> Result<(), UpdaterError> {
        self.remote
            .create_tag(project_id, &format!("{GIT_TAG_PREFIX}{commit}"))
            .await?;
        Ok(())
    }

    /// Create a project for this file format, tag it with `parent_commit`
    /// and make it the updater's project. Returns the new project ID.
    pub async fn create_project(&mut self, name: &str, parent_commit: &str) -> Result<String, UpdaterError> {
        let project = self
            .remote
            .create_project(name, self.format.remote_format())
            .await?;
        self.store_parent_commit(&project.id, parent_commit).await?;
        info!(project_id = %project.id, name, parent_commit, "created project");
        self.project_id = Some(project.id.clone());
        Ok(project.id)
    }

    pub async fn lookup_project(&self, name: &str) -> Result<String, UpdaterError> {
        Ok(self.remote.lookup_project_id(name).await?)
    }
}

fn index_by_locale(files: Vec<LocaleFile>) -> BTreeMap<String, LocaleFile> {
    files
        .into_iter()
        .map(|f| (f.locale_name().to_string(), f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree;

    /// A remote that must never be reached by local operations.
    struct OfflineRemote;

    #[async_trait::async_trait]
    impl TranslationRemote for OfflineRemote {
        async fn lookup_project_id(&self, name: &str) -> Result<String, PhraseAppError> {
            Err(PhraseAppError::ProjectNotFound { name: name.into() })
        }
        async fn create_project(&self, _: &str, _: &str) -> Result<crate::phraseapp::Project, PhraseAppError> {
            Err(PhraseAppError::MissingProjectId)
        }
        async fn list_tags(&self, _: &str) -> Result<Vec<crate::phraseapp::Tag>, PhraseAppError> {
            Ok(Vec::new())
        }
        async fn create_tag(&self, _: &str, _: &str) -> Result<crate::phraseapp::Tag, PhraseAppError> {
            Err(PhraseAppError::MissingProjectId)
        }
        async fn delete_tag(&self, _: &str, _: &str) -> Result<(), PhraseAppError> {
            Ok(())
        }
        async fn fetch_locales(&self, _: &str) -> Result<Vec<crate::phraseapp::Locale>, PhraseAppError> {
            Ok(Vec::new())
        }
        async fn create_locale(&self, _: &str, _: &str, _: bool) -> Result<crate::phraseapp::Locale, PhraseAppError> {
            Err(PhraseAppError::MissingProjectId)
        }
        async fn download_locale(
            &self,
            _: &str,
            _: &crate::phraseapp::Locale,
            _: &str,
            _: bool,
        ) -> Result<String, PhraseAppError> {
            Err(PhraseAppError::MissingProjectId)
        }
        async fn upload_locale(&self, _: &str, _: &LocaleFile) -> Result<Upload, PhraseAppError> {
            Err(PhraseAppError::MissingProjectId)
        }
        async fn remove_keys_not_in_upload(
            &self,
            _: &str,
            _: &str,
        ) -> Result<crate::phraseapp::KeysDeleted, PhraseAppError> {
            Err(PhraseAppError::MissingProjectId)
        }
    }

    fn updater() -> LocaleUpdater<OfflineRemote> {
        LocaleUpdater::new(OfflineRemote, None, FileFormat::Json)
    }

    fn file(name: &str, tree: Tree) -> LocaleFile {
        LocaleFile::from_tree(name, FileFormat::Json, &tree).unwrap()
    }

    #[test]
    fn test_merge_locale_sets_ours_wins() {
        let ours = vec![file("en", tree! { "a" => "ours" })];
        let theirs = vec![file("en", tree! { "a" => "theirs", "b" => "new" })];
        let ancestors = vec![file("en", tree! { "a" => "base" })];

        let merged = updater().merge_locale_sets(ours, theirs, ancestors).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].tree(), &tree! { "a" => "ours", "b" => "new" });
    }

    #[test]
    fn test_merge_locale_sets_one_sided_locales() {
        let ours = vec![file("en", tree! { "a" => "x" }), file("fr", tree! { "a" => "fr" })];
        let theirs = vec![file("de", tree! { "a" => "de" }), file("en", tree! { "a" => "x" })];

        let merged = updater().merge_locale_sets(ours, theirs, Vec::new()).unwrap();
        let names: Vec<&str> = merged.iter().map(LocaleFile::locale_name).collect();
        assert_eq!(names, vec!["de", "en", "fr"]);
        assert_eq!(merged[0].tree(), &tree! { "a" => "de" });
    }

    #[test]
    fn test_merge_locale_sets_names_failing_locale() {
        let ours = vec![file("en", tree! { "a.b" => "x" })];
        let theirs = vec![file("en", tree! { "c" => "y" })];

        let err = updater().merge_locale_sets(ours, theirs, Vec::new()).unwrap_err();
        assert!(matches!(err, UpdaterError::LocaleMergeFailed { ref locale, .. } if locale == "en"));
    }

    #[test]
    fn test_project_id_required() {
        assert!(matches!(updater().project_id(), Err(PhraseAppError::MissingProjectId)));
    }

    #[test]
    fn test_diff_directories() {
        let ours = tempfile::tempdir().unwrap();
        let theirs = tempfile::tempdir().unwrap();
        std::fs::write(ours.path().join("en.json"), r#"{"a": {"b": "x"}, "c": "same"}"#).unwrap();
        std::fs::write(theirs.path().join("en.json"), r#"{"a": {"b": "y"}, "c": "same"}"#).unwrap();
        std::fs::write(theirs.path().join("fr.json"), r#"{"a": "fr"}"#).unwrap();

        let diffs = updater().diff_directories(ours.path(), theirs.path()).unwrap();
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].locale, "en");
        assert_eq!(
            diffs[0].operations,
            vec![Operation::Change {
                path: "a.b".into(),
                old: "x".into(),
                new: "y".into(),
            }]
        );
        assert_eq!(diffs[1].locale, "fr");
        assert!(diffs[1].operations[0].is_add());
    }

    #[test]
    fn test_merge_files_without_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let ours = dir.path().join("ours.json");
        let theirs = dir.path().join("theirs.json");
        let result = dir.path().join("result.json");
        std::fs::write(&ours, r#"{"a": "1"}"#).unwrap();
        std::fs::write(&theirs, r#"{"b": "2"}"#).unwrap();

        let merged = updater().merge_files(&ours, &theirs, None, &result).unwrap();
        assert_eq!(merged.locale_name(), "ours");
        assert_eq!(
            std::fs::read_to_string(&result).unwrap(),
            "{\n  \"a\": \"1\",\n  \"b\": \"2\"\n}\n"
        );
    }
}
