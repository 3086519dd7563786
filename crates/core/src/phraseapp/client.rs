//! PhraseApp v2 REST API client.

use std::future::Future;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::errors::PhraseAppError;
use crate::locale::LocaleFile;

use super::models::{KeysDeleted, Locale, Project, Tag, Upload};
use super::retry::RetryPolicy;
use super::TranslationRemote;

/// Items requested per page from paginated listings.
pub const PAGE_SIZE: u32 = 100;

/// Tag attached to every upload, so uploads made by this tool can be found.
pub fn upload_tag(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("phrasesync_upload_{}", now.format("%Y%m%d%H%M%S"))
}

/// Asynchronous PhraseApp API client.
#[derive(Clone)]
pub struct PhraseAppClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for PhraseAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhraseAppClient")
            .field("api_url", &self.api_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl PhraseAppClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, PhraseAppError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("phrasesync/", env!("CARGO_PKG_VERSION"))),
        );
        let http = reqwest::Client::builder().default_headers(headers).build()?;
        info!(api_url = %api_url, "created PhraseAppClient");
        Ok(Self {
            http,
            api_url,
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// Send a request, retrying failures `replay` allows per the retry policy.
    ///
    /// `build` is called once per attempt since request bodies (multipart
    /// forms in particular) cannot be replayed.
    async fn send<F>(
        &self,
        build: F,
        project_id: Option<&str>,
        replay: Replay,
    ) -> Result<Response, PhraseAppError>
    where
        F: Fn() -> RequestBuilder,
    {
        let build = &build;
        let token = self.token.as_str();
        self.retry
            .run(
                move || async move {
                    let resp = build()
                        .header(AUTHORIZATION, format!("token {token}"))
                        .send()
                        .await
                        .map_err(PhraseAppError::from)?;
                    check_response(resp, project_id).await
                },
                |e: &PhraseAppError| replay.allows(e),
            )
            .await
    }

    /// Walk a paginated listing, keeping items that match `filter`.
    async fn paginate<T, P>(
        &self,
        path: &str,
        project_id: Option<&str>,
        limit: Option<usize>,
        filter: P,
    ) -> Result<Vec<T>, PhraseAppError>
    where
        T: DeserializeOwned,
        P: FnMut(&T) -> bool,
    {
        let url = self.url(path);
        let url = url.as_str();
        let per_page = PAGE_SIZE.to_string();
        let per_page = per_page.as_str();

        let results = collect_pages(limit, filter, move |page| async move {
            let page = page.to_string();
            let resp = self
                .send(
                    || {
                        self.http
                            .get(url)
                            .query(&[("page", page.as_str()), ("per_page", per_page)])
                    },
                    project_id,
                    Replay::Idempotent,
                )
                .await?;
            parse_json(resp).await
        })
        .await?;
        debug!(path, count = results.len(), "paginated listing complete");
        Ok(results)
    }
}

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Reads and deletes: any transient failure.
    Idempotent,
    /// Creates: only failures the server cannot have acted on.
    Create,
}

impl Replay {
    fn allows(self, error: &PhraseAppError) -> bool {
        match self {
            Replay::Idempotent => error.is_transient(),
            Replay::Create => error.is_unprocessed(),
        }
    }
}

/// Fetch pages 1, 2, ... keeping items that match `filter`.
///
/// Stops at the first empty page, or as soon as `limit` matches are found.
async fn collect_pages<T, P, F, Fut>(
    limit: Option<usize>,
    mut filter: P,
    mut fetch: F,
) -> Result<Vec<T>, PhraseAppError>
where
    P: FnMut(&T) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, PhraseAppError>>,
{
    let mut results = Vec::new();
    let mut page: u32 = 1;
    loop {
        let items = fetch(page).await?;
        if items.is_empty() {
            return Ok(results);
        }
        for item in items {
            if filter(&item) {
                results.push(item);
                if limit.is_some_and(|limit| results.len() >= limit) {
                    debug!(page, "pagination limit reached");
                    return Ok(results);
                }
            }
        }
        page += 1;
    }
}

#[async_trait]
impl TranslationRemote for PhraseAppClient {
    #[instrument(skip(self))]
    async fn lookup_project_id(&self, name: &str) -> Result<String, PhraseAppError> {
        let found: Vec<Project> = self
            .paginate("projects", None, Some(1), |p: &Project| p.name == name)
            .await?;
        let project = found
            .into_iter()
            .next()
            .ok_or_else(|| PhraseAppError::ProjectNotFound { name: name.to_string() })?;
        debug!(project_id = %project.id, "found project");
        Ok(project.id)
    }

    #[instrument(skip(self))]
    async fn create_project(&self, name: &str, main_format: &str) -> Result<Project, PhraseAppError> {
        let url = self.url("projects");
        let body = serde_json::json!({ "name": name, "main_format": main_format });
        let resp = self.send(|| self.http.post(&url).json(&body), None, Replay::Create).await?;
        let project: Project = parse_json(resp).await?;
        info!(project_id = %project.id, name, "created project");
        Ok(project)
    }

    #[instrument(skip(self))]
    async fn list_tags(&self, project_id: &str) -> Result<Vec<Tag>, PhraseAppError> {
        self.paginate(
            &format!("projects/{project_id}/tags"),
            Some(project_id),
            None,
            |_: &Tag| true,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn create_tag(&self, project_id: &str, name: &str) -> Result<Tag, PhraseAppError> {
        let url = self.url(&format!("projects/{project_id}/tags"));
        let body = serde_json::json!({ "name": name });
        let resp = self
            .send(|| self.http.post(&url).json(&body), Some(project_id), Replay::Create)
            .await?;
        let tag: Tag = parse_json(resp).await?;
        info!(tag = %tag.name, "created tag");
        Ok(tag)
    }

    #[instrument(skip(self))]
    async fn delete_tag(&self, project_id: &str, name: &str) -> Result<(), PhraseAppError> {
        let url = self.url(&format!("projects/{project_id}/tags/{name}"));
        self.send(|| self.http.delete(&url), Some(project_id), Replay::Idempotent)
            .await?;
        info!(tag = name, "deleted tag");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_locales(&self, project_id: &str) -> Result<Vec<Locale>, PhraseAppError> {
        let locales: Vec<Locale> = self
            .paginate(
                &format!("projects/{project_id}/locales"),
                Some(project_id),
                None,
                |_: &Locale| true,
            )
            .await?;
        debug!(count = locales.len(), "fetched locales");
        Ok(locales)
    }

    #[instrument(skip(self))]
    async fn create_locale(
        &self,
        project_id: &str,
        name: &str,
        default: bool,
    ) -> Result<Locale, PhraseAppError> {
        let url = self.url(&format!("projects/{project_id}/locales"));
        let body = serde_json::json!({ "name": name, "code": name, "default": default });
        let resp = self
            .send(|| self.http.post(&url).json(&body), Some(project_id), Replay::Create)
            .await?;
        let locale: Locale = parse_json(resp).await?;
        info!(locale = %locale, default, "created locale");
        Ok(locale)
    }

    #[instrument(skip(self, locale), fields(locale = %locale.name))]
    async fn download_locale(
        &self,
        project_id: &str,
        locale: &Locale,
        file_format: &str,
        skip_unverified: bool,
    ) -> Result<String, PhraseAppError> {
        let url = self.url(&format!("projects/{project_id}/locales/{}/download", locale.id));
        let skip = skip_unverified.to_string();
        let resp = self
            .send(
                || {
                    self.http.get(&url).query(&[
                        ("file_format", file_format),
                        ("skip_unverified_translations", skip.as_str()),
                    ])
                },
                Some(project_id),
                Replay::Idempotent,
            )
            .await?;
        let content = resp.text().await?;
        debug!(bytes = content.len(), "downloaded locale");
        Ok(content)
    }

    #[instrument(skip(self, file), fields(locale = %file))]
    async fn upload_locale(&self, project_id: &str, file: &LocaleFile) -> Result<Upload, PhraseAppError> {
        let url = self.url(&format!("projects/{project_id}/uploads"));
        let tag = upload_tag(chrono::Utc::now());
        let format = file.format().remote_format();
        let resp = self
            .send(
                || {
                    let part = Part::bytes(file.content().as_bytes().to_vec()).file_name(file.filename());
                    let form = Form::new()
                        .part("file", part)
                        .text("file_format", format)
                        .text("file_encoding", "UTF-8")
                        .text("locale_id", file.locale_name().to_string())
                        .text("update_translations", "true")
                        .text("skip_unverification", "false")
                        .text("tags", tag.clone());
                    self.http.post(&url).multipart(form)
                },
                Some(project_id),
                Replay::Create,
            )
            .await?;
        let upload: Upload = parse_json(resp).await?;
        info!(upload_id = %upload.id, tag = %tag, "uploaded locale");
        Ok(upload)
    }

    #[instrument(skip(self))]
    async fn remove_keys_not_in_upload(
        &self,
        project_id: &str,
        upload_id: &str,
    ) -> Result<KeysDeleted, PhraseAppError> {
        let url = self.url(&format!("projects/{project_id}/keys"));
        let query = format!("unmentioned_in_upload:{upload_id}");
        let resp = self
            .send(
                || self.http.delete(&url).query(&[("q", query.as_str())]),
                Some(project_id),
                Replay::Idempotent,
            )
            .await?;
        let deleted: KeysDeleted = parse_json(resp).await?;
        info!(records_affected = deleted.records_affected, "removed keys not in upload");
        Ok(deleted)
    }
}

async fn check_response(resp: Response, project_id: Option<&str>) -> Result<Response, PhraseAppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), body, retry_after, project_id))
}

/// Map a non-success status and body to a typed error.
pub(crate) fn classify_status(
    status: u16,
    body: String,
    retry_after: Option<String>,
    project_id: Option<&str>,
) -> PhraseAppError {
    match status {
        401 => PhraseAppError::BadApiKey(body),
        404 => PhraseAppError::NotFound {
            project_id: project_id.unwrap_or("<none>").to_string(),
            detail: body,
        },
        422 if body.contains("has already been taken") => PhraseAppError::ProjectNameTaken(body),
        429 => PhraseAppError::RateLimited {
            retry_after: retry_after.unwrap_or_else(|| "unknown".into()),
        },
        _ => PhraseAppError::ApiError { status, body },
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T, PhraseAppError> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| PhraseAppError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(401, "Unauthorized".into(), None, Some("p1")),
            PhraseAppError::BadApiKey(_)
        ));
        assert!(matches!(
            classify_status(404, "Not Found".into(), None, Some("p1")),
            PhraseAppError::NotFound { ref project_id, .. } if project_id == "p1"
        ));
        assert!(matches!(
            classify_status(422, r#"{"errors":[{"message":"has already been taken"}]}"#.into(), None, None),
            PhraseAppError::ProjectNameTaken(_)
        ));
        assert!(matches!(
            classify_status(422, "Validation failed".into(), None, None),
            PhraseAppError::ApiError { status: 422, .. }
        ));
        assert!(matches!(
            classify_status(429, String::new(), Some("30".into()), None),
            PhraseAppError::RateLimited { ref retry_after } if retry_after == "30"
        ));
    }

    #[test]
    fn test_classified_transience() {
        assert!(classify_status(503, String::new(), None, None).is_transient());
        assert!(classify_status(429, String::new(), None, None).is_transient());
        assert!(!classify_status(401, String::new(), None, None).is_transient());
        assert!(!classify_status(400, String::new(), None, None).is_transient());
    }

    #[test]
    fn test_upload_tag_format() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(upload_tag(now), "phrasesync_upload_20240309070501");
    }

    #[test]
    fn test_url_joining() {
        let client = PhraseAppClient::new("https://api.example.com/v2/", "tok").unwrap();
        assert_eq!(client.api_url(), "https://api.example.com/v2");
        assert_eq!(
            client.url("/projects/p1/tags"),
            "https://api.example.com/v2/projects/p1/tags"
        );
    }

    #[test]
    fn test_creates_only_replay_unprocessed_failures() {
        let server_error = classify_status(503, String::new(), None, Some("p1"));
        let rate_limited = classify_status(429, String::new(), Some("5".into()), Some("p1"));
        let taken = classify_status(422, "has already been taken".into(), None, None);

        assert!(Replay::Idempotent.allows(&server_error));
        assert!(Replay::Idempotent.allows(&rate_limited));
        assert!(!Replay::Create.allows(&server_error));
        assert!(Replay::Create.allows(&rate_limited));
        assert!(!Replay::Create.allows(&taken));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_not_resent_after_server_error() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::default()
            .run(
                || {
                    calls += 1;
                    async { Err(classify_status(502, String::new(), None, None)) }
                },
                |e: &PhraseAppError| Replay::Create.allows(e),
            )
            .await;
        assert!(matches!(result, Err(PhraseAppError::ApiError { status: 502, .. })));
        assert_eq!(calls, 1);
    }

    fn project(id: &str, name: &str) -> Project {
        Project {
            id: id.into(),
            name: name.into(),
            main_format: None,
        }
    }

    #[tokio::test]
    async fn test_pages_stop_at_first_match_when_limited() {
        let pages = vec![
            vec![project("p1", "web"), project("p2", "ios")],
            vec![project("p3", "android"), project("p4", "site")],
            vec![project("p5", "android")],
        ];
        let mut requested = Vec::new();
        let found = collect_pages(
            Some(1),
            |p: &Project| p.name == "android",
            |page| {
                requested.push(page);
                let items = pages.get(page as usize - 1).cloned().unwrap_or_default();
                async move { Ok(items) }
            },
        )
        .await
        .unwrap();

        assert_eq!(found, vec![project("p3", "android")]);
        assert_eq!(requested, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_pages_end_at_empty_page() {
        let pages = vec![vec!["a", "b"], vec!["c"]];
        let mut requested = Vec::new();
        let all = collect_pages(
            None,
            |_: &&str| true,
            |page| {
                requested.push(page);
                let items = pages.get(page as usize - 1).cloned().unwrap_or_default();
                async move { Ok(items) }
            },
        )
        .await
        .unwrap();

        assert_eq!(all, vec!["a", "b", "c"]);
        assert_eq!(requested, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_page_failure_aborts_listing() {
        let mut requested = Vec::new();
        let result: Result<Vec<Tag>, _> = collect_pages(
            None,
            |_: &Tag| true,
            |page| {
                requested.push(page);
                let outcome = if page == 1 {
                    Ok(vec![Tag { name: "release".into() }])
                } else {
                    Err(classify_status(401, "Unauthorized".into(), None, Some("p1")))
                };
                async move { outcome }
            },
        )
        .await;

        assert!(matches!(result, Err(PhraseAppError::BadApiKey(_))));
        assert_eq!(requested, vec![1, 2]);
    }

    #[test]
    fn test_debug_hides_token() {
        let client = PhraseAppClient::new("https://api.example.com/v2", "secret-token").unwrap();
        assert!(!format!("{client:?}").contains("secret-token"));
    }
}
