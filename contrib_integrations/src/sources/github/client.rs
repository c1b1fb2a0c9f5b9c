//! GitHub REST API v3 client used by the GitHub source.
//!
//! The token is read from `GITHUB_TOKEN` on first use and cached for the life of the client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contrib_core::{Error, Result};
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::instrument;

pub const RESULTS_PER_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Owner {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub fork: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitAuthor {
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: CommitAuthor,
}

/// Item of `GET /search/commits`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitItem {
    pub html_url: String,
    pub commit: CommitDetail,
    pub repository: Repository,
}

/// Item of `GET /search/issues` (issues and pull requests).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssueItem {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub repository_url: String,
    #[serde(default)]
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewItem {
    pub html_url: String,
    pub state: String,
    /// Absent on pending reviews.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommentItem {
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    items: Vec<T>,
}

/// `owner/repo` pair parsed from an API `repository_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

static REPO_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/repos/([^/]+)/([^/]+?)/?$").expect("repo url regex"));

impl RepoRef {
    pub fn from_api_url(url: &str) -> Option<Self> {
        let caps = REPO_URL.captures(url)?;
        Some(Self {
            owner: caps.get(1)?.as_str().to_string(),
            repo: caps.get(2)?.as_str().to_string(),
        })
    }
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Whether the token carries the `repo` (private repositories) OAuth scope.
    async fn token_has_private_scope(&self) -> Result<bool>;

    async fn search_commits(&self, query: &str, page: u32) -> Result<Vec<CommitItem>>;

    async fn search_issues(&self, query: &str, page: u32) -> Result<Vec<IssueItem>>;

    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<ReviewItem>>;

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<CommentItem>>;
}

pub struct GithubRestClient {
    client: Client,
    api_base: String,
    token: OnceCell<String>,
}

impl GithubRestClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::backend_reqwest)?;
        Ok(Self {
            client,
            api_base: "https://api.github.com".to_string(),
            token: OnceCell::new(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Uses `token` instead of reading `GITHUB_TOKEN`.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        let _ = self.token.set(token.into());
        self
    }

    async fn token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                tracing::debug!("reading GITHUB_TOKEN");
                match std::env::var("GITHUB_TOKEN") {
                    Ok(v) if !v.trim().is_empty() => Ok(v),
                    _ => Err(Error::Precondition {
                        section: "github",
                        message: "no GITHUB_TOKEN provided in the environment".to_string(),
                    }),
                }
            })
            .await?;
        Ok(token.as_str())
    }

    async fn headers(&self) -> Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static("contrib-aggregator"));
        h.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        let auth = format!("Bearer {}", self.token().await?);
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| Error::backend("invalid github auth header", e))?,
        );
        Ok(h)
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}", self.api_base, path);
        Url::parse(&raw).map_err(|e| Error::InvalidInput(format!("invalid url '{raw}': {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let headers = self.headers().await?;
        let resp = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(Error::backend_reqwest)?
            .error_for_status()
            .map_err(Error::backend_reqwest)?;
        resp.json().await.map_err(Error::backend_reqwest)
    }

    async fn search<T: DeserializeOwned>(
        &self,
        kind: &str,
        query: &str,
        sort: &str,
        page: u32,
    ) -> Result<Vec<T>> {
        let mut url = self.url(&format!("/search/{kind}"))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("sort", sort)
            .append_pair("per_page", &RESULTS_PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        let page: SearchPage<T> = self.get(url).await?;
        Ok(page.items)
    }
}

#[async_trait]
impl GithubApi for GithubRestClient {
    #[instrument(level = "debug", skip(self))]
    async fn token_has_private_scope(&self) -> Result<bool> {
        let headers = self.headers().await?;
        let resp = self
            .client
            .get(self.url("/")?)
            .headers(headers)
            .send()
            .await
            .map_err(Error::backend_reqwest)?
            .error_for_status()
            .map_err(Error::backend_reqwest)?;
        let scopes = resp
            .headers()
            .get("x-oauth-scopes")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(scopes.split(',').any(|s| s.trim() == "repo"))
    }

    #[instrument(level = "debug", skip(self))]
    async fn search_commits(&self, query: &str, page: u32) -> Result<Vec<CommitItem>> {
        self.search("commits", query, "committer-date", page).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn search_issues(&self, query: &str, page: u32) -> Result<Vec<IssueItem>> {
        self.search("issues", query, "created", page).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_reviews(&self, repo: &RepoRef, number: u64) -> Result<Vec<ReviewItem>> {
        let mut url = self.url(&format!(
            "/repos/{}/{}/pulls/{number}/reviews",
            repo.owner, repo.repo
        ))?;
        url.query_pairs_mut()
            .append_pair("per_page", &RESULTS_PER_PAGE.to_string());
        self.get(url).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<CommentItem>> {
        let mut url = self.url(&format!(
            "/repos/{}/{}/issues/{number}/comments",
            repo.owner, repo.repo
        ))?;
        url.query_pairs_mut()
            .append_pair("per_page", &RESULTS_PER_PAGE.to_string());
        self.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_ref_from_api_url() {
        let r = RepoRef::from_api_url("https://api.github.com/repos/mozilla/addons-server").unwrap();
        assert_eq!(r.owner, "mozilla");
        assert_eq!(r.repo, "addons-server");
        assert!(RepoRef::from_api_url("https://github.com/mozilla").is_none());
        assert_eq!(
            RepoRef::from_api_url("https://api.github.com/repos/octo/repo.name/").unwrap(),
            RepoRef {
                owner: "octo".into(),
                repo: "repo.name".into(),
            }
        );
    }

    #[test]
    fn decodes_search_items() {
        let raw = r#"{"total_count":1,"items":[{
            "html_url":"https://github.com/contribution-test/foo/commit/abc",
            "commit":{"message":"Test Commit Message","author":{"date":"2022-03-02T00:00:00Z"}},
            "repository":{"name":"foo","owner":{"login":"contribution-test"},"private":false,"fork":false}
        }]}"#;
        let page: SearchPage<CommitItem> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items[0].repository.owner.login, "contribution-test");
    }

    #[tokio::test]
    async fn injected_token_skips_environment() {
        let client = GithubRestClient::new().unwrap().with_token("t0ken");
        assert_eq!(client.token().await.unwrap(), "t0ken");
    }
}
