//! GitHub source: commits, created issues and PRs, reviews, and issue comments.
//!
//! Every category keeps its own high-water mark. Search results are walked month by month
//! (100 per page, at most 10 pages per window since the search API stops there).

pub mod client;

use crate::http::pause;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use client::{CommentItem, CommitItem, GithubApi, IssueItem, RESULTS_PER_PAGE, RepoRef, ReviewItem};
use contrib_core::config::{GITHUB, GithubTypeNames};
use contrib_core::{
    Contribution, Error, GithubSettings, MonthWindow, MonthWindows, PageCursor, PageState,
    Result, Retention, SnapshotView, Source, SourceTag,
};
use std::sync::Arc;
use tracing::instrument;

const MAX_PAGES_PER_WINDOW: u32 = 10;

pub const TAGS: &[SourceTag] = &[
    SourceTag::GithubCommit,
    SourceTag::GithubIssuesCreated,
    SourceTag::GithubPrCreated,
    SourceTag::GithubReviews,
    SourceTag::GithubComments,
];

/// A raw upstream item, tagged by the endpoint that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItemKind {
    Commit(CommitItem),
    Issue(IssueItem),
    PullRequest(IssueItem),
    Review { review: ReviewItem, pull: IssueItem },
    Comment { comment: CommentItem, issue: IssueItem },
}

impl RawItemKind {
    fn html_url(&self) -> &str {
        match self {
            RawItemKind::Commit(c) => &c.html_url,
            RawItemKind::Issue(i) | RawItemKind::PullRequest(i) => &i.html_url,
            RawItemKind::Review { pull, .. } => &pull.html_url,
            RawItemKind::Comment { issue, .. } => &issue.html_url,
        }
    }

    fn is_fork(&self) -> bool {
        let repo = match self {
            RawItemKind::Commit(c) => Some(&c.repository),
            RawItemKind::Issue(i) | RawItemKind::PullRequest(i) => i.repository.as_ref(),
            RawItemKind::Review { pull, .. } => pull.repository.as_ref(),
            RawItemKind::Comment { issue, .. } => issue.repository.as_ref(),
        };
        repo.is_some_and(|r| r.fork)
    }
}

/// Normalizes one raw item. Pending reviews (no submission time) yield `None`.
pub fn format(types: &GithubTypeNames, item: &RawItemKind) -> Option<Contribution> {
    let contribution = match item {
        RawItemKind::Commit(c) => {
            let (description, link) = if c.repository.private {
                (types.private_commit.clone(), String::new())
            } else {
                (
                    format!(
                        "{}/{}: {}",
                        c.repository.owner.login, c.repository.name, c.commit.message
                    ),
                    c.html_url.clone(),
                )
            };
            Contribution::new(
                c.commit.author.date,
                description,
                link,
                &types.commit,
                SourceTag::GithubCommit,
            )
        }
        RawItemKind::Issue(i) => Contribution::new(
            i.created_at,
            &i.title,
            &i.html_url,
            &types.created_issue,
            SourceTag::GithubIssuesCreated,
        ),
        RawItemKind::PullRequest(p) => Contribution::new(
            p.created_at,
            &p.title,
            &p.html_url,
            &types.created_pr,
            SourceTag::GithubPrCreated,
        ),
        RawItemKind::Review { review, pull } => {
            let kind = match review.state.as_str() {
                "APPROVED" => &types.approved_pr,
                "CHANGES_REQUESTED" => &types.changes_requested_pr,
                "COMMENTED" => &types.commented_pr,
                _ => &types.reviewed_pr,
            };
            Contribution::new(
                review.submitted_at?,
                &pull.title,
                &review.html_url,
                kind,
                SourceTag::GithubReviews,
            )
        }
        RawItemKind::Comment { comment, issue } => Contribution::new(
            comment.created_at,
            &issue.title,
            &comment.html_url,
            &types.commented,
            SourceTag::GithubComments,
        ),
    };
    Some(contribution)
}

pub struct GithubSource {
    settings: GithubSettings,
    api: Arc<dyn GithubApi>,
    now: Option<DateTime<Utc>>,
}

impl GithubSource {
    pub fn new(settings: GithubSettings, api: Arc<dyn GithubApi>) -> Self {
        Self {
            settings,
            api,
            now: None,
        }
    }

    /// Pins "now" for the month walk.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn is_relevant(&self, item: &RawItemKind) -> bool {
        self.settings.filter.is_match(item.html_url()) && !item.is_fork()
    }

    fn by_user(&self, login: Option<&str>) -> bool {
        login.is_some_and(|l| l.eq_ignore_ascii_case(&self.settings.username))
    }

    fn finish(&self, items: Vec<RawItemKind>, cursor: DateTime<Utc>) -> Vec<Contribution> {
        items
            .iter()
            .filter_map(|item| format(&self.settings.types, item))
            .filter(|c| c.created_at > cursor)
            .collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn ensure_scope_allowed(&self) -> Result<()> {
        let private = self.api.token_has_private_scope().await?;
        if private && !self.settings.allow_private {
            return Err(Error::Precondition {
                section: GITHUB,
                message: "GITHUB_TOKEN has private repo scope, but allowPrivate is not set. \
                          Are you sure you want to fetch private information?"
                    .to_string(),
            });
        }
        Ok(())
    }

    async fn commit_page(&self, window: &MonthWindow, page: u32) -> Vec<CommitItem> {
        let query = format!("author:{} author-date:{window}", self.settings.username);
        pause(self.settings.delay).await;
        match self.api.search_commits(&query, page).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, %window, page, "commit search failed, skipping page");
                Vec::new()
            }
        }
    }

    async fn issue_page(&self, query: &str, page: u32) -> Vec<IssueItem> {
        pause(self.settings.delay).await;
        match self.api.search_issues(query, page).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, query, page, "issue search failed, skipping page");
                Vec::new()
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn search_commits(&self, lower: DateTime<Utc>) -> Vec<CommitItem> {
        let mut out = Vec::new();
        for window in MonthWindows::new(self.now(), lower) {
            let mut cursor = PageCursor::new(RESULTS_PER_PAGE).with_max_pages(MAX_PAGES_PER_WINDOW);
            while !cursor.is_done() {
                let items = self.commit_page(&window, cursor.page() + 1).await;
                tracing::debug!(%window, count = items.len(), "commits page");
                let state = cursor.record(items.len());
                out.extend(items);
                if state == PageState::Exhausted {
                    break;
                }
            }
        }
        out
    }

    /// Walks `/search/issues` with `qualifier` (e.g. `author:<u>`) and `is_kind`
    /// (e.g. `is:issue`) over the month windows down to `lower`.
    #[instrument(level = "debug", skip(self))]
    async fn search_issues(
        &self,
        qualifier: &str,
        is_kind: &str,
        lower: DateTime<Utc>,
    ) -> Vec<IssueItem> {
        let mut out = Vec::new();
        for window in MonthWindows::new(self.now(), lower) {
            let query = format!("{qualifier} created:{window} {is_kind}");
            let mut cursor = PageCursor::new(RESULTS_PER_PAGE).with_max_pages(MAX_PAGES_PER_WINDOW);
            while !cursor.is_done() {
                let items = self.issue_page(&query, cursor.page() + 1).await;
                tracing::debug!(%window, count = items.len(), "issues page");
                let state = cursor.record(items.len());
                out.extend(items);
                if state == PageState::Exhausted {
                    break;
                }
            }
        }
        out
    }

    #[instrument(level = "info", skip(self))]
    async fn gather_commits(&self, cursor: DateTime<Utc>) -> Vec<Contribution> {
        let items: Vec<RawItemKind> = self
            .search_commits(cursor.max(self.settings.stop_date))
            .await
            .into_iter()
            .map(RawItemKind::Commit)
            .filter(|item| self.is_relevant(item))
            .collect();
        self.finish(items, cursor)
    }

    #[instrument(level = "info", skip(self))]
    async fn gather_created(
        &self,
        is_kind: &str,
        cursor: DateTime<Utc>,
        wrap: fn(IssueItem) -> RawItemKind,
    ) -> Vec<Contribution> {
        let qualifier = format!("author:{}", self.settings.username);
        let items: Vec<RawItemKind> = self
            .search_issues(&qualifier, is_kind, cursor.max(self.settings.stop_date))
            .await
            .into_iter()
            .map(wrap)
            .filter(|item| self.is_relevant(item))
            .collect();
        self.finish(items, cursor)
    }

    /// Reviews and comments can land on PRs and issues created long before the cursor,
    /// so their search starts a year earlier (never before `stopDate`).
    fn follow_up_lower_bound(&self, cursor: DateTime<Utc>) -> DateTime<Utc> {
        (cursor - ChronoDuration::days(365)).max(self.settings.stop_date)
    }

    /// Parents that fail the relevance filter are dropped before any follow-up request.
    fn relevant_parents(
        &self,
        parents: Vec<IssueItem>,
        wrap: fn(IssueItem) -> RawItemKind,
    ) -> Vec<IssueItem> {
        parents
            .into_iter()
            .filter(|p| self.is_relevant(&wrap(p.clone())))
            .collect()
    }

    #[instrument(level = "info", skip(self))]
    async fn gather_reviews(&self, cursor: DateTime<Utc>) -> Vec<Contribution> {
        let qualifier = format!("reviewed-by:{}", self.settings.username);
        let pulls = self
            .search_issues(&qualifier, "is:pull-request", self.follow_up_lower_bound(cursor))
            .await;
        let pulls = self.relevant_parents(pulls, RawItemKind::PullRequest);
        tracing::debug!(count = pulls.len(), "fetching reviews for relevant PRs");

        let mut items = Vec::new();
        for pull in pulls {
            let Some(repo) = RepoRef::from_api_url(&pull.repository_url) else {
                tracing::warn!(url = %pull.repository_url, "unrecognized repository url");
                continue;
            };
            pause(self.settings.delay).await;
            let reviews = match self.api.list_reviews(&repo, pull.number).await {
                Ok(reviews) => reviews,
                Err(e) => {
                    tracing::warn!(error = %e, owner = %repo.owner, repo = %repo.repo, number = pull.number, "listing reviews failed");
                    continue;
                }
            };
            items.extend(
                reviews
                    .into_iter()
                    .filter(|r| self.by_user(r.user.as_ref().map(|u| u.login.as_str())))
                    .map(|review| RawItemKind::Review {
                        review,
                        pull: pull.clone(),
                    }),
            );
        }
        self.finish(items, cursor)
    }

    #[instrument(level = "info", skip(self))]
    async fn gather_comments(&self, cursor: DateTime<Utc>) -> Vec<Contribution> {
        let qualifier = format!("commenter:{}", self.settings.username);
        let issues = self
            .search_issues(&qualifier, "is:issue", self.follow_up_lower_bound(cursor))
            .await;
        let issues = self.relevant_parents(issues, RawItemKind::Issue);
        tracing::debug!(count = issues.len(), "fetching comments for relevant issues");

        let mut items = Vec::new();
        for issue in issues {
            let Some(repo) = RepoRef::from_api_url(&issue.repository_url) else {
                tracing::warn!(url = %issue.repository_url, "unrecognized repository url");
                continue;
            };
            pause(self.settings.delay).await;
            let comments = match self.api.list_comments(&repo, issue.number).await {
                Ok(comments) => comments,
                Err(e) => {
                    tracing::warn!(error = %e, owner = %repo.owner, repo = %repo.repo, number = issue.number, "listing comments failed");
                    continue;
                }
            };
            items.extend(
                comments
                    .into_iter()
                    .filter(|c| self.by_user(c.user.as_ref().map(|u| u.login.as_str())))
                    .map(|comment| RawItemKind::Comment {
                        comment,
                        issue: issue.clone(),
                    }),
            );
        }
        self.finish(items, cursor)
    }
}

#[async_trait]
impl Source for GithubSource {
    fn id(&self) -> &'static str {
        GITHUB
    }

    fn tags(&self) -> &'static [SourceTag] {
        TAGS
    }

    fn retention(&self) -> Retention {
        Retention::Incremental
    }

    #[instrument(level = "info", name = "contrib.github.gather", skip_all)]
    async fn gather(&self, previous: &SnapshotView<'_>) -> Result<Vec<Contribution>> {
        self.ensure_scope_allowed().await?;

        let stop = self.settings.stop_date;
        let mut out = Vec::new();
        if self.settings.commits_enabled {
            let cursor = previous.cursor(&[SourceTag::GithubCommit], stop);
            out.extend(self.gather_commits(cursor).await);
        }
        if self.settings.issues_enabled {
            let cursor = previous.cursor(&[SourceTag::GithubIssuesCreated], stop);
            out.extend(self.gather_created("is:issue", cursor, RawItemKind::Issue).await);
            let cursor = previous.cursor(&[SourceTag::GithubPrCreated], stop);
            out.extend(
                self.gather_created("is:pull-request", cursor, RawItemKind::PullRequest)
                    .await,
            );
        }
        if self.settings.reviews_enabled {
            let cursor = previous.cursor(&[SourceTag::GithubReviews], stop);
            out.extend(self.gather_reviews(cursor).await);
        }
        if self.settings.comments_enabled {
            let cursor = previous.cursor(&[SourceTag::GithubComments], stop);
            out.extend(self.gather_comments(cursor).await);
        }
        tracing::info!(count = out.len(), "finished gathering github contributions");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::client::{CommitAuthor, CommitDetail, Owner, Repository, User};
    use super::*;
    use chrono::TimeZone;
    use contrib_core::config::GithubConfig;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGithub {
        private_scope: bool,
        /// (query substring, page-1 items)
        commits: Vec<(String, Vec<CommitItem>)>,
        /// (query substring, page, items); `None` fails that page. Checked before `commits`.
        commit_pages: Vec<(String, u32, Option<Vec<CommitItem>>)>,
        pages: Mutex<Vec<(String, u32)>>,
        issues: Vec<(String, Vec<IssueItem>)>,
        reviews: Vec<(u64, Vec<ReviewItem>)>,
        comments: Vec<(u64, Vec<CommentItem>)>,
        queries: Mutex<Vec<String>>,
        follow_ups: Mutex<Vec<u64>>,
    }

    impl FakeGithub {
        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }

        fn pages(&self) -> Vec<(String, u32)> {
            self.pages.lock().unwrap().clone()
        }
    }

    fn scripted<T: Clone>(script: &[(String, Vec<T>)], query: &str, page: u32) -> Vec<T> {
        if page != 1 {
            return Vec::new();
        }
        script
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, items)| items.clone())
            .unwrap_or_default()
    }

    #[async_trait]
    impl GithubApi for FakeGithub {
        async fn token_has_private_scope(&self) -> Result<bool> {
            Ok(self.private_scope)
        }

        async fn search_commits(&self, query: &str, page: u32) -> Result<Vec<CommitItem>> {
            self.queries.lock().unwrap().push(query.to_string());
            self.pages.lock().unwrap().push((query.to_string(), page));
            let paged = self
                .commit_pages
                .iter()
                .find(|(pattern, p, _)| *p == page && query.contains(pattern.as_str()));
            match paged {
                Some((_, _, Some(items))) => Ok(items.clone()),
                Some((_, _, None)) => Err(Error::BackendMessage(format!("page {page} failed"))),
                None => Ok(scripted(&self.commits, query, page)),
            }
        }

        async fn search_issues(&self, query: &str, page: u32) -> Result<Vec<IssueItem>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(scripted(&self.issues, query, page))
        }

        async fn list_reviews(&self, _repo: &RepoRef, number: u64) -> Result<Vec<ReviewItem>> {
            self.follow_ups.lock().unwrap().push(number);
            Ok(self
                .reviews
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, r)| r.clone())
                .unwrap_or_default())
        }

        async fn list_comments(&self, _repo: &RepoRef, number: u64) -> Result<Vec<CommentItem>> {
            self.follow_ups.lock().unwrap().push(number);
            Ok(self
                .comments
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, c)| c.clone())
                .unwrap_or_default())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 15, 9, 0, 0).unwrap()
    }

    fn config() -> GithubConfig {
        GithubConfig {
            enabled: true,
            username: Some("octo".into()),
            stop_date: Some("2022-01-01".into()),
            filter: Some("contribution-test".into()),
            delay_ms_per_request: Some(0),
            issues_enabled: Some(false),
            reviews_enabled: Some(false),
            comments_enabled: Some(false),
            ..Default::default()
        }
    }

    fn source(cfg: GithubConfig, api: Arc<FakeGithub>) -> GithubSource {
        let settings = cfg.resolve().unwrap().unwrap();
        GithubSource::new(settings, api).with_now(now())
    }

    fn commit(url: &str, owner: &str, repo: &str, date: DateTime<Utc>) -> CommitItem {
        CommitItem {
            html_url: url.to_string(),
            commit: CommitDetail {
                message: "Test Commit Message".to_string(),
                author: CommitAuthor { date },
            },
            repository: Repository {
                name: repo.to_string(),
                owner: Owner {
                    login: owner.to_string(),
                },
                private: false,
                fork: false,
            },
        }
    }

    fn issue(number: u64, url: &str, created_at: DateTime<Utc>) -> IssueItem {
        IssueItem {
            number,
            title: format!("Issue {number}"),
            html_url: url.to_string(),
            created_at,
            repository_url: "https://api.github.com/repos/contribution-test/foo".to_string(),
            repository: None,
        }
    }

    fn march_2() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 2, 0, 0, 0).unwrap()
    }

    /// A full page of matching commits, one minute apart, starting `offset` minutes after March 2.
    fn full_commit_page(offset: i64) -> Vec<CommitItem> {
        (0..RESULTS_PER_PAGE as i64)
            .map(|n| {
                commit(
                    &format!("https://github.com/contribution-test/foo/commit/{}", offset + n),
                    "contribution-test",
                    "foo",
                    march_2() + ChronoDuration::minutes(offset + n),
                )
            })
            .collect()
    }

    const MARCH: &str = "author:octo author-date:2022-03-01..2022-03-31";
    const FEBRUARY: &str = "author:octo author-date:2022-02-01..2022-02-28";
    const JANUARY: &str = "author:octo author-date:2022-01-01..2022-01-31";

    #[tokio::test]
    async fn full_page_asks_for_next_and_failed_page_is_skipped() {
        let api = Arc::new(FakeGithub {
            commit_pages: vec![
                ("2022-03-01".to_string(), 1, Some(full_commit_page(0))),
                ("2022-03-01".to_string(), 2, None),
            ],
            ..Default::default()
        });
        let out = source(config(), api.clone())
            .gather(&SnapshotView::default())
            .await
            .unwrap();

        assert_eq!(out.len(), RESULTS_PER_PAGE);
        assert_eq!(
            api.pages(),
            vec![
                (MARCH.to_string(), 1),
                (MARCH.to_string(), 2),
                (FEBRUARY.to_string(), 1),
                (JANUARY.to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn page_cap_ends_the_window() {
        let commit_pages = (1..=MAX_PAGES_PER_WINDOW)
            .map(|page| {
                let offset = i64::from(page - 1) * RESULTS_PER_PAGE as i64;
                ("2022-03-01".to_string(), page, Some(full_commit_page(offset)))
            })
            .collect();
        let api = Arc::new(FakeGithub {
            commit_pages,
            ..Default::default()
        });
        let out = source(config(), api.clone())
            .gather(&SnapshotView::default())
            .await
            .unwrap();

        assert_eq!(out.len(), RESULTS_PER_PAGE * MAX_PAGES_PER_WINDOW as usize);
        let march_pages: Vec<u32> = api
            .pages()
            .into_iter()
            .filter(|(q, _)| q == MARCH)
            .map(|(_, page)| page)
            .collect();
        assert_eq!(march_pages, (1..=MAX_PAGES_PER_WINDOW).collect::<Vec<_>>());
        assert_eq!(api.queries().last().map(String::as_str), Some(JANUARY));
    }

    #[tokio::test]
    async fn matching_commit_becomes_one_contribution() {
        let api = Arc::new(FakeGithub {
            commits: vec![(
                "author-date:2022-03-01..2022-03-31".to_string(),
                vec![commit(
                    "https://github.com/contribution-test/foo/commit/abc",
                    "contribution-test",
                    "foo",
                    march_2(),
                )],
            )],
            ..Default::default()
        });
        let out = source(config(), api.clone())
            .gather(&SnapshotView::default())
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![Contribution::new(
                march_2(),
                "contribution-test/foo: Test Commit Message",
                "https://github.com/contribution-test/foo/commit/abc",
                "GitHub Commit",
                SourceTag::GithubCommit,
            )]
        );
        assert_eq!(
            api.queries(),
            vec![
                "author:octo author-date:2022-03-01..2022-03-31",
                "author:octo author-date:2022-02-01..2022-02-28",
                "author:octo author-date:2022-01-01..2022-01-31",
            ]
        );
    }

    #[tokio::test]
    async fn non_matching_commit_is_filtered_out() {
        let api = Arc::new(FakeGithub {
            commits: vec![(
                "2022-03-01".to_string(),
                vec![commit(
                    "https://github.com/someone-else/bar/commit/abc",
                    "someone-else",
                    "bar",
                    march_2(),
                )],
            )],
            ..Default::default()
        });
        let out = source(config(), api)
            .gather(&SnapshotView::default())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn private_and_forked_commits() {
        let mut private = commit(
            "https://github.com/contribution-test/secret/commit/1",
            "contribution-test",
            "secret",
            march_2(),
        );
        private.repository.private = true;
        let mut fork = commit(
            "https://github.com/contribution-test/fork/commit/2",
            "contribution-test",
            "fork",
            march_2() + ChronoDuration::hours(1),
        );
        fork.repository.fork = true;
        let api = Arc::new(FakeGithub {
            commits: vec![("2022-03-01".to_string(), vec![private, fork])],
            ..Default::default()
        });
        let mut cfg = config();
        cfg.types.private_commit = Some("Secret work".into());
        let out = source(cfg, api).gather(&SnapshotView::default()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].description, "Secret work");
        assert_eq!(out[0].link, "");
    }

    #[tokio::test]
    async fn commits_at_or_before_cursor_are_not_returned() {
        let api = Arc::new(FakeGithub {
            commits: vec![(
                "2022-03-01".to_string(),
                vec![
                    commit("https://github.com/contribution-test/foo/commit/a", "contribution-test", "foo", march_2()),
                    commit(
                        "https://github.com/contribution-test/foo/commit/b",
                        "contribution-test",
                        "foo",
                        march_2() + ChronoDuration::days(1),
                    ),
                ],
            )],
            ..Default::default()
        });
        let snapshot = vec![Contribution::new(march_2(), "old", "", "GitHub Commit", SourceTag::GithubCommit)];
        let view = SnapshotView::for_tags(&snapshot, TAGS);
        let out = source(config(), api.clone()).gather(&view).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].created_at, march_2() + ChronoDuration::days(1));
        // cursor is in March, so only the current window is searched
        assert_eq!(api.queries().len(), 1);
    }

    #[tokio::test]
    async fn private_scope_without_opt_in_aborts() {
        let api = Arc::new(FakeGithub {
            private_scope: true,
            ..Default::default()
        });
        let err = source(config(), api.clone())
            .gather(&SnapshotView::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition { section: "github", .. }));
        assert!(api.queries().is_empty());

        let mut cfg = config();
        cfg.allow_private = true;
        source(cfg, api).gather(&SnapshotView::default()).await.unwrap();
    }

    #[tokio::test]
    async fn issues_and_prs_use_type_overrides() {
        let api = Arc::new(FakeGithub {
            issues: vec![
                (
                    "created:2022-03-01..2022-03-31 is:issue".to_string(),
                    vec![issue(1, "https://github.com/contribution-test/foo/issues/1", march_2())],
                ),
                (
                    "created:2022-02-01..2022-02-28 is:pull-request".to_string(),
                    vec![issue(
                        2,
                        "https://github.com/contribution-test/foo/pull/2",
                        Utc.with_ymd_and_hms(2022, 2, 10, 0, 0, 0).unwrap(),
                    )],
                ),
            ],
            ..Default::default()
        });
        let mut cfg = config();
        cfg.commits_enabled = Some(false);
        cfg.issues_enabled = Some(true);
        cfg.types.created_pr = Some("Opened PR".into());
        let out = source(cfg, api).gather(&SnapshotView::default()).await.unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source, SourceTag::GithubIssuesCreated);
        assert_eq!(out[0].kind, "Created Issue Report");
        assert_eq!(out[1].source, SourceTag::GithubPrCreated);
        assert_eq!(out[1].kind, "Opened PR");
    }

    #[tokio::test]
    async fn reviews_skip_irrelevant_prs_and_other_reviewers() {
        let review = |state: &str, login: &str, day: u32| ReviewItem {
            html_url: format!("https://github.com/contribution-test/foo/pull/7#review-{day}"),
            state: state.to_string(),
            submitted_at: Some(Utc.with_ymd_and_hms(2022, 3, day, 0, 0, 0).unwrap()),
            user: Some(User {
                login: login.to_string(),
            }),
        };
        let api = Arc::new(FakeGithub {
            issues: vec![(
                "reviewed-by:octo created:2022-03-01..2022-03-31".to_string(),
                vec![
                    issue(7, "https://github.com/contribution-test/foo/pull/7", march_2()),
                    issue(8, "https://github.com/unrelated/bar/pull/8", march_2()),
                ],
            )],
            reviews: vec![(
                7,
                vec![
                    review("APPROVED", "Octo", 3),
                    review("CHANGES_REQUESTED", "octo", 4),
                    review("DISMISSED", "octo", 5),
                    review("APPROVED", "someone", 6),
                ],
            )],
            ..Default::default()
        });
        let mut cfg = config();
        cfg.commits_enabled = Some(false);
        cfg.reviews_enabled = Some(true);
        let out = source(cfg, api.clone())
            .gather(&SnapshotView::default())
            .await
            .unwrap();

        assert_eq!(*api.follow_ups.lock().unwrap(), vec![7]);
        let kinds: Vec<_> = out.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "Approved a Pull Request",
                "Requested changes on a Pull Request",
                "Reviewed a Pull Request",
            ]
        );
        assert!(out.iter().all(|c| c.description == "Issue 7"));
        assert!(out.iter().all(|c| c.source == SourceTag::GithubReviews));
    }

    #[tokio::test]
    async fn review_search_reaches_back_a_year_from_cursor() {
        let api = Arc::new(FakeGithub::default());
        let mut cfg = config();
        cfg.stop_date = Some("2020-01-01".into());
        cfg.commits_enabled = Some(false);
        cfg.reviews_enabled = Some(true);
        let snapshot = vec![Contribution::new(
            Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap(),
            "",
            "",
            "Approved a Pull Request",
            SourceTag::GithubReviews,
        )];
        let view = SnapshotView::for_tags(&snapshot, TAGS);
        source(cfg, api.clone()).gather(&view).await.unwrap();

        let queries = api.queries();
        assert_eq!(queries.len(), 13);
        assert!(queries.last().unwrap().contains("created:2021-03-01..2021-03-31"));
    }

    #[tokio::test]
    async fn comments_by_user_on_relevant_issues() {
        let api = Arc::new(FakeGithub {
            issues: vec![(
                "commenter:octo created:2022-03-01..2022-03-31 is:issue".to_string(),
                vec![issue(3, "https://github.com/contribution-test/foo/issues/3", march_2())],
            )],
            comments: vec![(
                3,
                vec![
                    CommentItem {
                        html_url: "https://github.com/contribution-test/foo/issues/3#issuecomment-1".into(),
                        created_at: march_2() + ChronoDuration::hours(2),
                        user: Some(User { login: "octo".into() }),
                    },
                    CommentItem {
                        html_url: "https://github.com/contribution-test/foo/issues/3#issuecomment-2".into(),
                        created_at: march_2() + ChronoDuration::hours(3),
                        user: Some(User { login: "other".into() }),
                    },
                ],
            )],
            ..Default::default()
        });
        let mut cfg = config();
        cfg.commits_enabled = Some(false);
        cfg.comments_enabled = Some(true);
        let out = source(cfg, api).gather(&SnapshotView::default()).await.unwrap();
        assert_eq!(
            out,
            vec![Contribution::new(
                march_2() + ChronoDuration::hours(2),
                "Issue 3",
                "https://github.com/contribution-test/foo/issues/3#issuecomment-1",
                "Commented on an Issue",
                SourceTag::GithubComments,
            )]
        );
    }
}
