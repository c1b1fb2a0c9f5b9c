//! Bugzilla source: bugs the user filed and comments they wrote.

use crate::http::{Fetch, get_json, parse_url, pause};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contrib_core::config::BUGZILLA;
use contrib_core::{
    BugzillaSettings, Contribution, PageCursor, PageState, Result, Retention, SnapshotView,
    Source, SourceTag,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub const RESULTS_PER_PAGE: usize = 500;
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

pub const TAGS: &[SourceTag] = &[SourceTag::BugzillaCreated, SourceTag::BugzillaComments];

#[derive(Debug, Clone, Deserialize)]
struct BugList {
    bugs: Vec<Bug>,
}

#[derive(Debug, Clone, Deserialize)]
struct Bug {
    id: u64,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentsResponse {
    bugs: HashMap<String, BugComments>,
}

#[derive(Debug, Clone, Deserialize)]
struct BugComments {
    comments: Vec<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
struct Comment {
    bug_id: u64,
    /// Position in the bug's comment thread; 0 is the bug description itself.
    count: u64,
    creator: String,
    creation_time: DateTime<Utc>,
}

pub struct BugzillaSource {
    settings: BugzillaSettings,
    fetch: Arc<dyn Fetch>,
}

impl BugzillaSource {
    pub fn new(settings: BugzillaSettings, fetch: Arc<dyn Fetch>) -> Self {
        Self { settings, fetch }
    }

    fn format(&self, comment: &Comment, summary: &str) -> Contribution {
        let (kind, tag) = if comment.count == 0 {
            (&self.settings.created_type, SourceTag::BugzillaCreated)
        } else {
            (&self.settings.commented_type, SourceTag::BugzillaComments)
        };
        Contribution::new(
            comment.creation_time,
            summary,
            format!(
                "{}/show_bug.cgi?id={}#c{}",
                self.settings.base_url, comment.bug_id, comment.count
            ),
            kind,
            tag,
        )
    }

    /// Bugs the user commented on that changed since `since`, deduplicated by id.
    #[instrument(level = "debug", skip(self))]
    async fn commented_bugs(&self, since: DateTime<Utc>) -> Result<Vec<Bug>> {
        let last_change = since.format("%Y-%m-%d").to_string();
        let quicksearch = format!("ALL commenter:{}", self.settings.username);
        let mut cursor = PageCursor::new(RESULTS_PER_PAGE);
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        while !cursor.is_done() {
            let mut url = parse_url(&format!("{}/rest/bug", self.settings.base_url))?;
            url.query_pairs_mut()
                .append_pair("quicksearch", &quicksearch)
                .append_pair("limit", &RESULTS_PER_PAGE.to_string())
                .append_pair("offset", &cursor.offset().to_string())
                .append_pair("last_change_time", &last_change);

            let bugs = match get_json::<BugList>(self.fetch.as_ref(), &url).await {
                Ok(page) => page.bugs,
                Err(e) if e.is_transient() => {
                    tracing::warn!(error = %e, offset = cursor.offset(), "bug list page failed, treating as empty");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(count = bugs.len(), offset = cursor.offset(), "bug list page");
            let state = cursor.record(bugs.len());
            out.extend(bugs.into_iter().filter(|b| seen.insert(b.id)));
            if state == PageState::Exhausted {
                break;
            }
        }
        Ok(out)
    }

    async fn comments(&self, bug_id: u64) -> Result<Vec<Comment>> {
        let url = parse_url(&format!(
            "{}/rest/bug/{bug_id}/comment",
            self.settings.base_url
        ))?;
        let mut resp = match get_json::<CommentsResponse>(self.fetch.as_ref(), &url).await {
            Ok(resp) => resp,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, bug_id, "fetching comments failed, skipping bug");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        Ok(resp
            .bugs
            .remove(&bug_id.to_string())
            .map(|b| b.comments)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Source for BugzillaSource {
    fn id(&self) -> &'static str {
        BUGZILLA
    }

    fn tags(&self) -> &'static [SourceTag] {
        TAGS
    }

    fn retention(&self) -> Retention {
        Retention::Incremental
    }

    #[instrument(level = "info", name = "contrib.bugzilla.gather", skip_all)]
    async fn gather(&self, previous: &SnapshotView<'_>) -> Result<Vec<Contribution>> {
        let cursor = previous.cursor(TAGS, self.settings.stop_date);
        let bugs = self.commented_bugs(cursor).await?;
        tracing::info!(count = bugs.len(), "bugs the user commented on");

        let mut out = Vec::new();
        for bug in &bugs {
            pause(self.settings.delay).await;
            let comments = self.comments(bug.id).await?;
            out.extend(
                comments
                    .iter()
                    .filter(|c| c.creator == self.settings.username)
                    .map(|c| self.format(c, &bug.summary))
                    .filter(|c| c.created_at > cursor),
            );
        }
        Ok(out)
    }
}
