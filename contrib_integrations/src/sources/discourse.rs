//! Discourse source: topics the user created and posts they wrote.
//!
//! Always refetched in full. With `keepDeletedPosts` the engine also keeps previously
//! saved topics and posts that no longer show up upstream.

use crate::http::{Fetch, get_json, parse_url};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contrib_core::config::DISCOURSE;
use contrib_core::{
    Contribution, DiscourseSettings, PageCursor, PageState, Result, Retention, SnapshotView,
    Source, SourceTag,
};
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::instrument;

pub const RESULTS_PER_PAGE: usize = 30;

pub const TAGS: &[SourceTag] = &[SourceTag::DiscourseTopics, SourceTag::DiscoursePosts];

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    topic_list: TopicList,
}

#[derive(Debug, Deserialize)]
struct TopicList {
    topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    id: u64,
    slug: String,
    title: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UserActionsResponse {
    user_actions: Vec<UserAction>,
}

#[derive(Debug, Deserialize)]
struct UserAction {
    #[serde(default)]
    title: String,
    slug: String,
    topic_id: u64,
    post_number: u64,
    created_at: DateTime<Utc>,
}

pub struct DiscourseSource {
    settings: DiscourseSettings,
    fetch: Arc<dyn Fetch>,
}

impl DiscourseSource {
    pub fn new(settings: DiscourseSettings, fetch: Arc<dyn Fetch>) -> Self {
        Self { settings, fetch }
    }

    fn topics_url(&self, page: u32) -> Result<Url> {
        let mut url = parse_url(&format!(
            "{}/topics/created-by/{}.json",
            self.settings.base_url, self.settings.username
        ))?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    fn posts_url(&self, offset: usize) -> Result<Url> {
        let mut url = parse_url(&format!("{}/user_actions.json", self.settings.base_url))?;
        url.query_pairs_mut()
            .append_pair("username", &self.settings.username)
            .append_pair("filter", "5")
            .append_pair("offset", &offset.to_string());
        Ok(url)
    }

    /// Pages until a page comes back short. A failed first page fails the walk, since an
    /// empty result would drop every saved record. A failed later page ends it.
    async fn walk<T, R>(
        &self,
        url_for: impl Fn(&PageCursor) -> Result<Url>,
        items: impl Fn(R) -> Vec<T>,
    ) -> Result<Vec<T>>
    where
        R: DeserializeOwned,
    {
        let mut cursor = PageCursor::new(RESULTS_PER_PAGE);
        let mut out = Vec::new();
        while !cursor.is_done() {
            let url = url_for(&cursor)?;
            let page = match get_json::<R>(self.fetch.as_ref(), &url).await {
                Ok(resp) => items(resp),
                Err(e) if e.is_transient() && cursor.page() > 0 => {
                    tracing::warn!(error = %e, %url, "discourse page failed, treating as empty");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            tracing::debug!(count = page.len(), page = cursor.page(), "discourse page");
            let state = cursor.record(page.len());
            out.extend(page);
            if state == PageState::Exhausted {
                break;
            }
        }
        Ok(out)
    }

    #[instrument(level = "debug", skip(self))]
    async fn topics(&self) -> Result<Vec<Contribution>> {
        let topics = self
            .walk(
                |c| self.topics_url(c.page()),
                |r: TopicsResponse| r.topic_list.topics,
            )
            .await?;
        Ok(topics
            .into_iter()
            .map(|t| {
                Contribution::new(
                    t.created_at,
                    t.title,
                    format!("{}/t/{}/{}", self.settings.base_url, t.slug, t.id),
                    &self.settings.topic_type,
                    SourceTag::DiscourseTopics,
                )
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn posts(&self) -> Result<Vec<Contribution>> {
        let posts = self
            .walk(
                |c| self.posts_url(c.offset()),
                |r: UserActionsResponse| r.user_actions,
            )
            .await?;
        Ok(posts
            .into_iter()
            .map(|p| {
                Contribution::new(
                    p.created_at,
                    p.title,
                    format!(
                        "{}/t/{}/{}/{}",
                        self.settings.base_url, p.slug, p.topic_id, p.post_number
                    ),
                    &self.settings.post_type,
                    SourceTag::DiscoursePosts,
                )
            })
            .collect())
    }
}

#[async_trait]
impl Source for DiscourseSource {
    fn id(&self) -> &'static str {
        DISCOURSE
    }

    fn tags(&self) -> &'static [SourceTag] {
        TAGS
    }

    fn retention(&self) -> Retention {
        Retention::FullRefetch
    }

    fn retains_unseen(&self) -> bool {
        self.settings.keep_deleted_posts
    }

    #[instrument(level = "info", name = "contrib.discourse.gather", skip_all)]
    async fn gather(&self, _previous: &SnapshotView<'_>) -> Result<Vec<Contribution>> {
        let mut out = self.topics().await?;
        out.extend(self.posts().await?);
        tracing::info!(count = out.len(), "finished gathering discourse contributions");
        Ok(out)
    }
}
