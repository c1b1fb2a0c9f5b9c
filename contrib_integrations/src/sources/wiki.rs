//! MediaWiki source: edits from the user-contributions RSS feed, one month per request.

use crate::http::{Fetch, parse_url};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contrib_core::config::MEDIA_WIKI;
use contrib_core::{
    Contribution, MonthWindow, MonthWindows, Result, Retention, SnapshotView, Source, SourceTag,
    WikiSettings,
};
use reqwest::Url;
use std::sync::Arc;
use tracing::instrument;

pub const TAGS: &[SourceTag] = &[SourceTag::Wiki];

#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
}

/// Reads `<item>`s from an RSS document. Items without a parseable `pubDate` are skipped.
pub fn parse_feed(xml: &str) -> std::result::Result<Vec<FeedItem>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let child_text = |node: roxmltree::Node<'_, '_>, name: &str| {
        node.children()
            .find(|c| c.has_tag_name(name))
            .and_then(|c| c.text())
            .map(|t| t.trim().to_string())
    };
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("item"))
        .filter_map(|item| {
            let published = child_text(item, "pubDate")
                .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())?
                .with_timezone(&Utc);
            Some(FeedItem {
                title: child_text(item, "title").unwrap_or_default(),
                link: child_text(item, "link").unwrap_or_default(),
                published,
            })
        })
        .collect())
}

pub struct WikiSource {
    settings: WikiSettings,
    fetch: Arc<dyn Fetch>,
    now: Option<DateTime<Utc>>,
}

impl WikiSource {
    pub fn new(settings: WikiSettings, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            settings,
            fetch,
            now: None,
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn month_url(&self, window: &MonthWindow) -> Result<Url> {
        let mut url = parse_url(&self.settings.base_url)?;
        url.query_pairs_mut()
            .append_pair("user", &self.settings.username)
            .append_pair("year", &window.year().to_string())
            .append_pair("month", &window.month().to_string());
        Ok(url)
    }

    /// Edits of one month. Fetch and parse failures give an empty month.
    async fn month(&self, window: &MonthWindow) -> Result<Vec<FeedItem>> {
        let url = self.month_url(window)?;
        let body = match self.fetch.get_text(&url).await {
            Ok(body) => body,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, %window, "feed fetch failed, treating month as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        match parse_feed(&body) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(error = %e, %window, "feed is not valid xml, treating month as empty");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl Source for WikiSource {
    fn id(&self) -> &'static str {
        MEDIA_WIKI
    }

    fn tags(&self) -> &'static [SourceTag] {
        TAGS
    }

    fn retention(&self) -> Retention {
        Retention::FullRefetch
    }

    #[instrument(level = "info", name = "contrib.wiki.gather", skip_all)]
    async fn gather(&self, _previous: &SnapshotView<'_>) -> Result<Vec<Contribution>> {
        let now = self.now.unwrap_or_else(Utc::now);
        let mut out = Vec::new();
        for window in MonthWindows::new(now, self.settings.stop_date) {
            let items = self.month(&window).await?;
            let before = out.len();
            out.extend(
                items
                    .into_iter()
                    .filter(|i| window.contains(i.published) && i.published > self.settings.stop_date)
                    .map(|i| {
                        Contribution::new(
                            i.published,
                            format!("Edited {}", i.title),
                            i.link,
                            &self.settings.edit_type,
                            SourceTag::Wiki,
                        )
                    }),
            );
            tracing::debug!(%window, count = out.len() - before, "wiki month");
        }
        tracing::info!(count = out.len(), "finished gathering wiki contributions");
        Ok(out)
    }
}
