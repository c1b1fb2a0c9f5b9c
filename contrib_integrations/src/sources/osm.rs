//! OpenStreetMap source: changesets by display name, paged backwards by creation time.

use crate::http::{Fetch, parse_url};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use contrib_core::config::OSM;
use contrib_core::{
    Contribution, Error, OsmSettings, PageCursor, PageState, Result, Retention, SnapshotView,
    Source, SourceTag,
};
use reqwest::Url;
use std::sync::Arc;
use tracing::instrument;

pub const API_BASE: &str = "https://api.openstreetmap.org/api/0.6";
pub const CHANGESET_BASE: &str = "https://www.openstreetmap.org/changeset";
pub const RESULTS_PER_PAGE: usize = 100;
pub const MAX_PAGES: u32 = 1000;

pub const TAGS: &[SourceTag] = &[SourceTag::Osm];

#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub comment: Option<String>,
}

/// Reads `<changeset>` elements. Changesets without an id or a valid `created_at` are skipped.
pub fn parse_changesets(xml: &str) -> std::result::Result<Vec<Changeset>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("changeset"))
        .filter_map(|node| {
            let id = node.attribute("id")?.to_string();
            let created_at = DateTime::parse_from_rfc3339(node.attribute("created_at")?)
                .ok()?
                .with_timezone(&Utc);
            let comment = node
                .children()
                .filter(|c| c.has_tag_name("tag"))
                .find(|c| c.attribute("k") == Some("comment"))
                .and_then(|c| c.attribute("v"))
                .map(str::to_string);
            Some(Changeset {
                id,
                created_at,
                comment,
            })
        })
        .collect())
}

pub struct OsmSource {
    settings: OsmSettings,
    fetch: Arc<dyn Fetch>,
    api_base: String,
    now: Option<DateTime<Utc>>,
}

impl OsmSource {
    pub fn new(settings: OsmSettings, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            settings,
            fetch,
            api_base: API_BASE.to_string(),
            now: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn page_url(&self, created_before: DateTime<Utc>) -> Result<Url> {
        let mut url = parse_url(&format!("{}/changesets", self.api_base))?;
        let range = format!(
            "{},{}",
            self.settings.stop_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            created_before.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        url.query_pairs_mut()
            .append_pair("display_name", &self.settings.display_name)
            .append_pair("time", &range);
        Ok(url)
    }

    /// One page of changesets. Later pages that fail to load or parse count as empty, but
    /// the first page must succeed: an empty first page would drop every saved edit.
    async fn page(&self, created_before: DateTime<Utc>, first: bool) -> Result<Vec<Changeset>> {
        let url = self.page_url(created_before)?;
        let body = match self.fetch.get_text(&url).await {
            Ok(body) => body,
            Err(e) if e.is_transient() && !first => {
                tracing::warn!(error = %e, %url, "changeset page failed, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        match parse_changesets(&body) {
            Ok(page) => Ok(page),
            Err(e) if first => Err(Error::decode(url.to_string(), e)),
            Err(e) => {
                tracing::warn!(error = %e, %url, "changeset page is not valid xml, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn format(&self, changeset: Changeset) -> Contribution {
        Contribution::new(
            changeset.created_at,
            changeset.comment.unwrap_or_default(),
            format!("{CHANGESET_BASE}/{}", changeset.id),
            &self.settings.edit_type,
            SourceTag::Osm,
        )
    }
}

#[async_trait]
impl Source for OsmSource {
    fn id(&self) -> &'static str {
        OSM
    }

    fn tags(&self) -> &'static [SourceTag] {
        TAGS
    }

    fn retention(&self) -> Retention {
        Retention::FullRefetch
    }

    #[instrument(level = "info", name = "contrib.osm.gather", skip_all)]
    async fn gather(&self, _previous: &SnapshotView<'_>) -> Result<Vec<Contribution>> {
        let mut created_before = self.now.unwrap_or_else(Utc::now);
        let mut cursor = PageCursor::new(RESULTS_PER_PAGE).with_max_pages(MAX_PAGES);
        let mut out = Vec::new();

        while !cursor.is_done() {
            let page = self.page(created_before, cursor.page() == 0).await?;
            tracing::debug!(count = page.len(), page = cursor.page(), %created_before, "changeset page");
            let state = cursor.record(page.len());
            let oldest = page.iter().map(|c| c.created_at).min();
            // The time range matches changesets closed after stopDate, not created after it.
            out.extend(
                page.into_iter()
                    .filter(|c| c.created_at > self.settings.stop_date)
                    .map(|c| self.format(c)),
            );
            if state == PageState::Exhausted {
                break;
            }
            match oldest {
                Some(oldest) if oldest < created_before => created_before = oldest,
                _ => {
                    tracing::warn!(%created_before, "changeset cursor did not move, stopping");
                    break;
                }
            }
        }
        tracing::info!(count = out.len(), "finished gathering osm contributions");
        Ok(out)
    }
}
