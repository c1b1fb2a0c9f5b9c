//! Community Portal source: events and campaigns scraped from the public profile page.

use crate::http::{Fetch, parse_url};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use contrib_core::config::COMMUNITY_PORTAL;
use contrib_core::{
    CommunityPortalSettings, Contribution, Error, Result, Retention, SnapshotView, Source,
    SourceTag, sort_newest_first,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::instrument;

pub const TAGS: &[SourceTag] = &[
    SourceTag::CommunityPortalEvents,
    SourceTag::CommunityPortalCampaigns,
];

static DECORATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\t∙]").expect("decoration regex"));
/// End of a campaign range such as `Jan 01 - Feb 28, 2022`; only the start is kept.
static RANGE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*[a-zA-Z]+\s\d{2}").expect("range end regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];

fn strip(re: &Regex, text: &str) -> String {
    re.replace_all(text, "").into_owned()
}

/// Parses the date formats the profile page uses. Bare dates are midnight UTC.
pub fn parse_portal_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("css selector '{css}': {e:?}")))
}

fn text_of(el: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(|n| n.text().collect::<String>())
}

struct Category<'a> {
    item: &'a str,
    date: &'a str,
    title: &'a str,
    range: bool,
    kind: &'a str,
    tag: SourceTag,
}

fn scrape(
    doc: &Html,
    category: Category<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<Contribution>> {
    let item_sel = selector(category.item)?;
    let date_sel = selector(category.date)?;
    let title_sel = selector(category.title)?;

    let mut out = Vec::new();
    for el in doc.select(&item_sel) {
        let raw_date = text_of(&el, &date_sel).unwrap_or_default();
        let mut date = strip(&DECORATION, &raw_date);
        if category.range {
            date = strip(&RANGE_END, &date);
        }
        let Some(created_at) = parse_portal_date(&date) else {
            tracing::warn!(date = %raw_date.trim(), selector = category.item, "unparseable date, skipping entry");
            continue;
        };
        if created_at >= now {
            continue;
        }
        let title = text_of(&el, &title_sel).unwrap_or_default();
        out.push(Contribution::new(
            created_at,
            title.replace(['\n', '\t'], "").trim(),
            el.value().attr("href").unwrap_or_default(),
            category.kind,
            category.tag.clone(),
        ));
    }
    sort_newest_first(&mut out);
    Ok(out)
}

/// Extracts events and campaigns from a profile page, dropping anything dated after `now`.
pub fn parse_profile(
    html: &str,
    settings: &CommunityPortalSettings,
    now: DateTime<Utc>,
) -> Result<Vec<Contribution>> {
    let doc = Html::parse_document(html);
    let mut out = scrape(
        &doc,
        Category {
            item: ".profile__event",
            date: ".profile__event-time",
            title: ".profile__event-title",
            range: false,
            kind: &settings.participation_type,
            tag: SourceTag::CommunityPortalEvents,
        },
        now,
    )?;
    out.extend(scrape(
        &doc,
        Category {
            item: ".profile__campaign",
            date: ".profile__campaign-dates",
            title: ".profile__campaign-title",
            range: true,
            kind: &settings.campaign_type,
            tag: SourceTag::CommunityPortalCampaigns,
        },
        now,
    )?);
    Ok(out)
}

pub struct CommunityPortalSource {
    settings: CommunityPortalSettings,
    fetch: Arc<dyn Fetch>,
    now: Option<DateTime<Utc>>,
}

impl CommunityPortalSource {
    pub fn new(settings: CommunityPortalSettings, fetch: Arc<dyn Fetch>) -> Self {
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
}

#[async_trait]
impl Source for CommunityPortalSource {
    fn id(&self) -> &'static str {
        COMMUNITY_PORTAL
    }

    fn tags(&self) -> &'static [SourceTag] {
        TAGS
    }

    fn retention(&self) -> Retention {
        Retention::FullRefetch
    }

    #[instrument(level = "info", name = "contrib.community_portal.gather", skip_all)]
    async fn gather(&self, _previous: &SnapshotView<'_>) -> Result<Vec<Contribution>> {
        let url = parse_url(&format!(
            "{}/{}",
            self.settings.base_url, self.settings.username
        ))?;
        // The profile page is the only page; losing it must not look like "no contributions".
        let body = self.fetch.get_text(&url).await?;
        let out = parse_profile(&body, &self.settings, self.now.unwrap_or_else(Utc::now))?;
        tracing::info!(count = out.len(), "finished gathering community portal contributions");
        Ok(out)
    }
}
