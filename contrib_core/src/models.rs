use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// How the engine treats previously saved records of a tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// The adapter only returns items newer than its own cursor; prior records are kept.
    Incremental,
    /// The adapter returns its complete upstream view; prior records are dropped
    /// unless the owning source opts into retaining them.
    FullRefetch,
}

/// Machine identifier of a contribution category.
///
/// Serialized as the kebab-case strings stored in snapshots (e.g. `github-commit`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceTag {
    GithubCommit,
    GithubIssuesCreated,
    GithubPrCreated,
    GithubReviews,
    GithubComments,
    BugzillaCreated,
    BugzillaComments,
    DiscourseTopics,
    DiscoursePosts,
    CommunityPortalEvents,
    CommunityPortalCampaigns,
    Wiki,
    Osm,
    /// Tag of a retired source found in an older snapshot. Never produced by adapters.
    Legacy(String),
}

impl SourceTag {
    pub const ALL: [SourceTag; 13] = [
        SourceTag::GithubCommit,
        SourceTag::GithubIssuesCreated,
        SourceTag::GithubPrCreated,
        SourceTag::GithubReviews,
        SourceTag::GithubComments,
        SourceTag::BugzillaCreated,
        SourceTag::BugzillaComments,
        SourceTag::DiscourseTopics,
        SourceTag::DiscoursePosts,
        SourceTag::CommunityPortalEvents,
        SourceTag::CommunityPortalCampaigns,
        SourceTag::Wiki,
        SourceTag::Osm,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            SourceTag::GithubCommit => "github-commit",
            SourceTag::GithubIssuesCreated => "github-issues-created",
            SourceTag::GithubPrCreated => "github-pr-created",
            SourceTag::GithubReviews => "github-reviews",
            SourceTag::GithubComments => "github-comments",
            SourceTag::BugzillaCreated => "bugzilla-created",
            SourceTag::BugzillaComments => "bugzilla-comments",
            SourceTag::DiscourseTopics => "discourse-topics",
            SourceTag::DiscoursePosts => "discourse-posts",
            SourceTag::CommunityPortalEvents => "community-portal-events",
            SourceTag::CommunityPortalCampaigns => "community-portal-campaigns",
            SourceTag::Wiki => "wiki",
            SourceTag::Osm => "osm",
            SourceTag::Legacy(tag) => tag,
        }
    }

    pub fn retention(&self) -> Retention {
        match self {
            SourceTag::DiscourseTopics
            | SourceTag::DiscoursePosts
            | SourceTag::CommunityPortalEvents
            | SourceTag::CommunityPortalCampaigns
            | SourceTag::Wiki
            | SourceTag::Osm => Retention::FullRefetch,
            _ => Retention::Incremental,
        }
    }
}

impl From<String> for SourceTag {
    fn from(value: String) -> Self {
        SourceTag::ALL
            .iter()
            .find(|tag| tag.as_str() == value)
            .cloned()
            .unwrap_or(SourceTag::Legacy(value))
    }
}

impl From<SourceTag> for String {
    fn from(value: SourceTag) -> Self {
        match value {
            SourceTag::Legacy(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized unit of activity, as persisted in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    #[serde(rename = "createdAt", with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    pub description: String,
    /// Empty when no public artifact exists (e.g. a redacted private commit).
    pub link: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: SourceTag,
}

impl Contribution {
    pub fn new(
        created_at: DateTime<Utc>,
        description: impl Into<String>,
        link: impl Into<String>,
        kind: impl Into<String>,
        source: SourceTag,
    ) -> Self {
        Self {
            created_at,
            description: description.into(),
            link: link.into(),
            kind: kind.into(),
            source,
        }
    }

    /// Identity used for deduplication: tag, type, and timestamp to the millisecond.
    pub fn identity(&self) -> (&SourceTag, &str, i64) {
        (&self.source, &self.kind, self.created_at.timestamp_millis())
    }
}

/// Removes duplicates (same tag, type, and millisecond timestamp), keeping the first
/// occurrence of each and preserving input order.
pub fn ensure_unique(items: Vec<Contribution>) -> Vec<Contribution> {
    let mut seen: HashSet<(SourceTag, String, i64)> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| {
            let (source, kind, millis) = item.identity();
            seen.insert((source.clone(), kind.to_string(), millis))
        })
        .collect()
}

/// Sorts newest first. Stable, so equal timestamps keep their merge order.
pub fn sort_newest_first(items: &mut [Contribution]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// ISO-8601 with millisecond precision and a `Z` suffix, e.g. `2022-03-02T00:00:00.000Z`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
