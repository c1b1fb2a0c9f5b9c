//! Aggregate configuration and its validator.
//!
//! Sub-configs mirror the camelCase keys of the config file and keep every field optional so
//! that a disabled source may be left half-filled. `resolve()` turns an enabled sub-config into
//! typed settings and is where required fields are enforced.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const GITHUB: &str = "github";
pub const BUGZILLA: &str = "bugzilla";
pub const DISCOURSE: &str = "discourse";
pub const COMMUNITY_PORTAL: &str = "communityPortal";
pub const MEDIA_WIKI: &str = "mediaWiki";
pub const OSM: &str = "osm";

const GITHUB_DEFAULT_DELAY_MS: u64 = 2000;
const BUGZILLA_DEFAULT_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bugzilla: Option<BugzillaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discourse: Option<DiscourseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_portal: Option<CommunityPortalConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_wiki: Option<WikiConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm: Option<OsmConfig>,
}

impl AggregateConfig {
    /// Reads a JSON or YAML config file, picking the format from the extension.
    #[tracing::instrument(level = "debug")]
    pub async fn from_path(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::InvalidInput(format!("read config {}: {e}", path.display())))?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self> {
        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
            _ => serde_json::from_str(raw).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| Error::InvalidInput(format!("parse config {}: {e}", path.display())))
    }

    /// Rejects the configuration before any adapter performs I/O.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn validate(&self) -> Result<()> {
        if self.output_file.is_none() {
            return Err(Error::Config {
                section: "config",
                field: "outputFile",
                reason: "is required".to_string(),
            });
        }
        resolve_opt(&self.github, GithubConfig::resolve)?;
        resolve_opt(&self.bugzilla, BugzillaConfig::resolve)?;
        resolve_opt(&self.discourse, DiscourseConfig::resolve)?;
        resolve_opt(&self.community_portal, CommunityPortalConfig::resolve)?;
        resolve_opt(&self.media_wiki, WikiConfig::resolve)?;
        resolve_opt(&self.osm, OsmConfig::resolve)?;
        Ok(())
    }
}

/// Resolves an optional sub-config. Absent configs resolve to `None`.
pub fn resolve_opt<C, S>(
    config: &Option<C>,
    resolve: impl Fn(&C) -> Result<Option<S>>,
) -> Result<Option<S>> {
    match config {
        Some(c) => resolve(c),
        None => Ok(None),
    }
}

fn required<'a>(
    section: &'static str,
    field: &'static str,
    value: &'a Option<String>,
) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::missing(section, field)),
    }
}

fn required_url(section: &'static str, value: &Option<String>) -> Result<String> {
    let url = required(section, "baseUrl", value)?;
    Ok(url.trim_end_matches('/').to_string())
}

fn required_stop_date(section: &'static str, value: &Option<String>) -> Result<DateTime<Utc>> {
    let raw = required(section, "stopDate", value)?;
    parse_stop_date(raw).ok_or_else(|| Error::Config {
        section,
        field: "stopDate",
        reason: format!("'{raw}' is not YYYY-MM-DD or an RFC 3339 timestamp"),
    })
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_stop_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn or_default(value: &Option<String>, default: &str) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// `nested` when set and non-empty, else `flat`.
fn either(nested: &Option<String>, flat: &Option<String>) -> Option<String> {
    match nested.as_deref() {
        Some(v) if !v.is_empty() => nested.clone(),
        _ => flat.clone(),
    }
}

fn delay(value: Option<u64>, default_ms: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default_ms))
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubConfig {
    #[serde(default)]
    pub enabled: bool,
    pub username: Option<String>,
    pub stop_date: Option<String>,
    pub filter: Option<String>,
    #[serde(default)]
    pub types: GithubTypes,
    #[serde(default)]
    pub allow_private: bool,
    pub delay_ms_per_request: Option<u64>,
    pub commits_enabled: Option<bool>,
    pub issues_enabled: Option<bool>,
    pub reviews_enabled: Option<bool>,
    pub comments_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubTypes {
    pub commit: Option<String>,
    pub private_commit: Option<String>,
    #[serde(rename = "createdPR")]
    pub created_pr: Option<String>,
    pub created_issue: Option<String>,
    #[serde(rename = "commentedPR")]
    pub commented_pr: Option<String>,
    #[serde(rename = "approvedPR")]
    pub approved_pr: Option<String>,
    #[serde(rename = "changesRequestedPR")]
    pub changes_requested_pr: Option<String>,
    #[serde(rename = "reviewedPR")]
    pub reviewed_pr: Option<String>,
    pub commented: Option<String>,
}

/// Type strings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubTypeNames {
    pub commit: String,
    pub private_commit: String,
    pub created_pr: String,
    pub created_issue: String,
    pub commented_pr: String,
    pub approved_pr: String,
    pub changes_requested_pr: String,
    pub reviewed_pr: String,
    pub commented: String,
}

impl From<&GithubTypes> for GithubTypeNames {
    fn from(t: &GithubTypes) -> Self {
        Self {
            commit: or_default(&t.commit, "GitHub Commit"),
            private_commit: or_default(&t.private_commit, "Commit in private repository"),
            created_pr: or_default(&t.created_pr, "Created PR"),
            created_issue: or_default(&t.created_issue, "Created Issue Report"),
            commented_pr: or_default(&t.commented_pr, "Commented on a Pull Request"),
            approved_pr: or_default(&t.approved_pr, "Approved a Pull Request"),
            changes_requested_pr: or_default(
                &t.changes_requested_pr,
                "Requested changes on a Pull Request",
            ),
            reviewed_pr: or_default(&t.reviewed_pr, "Reviewed a Pull Request"),
            commented: or_default(&t.commented, "Commented on an Issue"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubSettings {
    pub username: String,
    pub stop_date: DateTime<Utc>,
    /// Case-insensitive, matched against an item's `html_url`.
    pub filter: Regex,
    pub types: GithubTypeNames,
    pub allow_private: bool,
    pub delay: Duration,
    pub commits_enabled: bool,
    pub issues_enabled: bool,
    pub reviews_enabled: bool,
    pub comments_enabled: bool,
}

impl GithubConfig {
    pub fn resolve(&self) -> Result<Option<GithubSettings>> {
        if !self.enabled {
            return Ok(None);
        }
        let username = required(GITHUB, "username", &self.username)?.to_string();
        let stop_date = required_stop_date(GITHUB, &self.stop_date)?;
        let pattern = required(GITHUB, "filter", &self.filter)?;
        let filter = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config {
                section: GITHUB,
                field: "filter",
                reason: format!("is not a valid regex: {e}"),
            })?;

        Ok(Some(GithubSettings {
            username,
            stop_date,
            filter,
            types: GithubTypeNames::from(&self.types),
            allow_private: self.allow_private,
            delay: delay(self.delay_ms_per_request, GITHUB_DEFAULT_DELAY_MS),
            commits_enabled: self.commits_enabled.unwrap_or(true),
            issues_enabled: self.issues_enabled.unwrap_or(true),
            reviews_enabled: self.reviews_enabled.unwrap_or(true),
            comments_enabled: self.comments_enabled.unwrap_or(true),
        }))
    }
}

// ---------------------------------------------------------------------------
// Bugzilla
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugzillaConfig {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub stop_date: Option<String>,
    #[serde(default)]
    pub types: BugzillaTypes,
    pub delay_ms_per_request: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugzillaTypes {
    pub created_type: Option<String>,
    pub commented_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugzillaSettings {
    pub base_url: String,
    pub username: String,
    pub stop_date: DateTime<Utc>,
    pub created_type: String,
    pub commented_type: String,
    pub delay: Duration,
}

impl BugzillaConfig {
    pub fn resolve(&self) -> Result<Option<BugzillaSettings>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(BugzillaSettings {
            base_url: required_url(BUGZILLA, &self.base_url)?,
            username: required(BUGZILLA, "username", &self.username)?.to_string(),
            stop_date: required_stop_date(BUGZILLA, &self.stop_date)?,
            created_type: or_default(&self.types.created_type, "Created a Bug Report"),
            commented_type: or_default(&self.types.commented_type, "Commented on a Bug Report"),
            delay: delay(self.delay_ms_per_request, BUGZILLA_DEFAULT_DELAY_MS),
        }))
    }
}

// ---------------------------------------------------------------------------
// Discourse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscourseConfig {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub types: DiscourseTypes,
    /// Flat spellings of `types.topic` and `types.post`, as older config files use them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    /// Keep previously saved topics and posts that no longer show up upstream.
    #[serde(default, alias = "keepDeletedPost")]
    pub keep_deleted_posts: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscourseTypes {
    pub topic: Option<String>,
    pub post: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscourseSettings {
    pub base_url: String,
    pub username: String,
    pub topic_type: String,
    pub post_type: String,
    pub keep_deleted_posts: bool,
}

impl DiscourseConfig {
    pub fn resolve(&self) -> Result<Option<DiscourseSettings>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(DiscourseSettings {
            base_url: required_url(DISCOURSE, &self.base_url)?,
            username: required(DISCOURSE, "username", &self.username)?.to_string(),
            topic_type: or_default(
                &either(&self.types.topic, &self.topic_type),
                "Created Discourse Topic",
            ),
            post_type: or_default(
                &either(&self.types.post, &self.post_type),
                "Posted on Discourse Topic",
            ),
            keep_deleted_posts: self.keep_deleted_posts,
        }))
    }
}

// ---------------------------------------------------------------------------
// Community Portal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPortalConfig {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub types: CommunityPortalTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPortalTypes {
    pub participation: Option<String>,
    pub campaign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityPortalSettings {
    pub base_url: String,
    pub username: String,
    pub participation_type: String,
    pub campaign_type: String,
}

impl CommunityPortalConfig {
    pub fn resolve(&self) -> Result<Option<CommunityPortalSettings>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(CommunityPortalSettings {
            base_url: required_url(COMMUNITY_PORTAL, &self.base_url)?,
            username: required(COMMUNITY_PORTAL, "username", &self.username)?.to_string(),
            participation_type: or_default(
                &either(&self.types.participation, &self.participation_type),
                "Participated in an event",
            ),
            campaign_type: or_default(
                &either(&self.types.campaign, &self.campaign_type),
                "Participated in a campaign",
            ),
        }))
    }
}

// ---------------------------------------------------------------------------
// MediaWiki
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WikiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Feed URL that already carries its own query string.
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub stop_date: Option<String>,
    #[serde(default)]
    pub types: EditTypes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTypes {
    pub edit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiSettings {
    pub base_url: String,
    pub username: String,
    pub stop_date: DateTime<Utc>,
    pub edit_type: String,
}

impl WikiConfig {
    pub fn resolve(&self) -> Result<Option<WikiSettings>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(WikiSettings {
            base_url: required(MEDIA_WIKI, "baseUrl", &self.base_url)?.to_string(),
            username: required(MEDIA_WIKI, "username", &self.username)?.to_string(),
            stop_date: required_stop_date(MEDIA_WIKI, &self.stop_date)?,
            edit_type: or_default(&either(&self.types.edit, &self.edit_type), "Wiki Edit"),
        }))
    }
}

// ---------------------------------------------------------------------------
// OpenStreetMap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsmConfig {
    #[serde(default)]
    pub enabled: bool,
    pub display_name: Option<String>,
    pub stop_date: Option<String>,
    #[serde(default)]
    pub types: EditTypes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmSettings {
    pub display_name: String,
    pub stop_date: DateTime<Utc>,
    pub edit_type: String,
}

impl OsmConfig {
    pub fn resolve(&self) -> Result<Option<OsmSettings>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(OsmSettings {
            display_name: required(OSM, "displayName", &self.display_name)?.to_string(),
            stop_date: required_stop_date(OSM, &self.stop_date)?,
            edit_type: or_default(&self.types.edit, "OpenStreetMaps Edit"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn github_enabled() -> GithubConfig {
        GithubConfig {
            enabled: true,
            username: Some("octo".into()),
            stop_date: Some("2022-01-01".into()),
            filter: Some("contribution-test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn output_file_is_required() {
        let err = AggregateConfig::default().validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                field: "outputFile",
                ..
            }
        ));
    }

    #[test]
    fn disabled_sources_are_not_checked() {
        let cfg = AggregateConfig {
            output_file: Some("out.json".into()),
            github: Some(GithubConfig::default()),
            bugzilla: Some(BugzillaConfig::default()),
            ..Default::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn enabled_source_reports_section_and_field() {
        let cfg = AggregateConfig {
            output_file: Some("out.json".into()),
            bugzilla: Some(BugzillaConfig {
                enabled: true,
                base_url: Some("https://bugzilla.example.org".into()),
                stop_date: Some("2020-01-01".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config for bugzilla: username is required"
        );
    }

    #[test]
    fn github_filter_must_compile() {
        let mut gh = github_enabled();
        gh.filter = Some("(unclosed".into());
        let err = gh.resolve().unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                section: "github",
                field: "filter",
                ..
            }
        ));
    }

    #[test]
    fn github_defaults_apply() {
        let settings = github_enabled().resolve().unwrap().unwrap();
        assert_eq!(settings.types.commit, "GitHub Commit");
        assert_eq!(settings.types.reviewed_pr, "Reviewed a Pull Request");
        assert_eq!(settings.delay, Duration::from_millis(2000));
        assert!(settings.commits_enabled && settings.comments_enabled);
        assert!(settings.filter.is_match("https://github.com/Contribution-Test/foo"));
        assert_eq!(
            settings.stop_date,
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn stop_date_accepts_date_or_timestamp() {
        assert_eq!(
            parse_stop_date("2021-06-15T12:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2021, 6, 15, 10, 30, 0).unwrap())
        );
        assert!(parse_stop_date("15/06/2021").is_none());

        let mut gh = github_enabled();
        gh.stop_date = Some("yesterday".into());
        assert!(matches!(
            gh.resolve().unwrap_err(),
            Error::Config {
                field: "stopDate",
                ..
            }
        ));
    }

    #[test]
    fn parses_yaml_with_camel_case_keys() {
        let raw = r#"
outputFile: contributions.json
github:
  enabled: true
  username: octo
  stopDate: "2022-01-01"
  filter: contribution-test
  issuesEnabled: false
  delayMsPerRequest: 0
  types:
    createdPR: Opened PR
discourse:
  enabled: true
  baseUrl: https://discourse.example.org/
  username: octo
  keepDeletedPost: true
"#;
        let cfg = AggregateConfig::parse(Path::new("config.yaml"), raw).unwrap();
        cfg.validate().unwrap();

        let gh = cfg.github.as_ref().unwrap().resolve().unwrap().unwrap();
        assert!(!gh.issues_enabled);
        assert_eq!(gh.delay, Duration::ZERO);
        assert_eq!(gh.types.created_pr, "Opened PR");

        let d = cfg.discourse.as_ref().unwrap().resolve().unwrap().unwrap();
        assert!(d.keep_deleted_posts);
        assert_eq!(d.base_url, "https://discourse.example.org");
    }

    #[test]
    fn flat_type_keys_override_defaults() {
        let raw = r#"{
            "outputFile": "out.json",
            "discourse": {"enabled": true, "baseUrl": "https://d.example.org", "username": "octo",
                          "topicType": "T!", "postType": "P!"},
            "mediaWiki": {"enabled": true, "baseUrl": "https://w.example.org/api.php?a=b",
                          "username": "octo", "stopDate": "2021-01-01", "editType": "E!"},
            "communityPortal": {"enabled": true, "baseUrl": "https://p.example.org", "username": "octo",
                                "participationType": "Ev!", "campaignType": "Ca!"}
        }"#;
        let cfg = AggregateConfig::parse(Path::new("config.json"), raw).unwrap();

        let d = cfg.discourse.as_ref().unwrap().resolve().unwrap().unwrap();
        assert_eq!((d.topic_type.as_str(), d.post_type.as_str()), ("T!", "P!"));
        let w = cfg.media_wiki.as_ref().unwrap().resolve().unwrap().unwrap();
        assert_eq!(w.edit_type, "E!");
        let p = cfg.community_portal.as_ref().unwrap().resolve().unwrap().unwrap();
        assert_eq!(p.participation_type, "Ev!");
        assert_eq!(p.campaign_type, "Ca!");
    }

    #[test]
    fn nested_types_win_over_flat_keys() {
        let raw = r#"{"outputFile": "out.json", "discourse": {"enabled": true,
            "baseUrl": "https://d.example.org", "username": "octo",
            "topicType": "flat", "types": {"topic": "nested"}}}"#;
        let cfg = AggregateConfig::parse(Path::new("config.json"), raw).unwrap();
        let d = cfg.discourse.as_ref().unwrap().resolve().unwrap().unwrap();
        assert_eq!(d.topic_type, "nested");
        assert_eq!(d.post_type, "Posted on Discourse Topic");
    }

    #[test]
    fn parses_json_by_default() {
        let raw = r#"{"outputFile":"out.json","osm":{"enabled":true,"displayName":"mapper","stopDate":"2020-01-01"}}"#;
        let cfg = AggregateConfig::parse(Path::new("config.json"), raw).unwrap();
        let osm = cfg.osm.as_ref().unwrap().resolve().unwrap().unwrap();
        assert_eq!(osm.edit_type, "OpenStreetMaps Edit");
    }
}
