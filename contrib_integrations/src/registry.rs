//! Builds the enabled adapters from an `AggregateConfig`, in the order they run.

use crate::http::{DEFAULT_TIMEOUT, Fetch, HttpFetch};
use contrib_core::config::{
    BugzillaConfig, CommunityPortalConfig, DiscourseConfig, GithubConfig, OsmConfig, WikiConfig,
    resolve_opt,
};
use contrib_core::{AggregateConfig, Result, Source};
use std::sync::Arc;

/// Adapters for every enabled section: Bugzilla, GitHub, MediaWiki, Community Portal,
/// Discourse, then OpenStreetMap. Disabled or absent sections are left out.
#[tracing::instrument(level = "debug", skip(config))]
pub fn sources_from_config(config: &AggregateConfig) -> Result<Vec<Arc<dyn Source>>> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();
    let shared: Arc<dyn Fetch> = Arc::new(HttpFetch::new(DEFAULT_TIMEOUT)?);

    #[cfg(feature = "bugzilla")]
    if let Some(settings) = resolve_opt(&config.bugzilla, BugzillaConfig::resolve)? {
        use crate::sources::bugzilla::{BugzillaSource, FETCH_TIMEOUT};
        let fetch: Arc<dyn Fetch> = Arc::new(HttpFetch::new(FETCH_TIMEOUT)?);
        sources.push(Arc::new(BugzillaSource::new(settings, fetch)));
    }

    #[cfg(feature = "github")]
    if let Some(settings) = resolve_opt(&config.github, GithubConfig::resolve)? {
        use crate::sources::github::{GithubSource, client::GithubRestClient};
        let api = Arc::new(GithubRestClient::new()?);
        sources.push(Arc::new(GithubSource::new(settings, api)));
    }

    #[cfg(feature = "wiki")]
    if let Some(settings) = resolve_opt(&config.media_wiki, WikiConfig::resolve)? {
        use crate::sources::wiki::WikiSource;
        sources.push(Arc::new(WikiSource::new(settings, shared.clone())));
    }

    #[cfg(feature = "community_portal")]
    if let Some(settings) =
        resolve_opt(&config.community_portal, CommunityPortalConfig::resolve)?
    {
        use crate::sources::community_portal::CommunityPortalSource;
        sources.push(Arc::new(CommunityPortalSource::new(settings, shared.clone())));
    }

    #[cfg(feature = "discourse")]
    if let Some(settings) = resolve_opt(&config.discourse, DiscourseConfig::resolve)? {
        use crate::sources::discourse::DiscourseSource;
        sources.push(Arc::new(DiscourseSource::new(settings, shared.clone())));
    }

    #[cfg(feature = "osm")]
    if let Some(settings) = resolve_opt(&config.osm, OsmConfig::resolve)? {
        use crate::sources::osm::OsmSource;
        sources.push(Arc::new(OsmSource::new(settings, shared.clone())));
    }

    tracing::debug!(
        ids = ?sources.iter().map(|s| s.id()).collect::<Vec<_>>(),
        "sources enabled"
    );
    Ok(sources)
}
