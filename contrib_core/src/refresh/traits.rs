use crate::Result;
use crate::models::{Contribution, Retention, SourceTag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only slice of the previous snapshot handed to one source.
///
/// Holds only records whose tag belongs to that source.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView<'a> {
    records: Vec<&'a Contribution>,
}

impl<'a> SnapshotView<'a> {
    pub fn for_tags(snapshot: &'a [Contribution], tags: &[SourceTag]) -> Self {
        Self {
            records: snapshot
                .iter()
                .filter(|c| tags.contains(&c.source))
                .collect(),
        }
    }

    pub fn records(&self) -> &[&'a Contribution] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// High-water mark: the newest `createdAt` among records tagged with any of `tags`.
    pub fn latest(&self, tags: &[SourceTag]) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .filter(|c| tags.contains(&c.source))
            .map(|c| c.created_at)
            .max()
    }

    /// High-water mark for `tags`, falling back to `stop_date` when none is known.
    pub fn cursor(&self, tags: &[SourceTag], stop_date: DateTime<Utc>) -> DateTime<Utc> {
        self.latest(tags).unwrap_or(stop_date)
    }
}

/// One external contribution source.
///
/// Implementations live in `contrib_integrations`. A disabled source is simply not
/// registered with the engine.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable adapter id (`"github"`, `"bugzilla"`, ...).
    fn id(&self) -> &'static str;

    /// The fixed set of tags this source produces.
    fn tags(&self) -> &'static [SourceTag];

    fn retention(&self) -> Retention;

    /// Opt-in for full-refetch sources: keep prior records that were not re-observed.
    fn retains_unseen(&self) -> bool {
        false
    }

    /// Fetch contributions newer than the view's high-water marks (incremental sources) or
    /// the complete upstream view (full-refetch sources).
    async fn gather(&self, previous: &SnapshotView<'_>) -> Result<Vec<Contribution>>;
}
