//! Contribution aggregator core: shared models, config validation, and snapshot reconciliation.

pub mod config;
pub mod error;
pub mod models;
pub mod o11y;
pub mod refresh;
pub mod snapshot;

pub use config::{
    AggregateConfig, BugzillaSettings, CommunityPortalSettings, DiscourseSettings,
    GithubSettings, GithubTypeNames, OsmSettings, WikiSettings,
};
pub use error::{Error, Result};
pub use models::{Contribution, Retention, SourceTag, ensure_unique, sort_newest_first};
pub use refresh::engine::{ReconcileEngine, ReconcileOutcome};
pub use refresh::paging::{MonthWindow, MonthWindows, PageCursor, PageState};
pub use refresh::traits::{SnapshotView, Source};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
