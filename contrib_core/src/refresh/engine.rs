use crate::config::AggregateConfig;
use crate::models::{Contribution, Retention, SourceTag, ensure_unique, sort_newest_first};
use crate::refresh::traits::{SnapshotView, Source};
use crate::snapshot::SnapshotStore;
use crate::Result;
use std::sync::Arc;

/// Result of one aggregation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Merged contributions, newest first.
    pub contributions: Vec<Contribution>,
    /// Whether the snapshot was rewritten.
    pub written: bool,
    /// Record count of the snapshot before this cycle.
    pub previous_len: usize,
}

/// Runs every registered source against the previous snapshot and merges the results.
pub struct ReconcileEngine {
    config: AggregateConfig,
    store: Arc<dyn SnapshotStore>,
    sources: Vec<Arc<dyn Source>>,
}

impl ReconcileEngine {
    pub fn new(config: AggregateConfig, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            config,
            store,
            sources: Vec::new(),
        }
    }

    /// Registers a source. Sources run in registration order.
    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = Arc<dyn Source>>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn load_previous(&self) -> Result<Vec<Contribution>> {
        match self.store.load().await? {
            Some(records) => Ok(records),
            None => {
                tracing::info!("snapshot does not exist yet, creating an empty one");
                self.store.save(&[]).await?;
                Ok(Vec::new())
            }
        }
    }

    /// Runs one cycle. Any source error aborts the cycle before anything is written.
    #[tracing::instrument(level = "info", name = "contrib.reconcile", skip(self))]
    pub async fn run(&self) -> Result<ReconcileOutcome> {
        self.config.validate()?;
        let previous = self.load_previous().await?;

        let mut refetched: Vec<Contribution> = Vec::new();
        let mut incremental: Vec<Contribution> = Vec::new();
        let mut retained_tags: Vec<SourceTag> = Vec::new();

        for source in &self.sources {
            let view = SnapshotView::for_tags(&previous, source.tags());
            let items = source.gather(&view).await?;
            tracing::info!(
                source = source.id(),
                count = items.len(),
                known = view.len(),
                "source gathered"
            );
            match source.retention() {
                Retention::FullRefetch => {
                    if source.retains_unseen() {
                        retained_tags.extend(source.tags().iter().cloned());
                    }
                    refetched.extend(items);
                }
                Retention::Incremental => incremental.extend(items),
            }
        }

        let kept: Vec<Contribution> = previous
            .iter()
            .filter(|c| match c.source.retention() {
                Retention::Incremental => true,
                Retention::FullRefetch => retained_tags.contains(&c.source),
            })
            .cloned()
            .collect();
        tracing::info!(kept = kept.len(), previous = previous.len(), "snapshot retained");

        let mut merged = ensure_unique(
            kept.into_iter()
                .chain(refetched)
                .chain(incremental)
                .collect(),
        );
        sort_newest_first(&mut merged);

        // Length-only comparison: equal counts are treated as "nothing changed".
        if merged.len() == previous.len() {
            tracing::info!(total = merged.len(), "no update, snapshot left untouched");
            return Ok(ReconcileOutcome {
                contributions: merged,
                written: false,
                previous_len: previous.len(),
            });
        }

        self.store.save(&merged).await?;
        tracing::info!(total = merged.len(), previous = previous.len(), "snapshot written");
        Ok(ReconcileOutcome {
            contributions: merged,
            written: true,
            previous_len: previous.len(),
        })
    }
}
