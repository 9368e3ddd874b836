use crate::config::{Config, DEFAULT_PAGE_SIZE};
use crate::convert::{Source, convert_with_report};
use crate::error::Result;
use crate::models::NoteOccurrencesMap;
use crate::store::{GrafeasClient, MetadataStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of pushing a converted collection to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub notes_created: usize,
    pub occurrences_created: usize,
    /// Entries skipped during conversion (only set by [`ArtifactAnalysis::import`]).
    pub skipped: usize,
    pub failures: usize,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub notes_deleted: usize,
    pub occurrences_deleted: usize,
    pub failures: usize,
}

pub struct ArtifactAnalysis {
    store: Arc<dyn MetadataStore + Send + Sync>,
    project: String,
    page_size: u32,
}

impl ArtifactAnalysis {
    pub fn new(store: Arc<dyn MetadataStore + Send + Sync>, project: impl Into<String>) -> Self {
        Self {
            store,
            project: project.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Build a manager talking to the configured container-analysis endpoint.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(GrafeasClient::from_config(config)?);
        Ok(Self::new(store, config.project.clone()).with_page_size(config.page_size))
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Convert a report and publish the result.
    pub async fn import(&self, source: &Source) -> Result<PublishSummary> {
        let (list, report) = convert_with_report(source)?;
        let mut summary = self.publish(&list).await?;
        summary.skipped = report.skipped.len();
        Ok(summary)
    }

    /// Create every note, then its occurrences.
    ///
    /// A failed item is logged and counted; the remaining items are still sent.
    /// Occurrences of a note that could not be created are not sent.
    pub async fn publish(&self, list: &NoteOccurrencesMap) -> Result<PublishSummary> {
        let mut summary = PublishSummary::default();

        let mut note_ids: Vec<&String> = list.keys().collect();
        note_ids.sort();

        for note_id in note_ids {
            let nocc = &list[note_id];

            if let Err(e) = self
                .store
                .create_note(&self.project, note_id, &nocc.note)
                .await
            {
                warn!("Failed to create note {}: {}", note_id, e);
                summary.failures += 1 + nocc.occurrences.len();
                continue;
            }
            summary.notes_created += 1;

            for occurrence in &nocc.occurrences {
                match self
                    .store
                    .create_occurrence(&self.project, occurrence)
                    .await
                {
                    Ok(name) => {
                        summary.occurrences_created += 1;
                        debug!("Created occurrence {} for {}", name, note_id);
                    }
                    Err(e) => {
                        warn!("Failed to create occurrence for {}: {}", note_id, e);
                        summary.failures += 1;
                    }
                }
            }
        }

        info!(
            "Published {} notes and {} occurrences to project {} ({} failures)",
            summary.notes_created, summary.occurrences_created, self.project, summary.failures
        );
        Ok(summary)
    }

    /// Delete the notes in `list` and every occurrence recorded against
    /// `resource_uri` (e.g. `https://registry.example.com/foo`).
    ///
    /// Individual delete failures are counted and skipped; a failure to list
    /// occurrences aborts the pass.
    pub async fn purge(&self, list: &NoteOccurrencesMap, resource_uri: &str) -> Result<PurgeSummary> {
        let mut summary = PurgeSummary::default();

        for note_id in list.keys() {
            let name = format!("projects/{}/notes/{}", self.project, note_id);
            match self.store.delete_note(&name).await {
                Ok(()) => summary.notes_deleted += 1,
                Err(e) => {
                    warn!("Failed to delete note {}: {}", name, e);
                    summary.failures += 1;
                }
            }
        }

        let filter = format!("resource_url=\"{}\"", resource_uri);
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_occurrences(
                    &self.project,
                    &filter,
                    self.page_size,
                    page_token.as_deref(),
                )
                .await?;

            for occurrence in &page.occurrences {
                match self.store.delete_occurrence(&occurrence.name).await {
                    Ok(()) => summary.occurrences_deleted += 1,
                    Err(e) => {
                        warn!("Failed to delete occurrence {}: {}", occurrence.name, e);
                        summary.failures += 1;
                    }
                }
            }

            match page.next_token() {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }

        info!(
            "Purged {} notes and {} occurrences for {} ({} failures)",
            summary.notes_deleted, summary.occurrences_deleted, resource_uri, summary.failures
        );
        Ok(summary)
    }
}
