//! CATALOG phase
//!
//! Reads the persisted catalog table when present; otherwise loads the catalog from the
//! catalog source and persists it so later runs never touch the catalog page again.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::Orchestrator;
use crate::config::{SelectionConfig, SelectionMode, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{CatalogEntry, RunReport};
use crate::services::{CatalogSource, TableCatalogSource};
use crate::tables;

impl Orchestrator {
    /// CATALOG - full catalog in catalog order
    ///
    /// # Errors
    /// [`PipelineError::CatalogUnavailable`] when no entries can be obtained.
    pub(super) async fn phase_catalog(
        &self,
        report: &mut RunReport,
        upstream_recomputed: &mut bool,
    ) -> PipelineResult<Vec<CatalogEntry>> {
        tracing::info!("Phase: CATALOG");

        let entries = if self
            .can_resume(Stage::Catalog, tables::CATALOG_TABLE, *upstream_recomputed)
            .await?
        {
            report.mark_resumed(Stage::Catalog);
            TableCatalogSource::new(self.store.clone())
                .load()
                .await
                .map_err(|e| PipelineError::CatalogUnavailable(e.to_string()))?
        } else {
            let entries = self
                .catalog_source
                .load()
                .await
                .map_err(|e| PipelineError::CatalogUnavailable(e.to_string()))?;
            if entries.is_empty() {
                return Err(PipelineError::CatalogUnavailable(
                    "catalog source returned no entries".to_string(),
                ));
            }
            tables::write_catalog(self.store.as_ref(), &entries).await?;
            *upstream_recomputed = true;
            entries
        };

        if entries.is_empty() {
            return Err(PipelineError::CatalogUnavailable(format!(
                "{} has no entries",
                tables::CATALOG_TABLE
            )));
        }

        report.catalog_entries = entries.len();
        Ok(entries)
    }
}

/// Entries processed in this run, in catalog order
///
/// `Head` takes the first `max_entries`; `Sample` draws `max_entries` distinct entries
/// uniformly (reproducibly when `seed` is set) and keeps them in catalog order.
pub fn select_entries(catalog: &[CatalogEntry], selection: &SelectionConfig) -> Vec<CatalogEntry> {
    let limit = match selection.max_entries {
        Some(limit) if limit < catalog.len() => limit,
        _ => return catalog.to_vec(),
    };

    match selection.mode {
        SelectionMode::Head => catalog[..limit].to_vec(),
        SelectionMode::Sample => {
            let mut rng = match selection.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut indices = rand::seq::index::sample(&mut rng, catalog.len(), limit).into_vec();
            indices.sort_unstable();
            indices.into_iter().map(|i| catalog[i].clone()).collect()
        }
    }
}
