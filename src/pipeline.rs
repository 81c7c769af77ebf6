//! Document Assembler - Single Entry Point
//!
//! EMPTY -> PLANNING -> COMPOSING -> DONE. A build either finishes with at
//! least one placed card or fails before any page is produced.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifacts::{ArtifactCache, ArtifactProvider, ArtifactWarning, CardId, Face};
use crate::compose::{Page, PageComposer};
use crate::geometry::{GeometryError, PageGeometry};
use crate::hashing::{compute_layout_hash, compute_request_hash};
use crate::print::PrintConfig;
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] GeometryError),

    #[error("Empty print request: no card copies were selected")]
    EmptyRequest,

    #[error("Nothing placed: none of the {requested} requested copies had a front artifact")]
    NothingPlaced {
        requested: usize,
        skipped: BTreeSet<CardId>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Flat, ordered list with one entry per physical copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrintRequest(Vec<CardId>);

impl PrintRequest {
    pub fn new(card_ids: Vec<CardId>) -> Self {
        Self(card_ids)
    }

    /// Expand (identity, copies) pairs, keeping pair order
    pub fn from_counts(counts: impl IntoIterator<Item = (CardId, u32)>) -> Self {
        let mut ids = vec![];
        for (id, copies) in counts {
            for _ in 0..copies {
                ids.push(id.clone());
            }
        }
        Self(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CardId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[CardId] {
        &self.0
    }
}

impl FromIterator<CardId> for PrintRequest {
    fn from_iter<I: IntoIterator<Item = CardId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Empty,
    Planning,
    Composing,
    Done,
}

/// Finished multi-page document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub config: PrintConfig,
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages_of(&self, face: Face) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(move |p| p.face == face)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub placed_count: usize,
    pub skipped_card_identities: BTreeSet<CardId>,
    pub missing_back_identities: BTreeSet<CardId>,
    pub page_count: usize,
    pub front_page_count: usize,
    pub back_page_count: usize,
    pub warnings: Vec<ArtifactWarning>,
    pub request_hash: String,
    pub layout_hash: String,
}

impl BuildReport {
    /// Completed, but some cards or backs are missing
    pub fn is_degraded(&self) -> bool {
        !self.skipped_card_identities.is_empty() || !self.missing_back_identities.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub document: Document,
    pub report: BuildReport,
}

/// Drives planning and composition for one document
pub struct DocumentAssembler {
    config: PrintConfig,
    prefetch: bool,
    state: BuildState,
}

impl DocumentAssembler {
    pub fn new(config: PrintConfig) -> Self {
        Self {
            config,
            prefetch: true,
            state: BuildState::Empty,
        }
    }

    /// Acquire artifacts concurrently before placement (on by default)
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Compute the grid for this assembler's config without building.
    pub fn plan(&self) -> Result<PageGeometry, BuildError> {
        Ok(PageGeometry::for_config(&self.config)?)
    }

    pub fn build(
        &mut self,
        request: &PrintRequest,
        provider: &dyn ArtifactProvider,
    ) -> Result<BuildOutput, BuildError> {
        self.state = BuildState::Empty;

        if request.is_empty() {
            return Err(BuildError::EmptyRequest);
        }

        self.transition(BuildState::Planning);
        let geometry = self.plan()?;
        debug!(
            columns = geometry.columns,
            rows = geometry.rows,
            margin_x = geometry.margin_x,
            margin_y = geometry.margin_y,
            "Grid planned"
        );

        self.transition(BuildState::Composing);
        let config = &self.config;
        let request_hash = compute_request_hash(request, config, ENGINE_VERSION)?;

        let mut cache = ArtifactCache::new(provider, config);
        if self.prefetch {
            // fronts first: back prefetch only covers cards that will be placed
            cache.prefetch(request.iter(), Face::Front);
            if config.print_back_side {
                cache.prefetch(request.iter(), Face::Back);
            }
        }

        let mut composer = PageComposer::new(request.as_slice(), &geometry, config, cache);
        let pages: Vec<Page> = composer.by_ref().collect();
        let (summary, cache) = composer.finish();

        if pages.is_empty() {
            return Err(BuildError::NothingPlaced {
                requested: request.len(),
                skipped: summary.skipped,
            });
        }

        let layout_hash = compute_layout_hash(config, &geometry, &pages)?;
        let mut warnings = cache.into_warnings();
        warnings.sort_by(|a, b| (&a.card_id, a.face.as_str()).cmp(&(&b.card_id, b.face.as_str())));
        let front_page_count = pages.iter().filter(|p| p.face == Face::Front).count();

        let report = BuildReport {
            placed_count: summary.placed_count,
            skipped_card_identities: summary.skipped,
            missing_back_identities: summary.missing_backs,
            page_count: pages.len(),
            front_page_count,
            back_page_count: pages.len() - front_page_count,
            warnings,
            request_hash,
            layout_hash,
        };

        let document = Document {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            config: self.config.clone(),
            geometry,
            pages,
        };

        self.transition(BuildState::Done);
        info!(
            document = %document.id,
            pages = report.page_count,
            placed = report.placed_count,
            skipped = report.skipped_card_identities.len(),
            missing_backs = report.missing_back_identities.len(),
            "Document built"
        );

        Ok(BuildOutput { document, report })
    }

    fn transition(&mut self, next: BuildState) {
        debug!(from = ?self.state, to = ?next, "Build state");
        self.state = next;
    }
}

/// Build a document in one call.
pub fn build(
    request: &PrintRequest,
    config: &PrintConfig,
    provider: &dyn ArtifactProvider,
) -> Result<BuildOutput, BuildError> {
    DocumentAssembler::new(config.clone()).build(request, provider)
}
