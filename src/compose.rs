//! Page Composer and Back-Side Mirror Pass
//!
//! Walks the print request in order and fills front pages cell by cell.
//! A page is only handed out once it is closed (full, or the request is
//! exhausted), so dropping the composer between pages never leaves a
//! half-placed sheet. When back printing is on, every front page is
//! followed by its mirrored back page.

use std::collections::BTreeSet;
use std::slice;

use serde::Serialize;
use tracing::{debug, warn};

use crate::artifacts::{ArtifactCache, CardId, Face, RasterImage};
use crate::geometry::{PageGeometry, Rect, Segment};
use crate::print::PrintConfig;

/// One placed item on the current page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellAssignment {
    pub column: u32,
    pub row: u32,
    pub card_id: CardId,
}

/// An artifact drawn into a cell
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub card_id: CardId,
    pub column: u32,
    pub row: u32,
    pub rect: Rect,
    #[serde(skip)]
    pub image: RasterImage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based position in the document
    pub number: usize,
    pub face: Face,
    pub placements: Vec<Placement>,
    pub cut_marks: Vec<Segment>,
}

impl Page {
    fn new(number: usize, face: Face) -> Self {
        Self {
            number,
            face,
            placements: vec![],
            cut_marks: vec![],
        }
    }

    pub fn assignments(&self) -> Vec<CellAssignment> {
        self.placements
            .iter()
            .map(|p| CellAssignment {
                column: p.column,
                row: p.row,
                card_id: p.card_id.clone(),
            })
            .collect()
    }

    pub fn placement_at(&self, column: u32, row: u32) -> Option<&Placement> {
        self.placements.iter().find(|p| p.column == column && p.row == row)
    }
}

/// Outcome of a composition run
#[derive(Debug, Clone, Default)]
pub struct CompositionSummary {
    pub placed_count: usize,
    pub skipped: BTreeSet<CardId>,
    pub missing_backs: BTreeSet<CardId>,
}

pub struct PageComposer<'a> {
    geometry: &'a PageGeometry,
    config: &'a PrintConfig,
    items: slice::Iter<'a, CardId>,
    cache: ArtifactCache<'a>,
    pending_back: Option<Page>,
    pages_emitted: usize,
    summary: CompositionSummary,
}

impl<'a> PageComposer<'a> {
    pub fn new(
        items: &'a [CardId],
        geometry: &'a PageGeometry,
        config: &'a PrintConfig,
        cache: ArtifactCache<'a>,
    ) -> Self {
        Self {
            geometry,
            config,
            items: items.iter(),
            cache,
            pending_back: None,
            pages_emitted: 0,
            summary: CompositionSummary::default(),
        }
    }

    pub fn summary(&self) -> &CompositionSummary {
        &self.summary
    }

    /// Stop composing and hand back what was recorded so far.
    pub fn finish(self) -> (CompositionSummary, ArtifactCache<'a>) {
        (self.summary, self.cache)
    }

    fn compose_front(&mut self) -> Option<Page> {
        let capacity = self.geometry.capacity();
        let mut page = Page::new(self.pages_emitted + 1, Face::Front);

        while page.placements.len() < capacity {
            let Some(card_id) = self.items.next() else { break };

            let Some(image) = self.cache.front(card_id) else {
                warn!(card_id = %card_id, "Skipping card without front artifact");
                self.summary.skipped.insert(card_id.clone());
                continue;
            };

            let (column, row) = self.geometry.cell_at(page.placements.len());
            place(&mut page, self.geometry, self.config, card_id, column, row, Some(image));
        }

        if page.placements.is_empty() {
            return None;
        }

        self.summary.placed_count += page.placements.len();
        debug!(
            page = page.number,
            cards = page.placements.len(),
            remaining = self.items.len(),
            "Front page closed"
        );
        Some(page)
    }
}

impl Iterator for PageComposer<'_> {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        if let Some(back) = self.pending_back.take() {
            self.pages_emitted += 1;
            return Some(back);
        }

        let front = self.compose_front()?;
        self.pages_emitted += 1;

        if self.config.print_back_side {
            let assignments = front.assignments();
            let (back, missing) = mirror_back_page(
                &assignments,
                self.geometry,
                self.config,
                &mut self.cache,
                self.pages_emitted + 1,
            );
            self.summary.missing_backs.extend(missing);
            self.pending_back = Some(back);
        }

        Some(front)
    }
}

/// Build the back page for a closed front page. Each card's back goes to the
/// mirrored column of the same row. Cells whose back is unavailable keep
/// their cut marks so the sheet still trims consistently.
pub fn mirror_back_page(
    assignments: &[CellAssignment],
    geometry: &PageGeometry,
    config: &PrintConfig,
    cache: &mut ArtifactCache<'_>,
    number: usize,
) -> (Page, Vec<CardId>) {
    let mut page = Page::new(number, Face::Back);
    let mut missing = vec![];

    for assignment in assignments {
        let column = geometry.mirror_column(assignment.column);
        let image = cache.back(&assignment.card_id);
        if image.is_none() {
            warn!(card_id = %assignment.card_id, page = number, "Back artifact unavailable, leaving cell blank");
            missing.push(assignment.card_id.clone());
        }
        place(&mut page, geometry, config, &assignment.card_id, column, assignment.row, image);
    }

    debug!(page = number, cards = page.placements.len(), "Back page closed");
    (page, missing)
}

fn place(
    page: &mut Page,
    geometry: &PageGeometry,
    config: &PrintConfig,
    card_id: &CardId,
    column: u32,
    row: u32,
    image: Option<RasterImage>,
) {
    if let Some(image) = image {
        page.placements.push(Placement {
            card_id: card_id.clone(),
            column,
            row,
            rect: geometry.card_rect(column, row),
            image,
        });
    }
    if config.show_cut_marks {
        page.cut_marks.extend(geometry.cut_marks(column, row));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{MemoryProvider, RasterFormat};

    fn raster() -> RasterImage {
        RasterImage::new(RasterFormat::Png, 650, 1004, vec![1u8; 8])
    }

    fn ids(names: &[&str]) -> Vec<CardId> {
        names.iter().map(|s| CardId::from(*s)).collect()
    }

    fn provider(names: &[&str], backs: bool) -> MemoryProvider {
        let mut p = MemoryProvider::new();
        for n in names {
            p.insert(*n, Face::Front, raster());
            if backs {
                p.insert(*n, Face::Back, raster());
            }
        }
        p
    }

    #[test]
    fn test_fronts_only() {
        let config = PrintConfig::default();
        let geometry = PageGeometry::for_config(&config).unwrap();
        let provider = provider(&["a", "b"], false);
        let items = ids(&["a", "b", "a"]);
        let cache = ArtifactCache::new(&provider, &config);

        let pages: Vec<Page> = PageComposer::new(&items, &geometry, &config, cache).collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].face, Face::Front);
        let cells: Vec<_> = pages[0].placements.iter().map(|p| (p.column, p.row, p.card_id.as_str())).collect();
        assert_eq!(cells, vec![(0, 0, "a"), (1, 0, "b"), (2, 0, "a")]);
        assert_eq!(pages[0].cut_marks.len(), 24);
    }

    #[test]
    fn test_back_page_follows_front_and_mirrors() {
        let config = PrintConfig {
            print_back_side: true,
            ..Default::default()
        };
        let geometry = PageGeometry::for_config(&config).unwrap();
        let provider = provider(&["a", "b", "c", "d"], true);
        let items = ids(&["a", "b", "c", "d"]);
        let cache = ArtifactCache::new(&provider, &config);

        let pages: Vec<Page> = PageComposer::new(&items, &geometry, &config, cache).collect();
        assert_eq!(pages.len(), 2);
        assert_eq!((pages[0].face, pages[1].face), (Face::Front, Face::Back));
        assert_eq!((pages[0].number, pages[1].number), (1, 2));

        let back = &pages[1];
        assert_eq!(back.placement_at(2, 0).unwrap().card_id.as_str(), "a");
        assert_eq!(back.placement_at(1, 0).unwrap().card_id.as_str(), "b");
        assert_eq!(back.placement_at(0, 0).unwrap().card_id.as_str(), "c");
        assert_eq!(back.placement_at(2, 1).unwrap().card_id.as_str(), "d");
    }

    #[test]
    fn test_missing_front_consumes_no_cell() {
        let config = PrintConfig::default();
        let geometry = PageGeometry::for_config(&config).unwrap();
        let provider = provider(&["a", "c"], false);
        let items = ids(&["a", "b", "c"]);
        let cache = ArtifactCache::new(&provider, &config);

        let mut composer = PageComposer::new(&items, &geometry, &config, cache);
        let page = composer.next().unwrap();
        assert!(composer.next().is_none());

        assert_eq!(page.placement_at(1, 0).unwrap().card_id.as_str(), "c");
        let (summary, _) = composer.finish();
        assert_eq!(summary.placed_count, 2);
        assert_eq!(summary.skipped.into_iter().collect::<Vec<_>>(), ids(&["b"]));
    }

    #[test]
    fn test_missing_back_keeps_cut_marks() {
        let config = PrintConfig {
            print_back_side: true,
            ..Default::default()
        };
        let geometry = PageGeometry::for_config(&config).unwrap();
        let mut provider = provider(&["a"], true);
        provider.insert("b", Face::Front, raster());
        let items = ids(&["a", "b"]);
        let cache = ArtifactCache::new(&provider, &config);

        let mut composer = PageComposer::new(&items, &geometry, &config, cache);
        let _front = composer.next().unwrap();
        let back = composer.next().unwrap();
        assert_eq!(back.placements.len(), 1);
        assert_eq!(back.cut_marks.len(), 16);

        let (summary, _) = composer.finish();
        assert!(summary.missing_backs.contains(&CardId::from("b")));
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn test_no_cut_marks_when_disabled() {
        let config = PrintConfig {
            show_cut_marks: false,
            ..Default::default()
        };
        let geometry = PageGeometry::for_config(&config).unwrap();
        let provider = provider(&["a"], false);
        let items = ids(&["a"]);
        let cache = ArtifactCache::new(&provider, &config);

        let pages: Vec<Page> = PageComposer::new(&items, &geometry, &config, cache).collect();
        assert!(pages[0].cut_marks.is_empty());
    }

    #[test]
    fn test_abandon_between_pages() {
        let config = PrintConfig::default();
        let geometry = PageGeometry::for_config(&config).unwrap();
        let provider = provider(&["a"], false);
        let items = ids(&["a"; 20]);
        let cache = ArtifactCache::new(&provider, &config);

        let mut composer = PageComposer::new(&items, &geometry, &config, cache);
        let first = composer.next().unwrap();
        assert_eq!(first.placements.len(), 9);
        let (summary, _) = composer.finish();
        assert_eq!(summary.placed_count, 9);
    }
}
