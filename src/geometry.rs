//! Grid Planner
//!
//! Pure page geometry. All values are millimeters measured from the
//! top-left corner of the page.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::print::{PrintConfig, BLEED_MM, CUT_MARK_LENGTH_MM, CUT_MARK_OFFSET_MM};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Invalid dimension {name}: {value}mm")]
    InvalidDimension { name: &'static str, value: f64 },

    #[error(
        "Page {page_width}x{page_height}mm cannot hold a {full_width}x{full_height}mm card cell \
         with {min_margin}mm margins ({columns} columns x {rows} rows)"
    )]
    NoCapacity {
        page_width: f64,
        page_height: f64,
        full_width: f64,
        full_height: f64,
        min_margin: f64,
        columns: u32,
        rows: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A straight line from (x1, y1) to (x2, y2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Segment {
    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Grid layout of card cells on one page. Computed once per build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub card_width: f64,
    pub card_height: f64,
    pub bleed: f64,
    pub min_margin: f64,
    pub full_width: f64,
    pub full_height: f64,
    pub columns: u32,
    pub rows: u32,
    pub margin_x: f64,
    pub margin_y: f64,
}

/// Fit as many bleed-inclusive card cells as the page allows and center the grid.
pub fn compute_geometry(
    page_width: f64,
    page_height: f64,
    card_width: f64,
    card_height: f64,
    bleed_enabled: bool,
    min_margin: f64,
) -> Result<PageGeometry, GeometryError> {
    require_positive("pageWidth", page_width)?;
    require_positive("pageHeight", page_height)?;
    require_positive("cardWidth", card_width)?;
    require_positive("cardHeight", card_height)?;
    if !min_margin.is_finite() || min_margin < 0.0 {
        return Err(GeometryError::InvalidDimension { name: "minMargin", value: min_margin });
    }

    let bleed = if bleed_enabled { BLEED_MM } else { 0.0 };
    let full_width = card_width + bleed * 2.0;
    let full_height = card_height + bleed * 2.0;

    let available_width = page_width - min_margin * 2.0;
    let available_height = page_height - min_margin * 2.0;

    let columns = fit_count(available_width, full_width);
    let rows = fit_count(available_height, full_height);

    if columns < 1 || rows < 1 {
        return Err(GeometryError::NoCapacity {
            page_width,
            page_height,
            full_width,
            full_height,
            min_margin,
            columns,
            rows,
        });
    }

    let margin_x = (page_width - columns as f64 * full_width) / 2.0;
    let margin_y = (page_height - rows as f64 * full_height) / 2.0;

    Ok(PageGeometry {
        page_width,
        page_height,
        card_width,
        card_height,
        bleed,
        min_margin,
        full_width,
        full_height,
        columns,
        rows,
        margin_x,
        margin_y,
    })
}

fn require_positive(name: &'static str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidDimension { name, value })
    }
}

fn fit_count(available: f64, cell: f64) -> u32 {
    if available <= 0.0 {
        return 0;
    }
    (available / cell).floor().min(u32::MAX as f64) as u32
}

impl PageGeometry {
    pub fn for_config(config: &PrintConfig) -> Result<Self, GeometryError> {
        let (page_width, page_height) = config.page_size_mm();
        compute_geometry(
            page_width,
            page_height,
            config.card.width,
            config.card.height,
            config.show_bleed,
            config.card.min_margin,
        )
    }

    /// Cells per page
    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// (column, row) of the k-th item on a page
    pub fn cell_at(&self, index: usize) -> (u32, u32) {
        let columns = self.columns as usize;
        ((index % columns) as u32, (index / columns) as u32)
    }

    /// Column a cell lands in after flipping the sheet on its long edge
    pub fn mirror_column(&self, column: u32) -> u32 {
        self.columns - 1 - column
    }

    /// Bleed-inclusive cell rectangle
    pub fn cell_rect(&self, column: u32, row: u32) -> Rect {
        Rect {
            x: self.margin_x + column as f64 * self.full_width,
            y: self.margin_y + row as f64 * self.full_height,
            width: self.full_width,
            height: self.full_height,
        }
    }

    /// Where the artifact is drawn: the cell inset by the bleed
    pub fn card_rect(&self, column: u32, row: u32) -> Rect {
        let cell = self.cell_rect(column, row);
        Rect {
            x: cell.x + self.bleed,
            y: cell.y + self.bleed,
            width: self.card_width,
            height: self.card_height,
        }
    }

    /// Eight marks on the trim lines, starting outside the bleed-inclusive cell.
    pub fn cut_marks(&self, column: u32, row: u32) -> [Segment; 8] {
        let cell = self.cell_rect(column, row);
        let (x, y) = (cell.x, cell.y);
        let off = CUT_MARK_OFFSET_MM;
        let len = CUT_MARK_LENGTH_MM;

        let cut_x1 = x + self.bleed;
        let cut_x2 = x + self.bleed + self.card_width;
        let cut_y1 = y + self.bleed;
        let cut_y2 = y + self.bleed + self.card_height;

        let top = y - off;
        let bottom = y + self.full_height + off;
        let left = x - off;
        let right = x + self.full_width + off;

        [
            // verticals
            Segment::new(cut_x1, top, cut_x1, top - len),
            Segment::new(cut_x2, top, cut_x2, top - len),
            Segment::new(cut_x1, bottom, cut_x1, bottom + len),
            Segment::new(cut_x2, bottom, cut_x2, bottom + len),
            // horizontals
            Segment::new(left, cut_y1, left - len, cut_y1),
            Segment::new(left, cut_y2, left - len, cut_y2),
            Segment::new(right, cut_y1, right + len, cut_y1),
            Segment::new(right, cut_y2, right + len, cut_y2),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::PageFormat;

    fn a4() -> PageGeometry {
        compute_geometry(210.0, 297.0, 55.0, 85.0, true, 5.0).unwrap()
    }

    #[test]
    fn test_a4_with_bleed_is_three_by_three() {
        let g = a4();
        assert_eq!(g.full_width, 59.0);
        assert_eq!(g.full_height, 89.0);
        assert_eq!((g.columns, g.rows), (3, 3));
        assert!((g.margin_x - 16.5).abs() < 1e-9);
        assert!((g.margin_y - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_bleed_packs_tighter() {
        let g = compute_geometry(210.0, 297.0, 55.0, 85.0, false, 5.0).unwrap();
        assert_eq!(g.bleed, 0.0);
        assert_eq!(g.full_width, 55.0);
        assert_eq!((g.columns, g.rows), (3, 3));
    }

    #[test]
    fn test_page_too_small_is_error() {
        let err = compute_geometry(60.0, 297.0, 55.0, 85.0, true, 5.0).unwrap_err();
        match err {
            GeometryError::NoCapacity { columns, rows, .. } => {
                assert_eq!(columns, 0);
                assert_eq!(rows, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_margin_larger_than_page_is_error() {
        assert!(matches!(
            compute_geometry(210.0, 297.0, 55.0, 85.0, true, 200.0),
            Err(GeometryError::NoCapacity { .. })
        ));
    }

    #[test]
    fn test_config_with_bad_dimensions_is_rejected() {
        let mut config = PrintConfig::default();
        config.card.width = 0.0;
        assert!(matches!(
            PageGeometry::for_config(&config),
            Err(GeometryError::InvalidDimension { name: "cardWidth", .. })
        ));

        let mut config = PrintConfig::default();
        config.card.min_margin = -1.0;
        assert!(matches!(
            PageGeometry::for_config(&config),
            Err(GeometryError::InvalidDimension { name: "minMargin", .. })
        ));

        let config = PrintConfig {
            page_format: PageFormat::Custom { width: f64::NAN, height: 10.0 },
            ..Default::default()
        };
        assert!(matches!(
            PageGeometry::for_config(&config),
            Err(GeometryError::InvalidDimension { name: "pageWidth", .. })
        ));
    }

    #[test]
    fn test_cell_positions() {
        let g = a4();
        assert_eq!(g.cell_at(0), (0, 0));
        assert_eq!(g.cell_at(2), (2, 0));
        assert_eq!(g.cell_at(4), (1, 1));
        assert_eq!(g.cell_at(8), (2, 2));

        let cell = g.cell_rect(1, 2);
        assert!((cell.x - (16.5 + 59.0)).abs() < 1e-9);
        assert!((cell.y - (15.0 + 178.0)).abs() < 1e-9);

        let card = g.card_rect(1, 2);
        assert!((card.x - (cell.x + 2.0)).abs() < 1e-9);
        assert!((card.y - (cell.y + 2.0)).abs() < 1e-9);
        assert_eq!((card.width, card.height), (55.0, 85.0));
    }

    #[test]
    fn test_mirror_column() {
        let g = a4();
        assert_eq!(g.mirror_column(0), 2);
        assert_eq!(g.mirror_column(1), 1);
        assert_eq!(g.mirror_column(2), 0);
    }

    #[test]
    fn test_cut_marks_sit_on_trim_lines() {
        let g = a4();
        let cell = g.cell_rect(0, 0);
        let marks = g.cut_marks(0, 0);

        // top-left vertical mark: at trim x, from 2mm above the cell upward 5mm
        assert_eq!(marks[0], Segment::new(cell.x + 2.0, cell.y - 2.0, cell.x + 2.0, cell.y - 7.0));
        // right-bottom horizontal mark: at trim y, from 2mm right of the cell outward
        let right = cell.x + 59.0 + 2.0;
        assert_eq!(marks[7], Segment::new(right, cell.y + 87.0, right + 5.0, cell.y + 87.0));

        for m in &marks {
            let len = ((m.x2 - m.x1).powi(2) + (m.y2 - m.y1).powi(2)).sqrt();
            assert!((len - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cut_marks_without_bleed_follow_card_edge() {
        let g = compute_geometry(210.0, 297.0, 55.0, 85.0, false, 5.0).unwrap();
        let cell = g.cell_rect(0, 0);
        let marks = g.cut_marks(0, 0);
        assert_eq!(marks[0].x1, cell.x);
        assert_eq!(marks[1].x1, cell.x + 55.0);
    }
}
