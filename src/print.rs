//! Print Configuration
//!
//! Immutable settings for one document build: page format, orientation,
//! card size, bleed, cut marks and back-side printing.

use serde::{Deserialize, Serialize};

use crate::validation::ValidationPolicy;

/// Bleed added around each card when bleed is enabled (mm)
pub const BLEED_MM: f64 = 2.0;

/// Gap between the bleed-inclusive cell edge and the start of a cut mark (mm)
pub const CUT_MARK_OFFSET_MM: f64 = 2.0;

/// Length of each cut mark (mm)
pub const CUT_MARK_LENGTH_MM: f64 = 5.0;

/// Stroke width of cut marks (mm)
pub const CUT_MARK_LINE_WIDTH_MM: f64 = 0.1;

/// Physical page format. Dimensions are portrait, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Custom { width: f64, height: f64 },
}

impl PageFormat {
    /// Portrait (width, height) in mm
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match *self {
            Self::A3 => (297.0, 420.0),
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
            Self::Custom { width, height } => (width, height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Where back artifacts come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BackDesign {
    /// Every card identity has its own back face
    #[default]
    PerCard,
    /// One back face (company template) reused for every cell
    Shared,
}

/// Trim size of a card and the minimum page margin around the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSpec {
    pub width: f64,
    pub height: f64,
    pub min_margin: f64,
}

impl Default for CardSpec {
    // 5.5cm x 8.5cm vertical card, 5mm minimum margin
    fn default() -> Self {
        Self {
            width: 55.0,
            height: 85.0,
            min_margin: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintConfig {
    pub show_bleed: bool,
    pub show_cut_marks: bool,
    pub print_back_side: bool,
    pub page_format: PageFormat,
    pub orientation: Orientation,
    pub card: CardSpec,
    pub back_design: BackDesign,
    pub validation: ValidationPolicy,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            show_bleed: true,
            show_cut_marks: true,
            print_back_side: false,
            page_format: PageFormat::A4,
            orientation: Orientation::Portrait,
            card: CardSpec::default(),
            back_design: BackDesign::PerCard,
            validation: ValidationPolicy::default(),
        }
    }
}

impl PrintConfig {
    /// Page (width, height) in mm after applying orientation
    pub fn page_size_mm(&self) -> (f64, f64) {
        let (w, h) = self.page_format.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    pub fn bleed_mm(&self) -> f64 {
        if self.show_bleed {
            BLEED_MM
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_a4_portrait() {
        let config = PrintConfig::default();
        assert_eq!(config.page_size_mm(), (210.0, 297.0));
        assert_eq!(config.bleed_mm(), 2.0);
        assert!(config.show_cut_marks);
        assert!(!config.print_back_side);
    }

    #[test]
    fn test_landscape_swaps_dimensions() {
        let config = PrintConfig {
            orientation: Orientation::Landscape,
            ..Default::default()
        };
        assert_eq!(config.page_size_mm(), (297.0, 210.0));
    }

    #[test]
    fn test_bleed_disabled_is_zero() {
        let config = PrintConfig {
            show_bleed: false,
            ..Default::default()
        };
        assert_eq!(config.bleed_mm(), 0.0);
    }

    #[test]
    fn test_camel_case_json_with_defaults() {
        let config: PrintConfig = serde_json::from_str(
            r#"{"showCutMarks": false, "printBackSide": true, "pageFormat": "letter", "backDesign": "shared"}"#,
        )
        .unwrap();
        assert!(config.show_bleed);
        assert!(!config.show_cut_marks);
        assert!(config.print_back_side);
        assert_eq!(config.page_format, PageFormat::Letter);
        assert_eq!(config.back_design, BackDesign::Shared);
        assert_eq!(config.card, CardSpec::default());
    }

    #[test]
    fn test_custom_page_format() {
        let config: PrintConfig =
            serde_json::from_str(r#"{"pageFormat": {"custom": {"width": 100, "height": 150}}}"#).unwrap();
        assert_eq!(config.page_size_mm(), (100.0, 150.0));
    }
}
