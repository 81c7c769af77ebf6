//! Artifact Validation - Rule/Policy Separation
//!
//! Rules inspect an acquired raster and produce structured violations.
//! Errors make the artifact unavailable; warnings are only recorded.

use serde::{Deserialize, Serialize};

use crate::artifacts::{CardId, Face, RasterImage};
use crate::print::CardSpec;

const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub card_id: CardId,
    pub face: Face,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations.iter().filter(|v| v.severity == ViolationSeverity::Warning)
    }
}

/// Thresholds for the warning rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationPolicy {
    pub aspect_tolerance: f64,
    pub min_dpi: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            aspect_tolerance: 0.02,
            min_dpi: 150.0,
        }
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, image: &RasterImage, card: &CardSpec, policy: &ValidationPolicy) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

/// A blank capture cannot be placed.
pub struct EmptyImageRule;

impl ValidationRule for EmptyImageRule {
    fn name(&self) -> &'static str { "empty_image" }

    fn validate(&self, image: &RasterImage, _card: &CardSpec, _policy: &ValidationPolicy) -> Vec<ValidationViolation> {
        if image.bytes().is_empty() || image.width_px() == 0 || image.height_px() == 0 {
            vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Error,
                message: "Artifact has no pixel data".to_string(),
                expected: Some("non-empty raster".to_string()),
                actual: Some(format!(
                    "{} bytes, {}x{}px",
                    image.bytes().len(),
                    image.width_px(),
                    image.height_px()
                )),
            }]
        } else {
            vec![]
        }
    }
}

pub struct AspectRatioRule;

impl ValidationRule for AspectRatioRule {
    fn name(&self) -> &'static str { "aspect_ratio" }

    fn validate(&self, image: &RasterImage, card: &CardSpec, policy: &ValidationPolicy) -> Vec<ValidationViolation> {
        if image.height_px() == 0 {
            return vec![];
        }

        let expected = card.width / card.height;
        let actual = image.width_px() as f64 / image.height_px() as f64;

        if (expected - actual).abs() > policy.aspect_tolerance {
            vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message: "Artifact will be stretched to the card size".to_string(),
                expected: Some(format!("{:.3}", expected)),
                actual: Some(format!("{:.3}", actual)),
            }]
        } else {
            vec![]
        }
    }
}

pub struct ResolutionRule;

impl ValidationRule for ResolutionRule {
    fn name(&self) -> &'static str { "resolution" }

    fn validate(&self, image: &RasterImage, card: &CardSpec, policy: &ValidationPolicy) -> Vec<ValidationViolation> {
        if image.width_px() == 0 || image.height_px() == 0 {
            return vec![];
        }

        let dpi_x = image.width_px() as f64 / (card.width / MM_PER_INCH);
        let dpi_y = image.height_px() as f64 / (card.height / MM_PER_INCH);
        let dpi = dpi_x.min(dpi_y);

        if dpi < policy.min_dpi {
            vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message: "Resolution too low for print".to_string(),
                expected: Some(format!("{:.0} dpi minimum", policy.min_dpi)),
                actual: Some(format!("{:.0} dpi", dpi)),
            }]
        } else {
            vec![]
        }
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
    policy: ValidationPolicy,
}

impl Validator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            rules: vec![
                Box::new(EmptyImageRule),
                Box::new(AspectRatioRule),
                Box::new(ResolutionRule),
            ],
            policy,
        }
    }

    pub fn validate(&self, card_id: &CardId, face: Face, image: &RasterImage, card: &CardSpec) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(image, card, &self.policy))
            .collect();

        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);

        ValidationResult {
            valid,
            card_id: card_id.clone(),
            face,
            violations,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::RasterFormat;

    fn image(w: u32, h: u32, bytes: usize) -> RasterImage {
        RasterImage::new(RasterFormat::Png, w, h, vec![0u8; bytes])
    }

    #[test]
    fn test_well_formed_artifact_passes() {
        let result = Validator::default().validate(&CardId::from("e1"), Face::Front, &image(650, 1004, 16), &CardSpec::default());
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_empty_payload_is_error() {
        let result = Validator::default().validate(&CardId::from("e1"), Face::Front, &image(650, 1004, 0), &CardSpec::default());
        assert!(!result.valid);
        assert!(result.has_errors());
        assert_eq!(result.violations[0].rule, "empty_image");
    }

    #[test]
    fn test_zero_dimension_is_error() {
        let result = Validator::default().validate(&CardId::from("e1"), Face::Back, &image(0, 1004, 16), &CardSpec::default());
        assert!(!result.valid);
    }

    #[test]
    fn test_wrong_aspect_is_warning_only() {
        let result = Validator::default().validate(&CardId::from("e1"), Face::Front, &image(1004, 650, 16), &CardSpec::default());
        assert!(result.valid);
        assert_eq!(result.warnings().count(), 1);
        assert_eq!(result.violations[0].rule, "aspect_ratio");
    }

    #[test]
    fn test_low_resolution_is_warning() {
        // 55px across 55mm is ~25 dpi
        let result = Validator::default().validate(&CardId::from("e1"), Face::Front, &image(55, 85, 16), &CardSpec::default());
        assert!(result.valid);
        assert!(result.violations.iter().any(|v| v.rule == "resolution"));
    }
}
