//! Artifact Provider
//!
//! Rasterized card faces are produced outside the engine. The engine asks
//! for a face by card identity and treats the answer as an opaque encoded
//! bitmap with declared pixel dimensions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use image::GenericImageView;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::hashing::sha256_hex;
use crate::print::{BackDesign, PrintConfig};
use crate::validation::{ValidationViolation, Validator};

/// Stable key of one data record (an employee)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Front,
    Back,
}

impl Face {
    pub fn as_str(&self) -> &'static str {
        match self {
            Face::Front => "front",
            Face::Back => "back",
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No {face} artifact for card {card_id}")]
    NotFound { card_id: CardId, face: Face },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Undecodable raster: {0}")]
    Decode(String),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Rejected by validation: {0}")]
    Rejected(String),
}

/// Encoded bitmap plus its pixel size. Cloning shares the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    format: RasterFormat,
    width_px: u32,
    height_px: u32,
    bytes: Arc<[u8]>,
}

impl RasterImage {
    pub fn new(format: RasterFormat, width_px: u32, height_px: u32, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            width_px,
            height_px,
            bytes: bytes.into(),
        }
    }

    /// Sniff the format and read the pixel size from an encoded PNG or JPEG.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, ArtifactError> {
        let format = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => RasterFormat::Png,
            Ok(image::ImageFormat::Jpeg) => RasterFormat::Jpeg,
            Ok(other) => return Err(ArtifactError::Decode(format!("unsupported format {:?}", other))),
            Err(e) => return Err(ArtifactError::Decode(e.to_string())),
        };
        let (width_px, height_px) = image::load_from_memory(&bytes)
            .map_err(|e| ArtifactError::Decode(e.to_string()))?
            .dimensions();
        Ok(Self::new(format, width_px, height_px, bytes))
    }

    /// Accept `data:image/png;base64,...` as produced by browser canvas capture.
    pub fn from_data_url(url: &str) -> Result<Self, ArtifactError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ArtifactError::InvalidDataUrl("missing data: scheme".into()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ArtifactError::InvalidDataUrl("missing payload".into()))?;
        if !meta.ends_with(";base64") {
            return Err(ArtifactError::InvalidDataUrl("only base64 payloads are supported".into()));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ArtifactError::InvalidDataUrl(e.to_string()))?;
        Self::from_encoded(bytes)
    }

    pub fn format(&self) -> RasterFormat { self.format }
    pub fn width_px(&self) -> u32 { self.width_px }
    pub fn height_px(&self) -> u32 { self.height_px }
    pub fn bytes(&self) -> &[u8] { &self.bytes }

    /// Content digest, used to embed identical rasters once
    pub fn digest(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("format", &self.format)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Renders a card identity into a raster for the requested face.
pub trait ArtifactProvider: Send + Sync {
    fn render(&self, card_id: &CardId, face: Face) -> Result<RasterImage, ArtifactError>;

    fn front(&self, card_id: &CardId) -> Result<RasterImage, ArtifactError> {
        self.render(card_id, Face::Front)
    }

    fn back(&self, card_id: &CardId) -> Result<RasterImage, ArtifactError> {
        self.render(card_id, Face::Back)
    }
}

/// Pre-rendered rasters held in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    images: HashMap<(CardId, Face), RasterImage>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, card_id: impl Into<CardId>, face: Face, image: RasterImage) {
        self.images.insert((card_id.into(), face), image);
    }

    pub fn with(mut self, card_id: impl Into<CardId>, face: Face, image: RasterImage) -> Self {
        self.insert(card_id, face, image);
        self
    }
}

impl ArtifactProvider for MemoryProvider {
    fn render(&self, card_id: &CardId, face: Face) -> Result<RasterImage, ArtifactError> {
        self.images
            .get(&(card_id.clone(), face))
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound { card_id: card_id.clone(), face })
    }
}

/// Rasters exported to a directory as `<id>.<face>.{png,jpg,jpeg}`
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
}

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, card_id: &CardId, face: Face) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}.{}", card_id, face, ext)))
            .find(|p| p.is_file())
    }
}

impl ArtifactProvider for DirectoryProvider {
    fn render(&self, card_id: &CardId, face: Face) -> Result<RasterImage, ArtifactError> {
        let path = self
            .locate(card_id, face)
            .ok_or_else(|| ArtifactError::NotFound { card_id: card_id.clone(), face })?;
        let bytes = fs::read(&path).map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
        RasterImage::from_encoded(bytes)
    }
}

/// A warning raised while validating an acquired artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactWarning {
    pub card_id: CardId,
    pub face: Face,
    pub violation: ValidationViolation,
}

/// Per-build memo of acquired artifacts. Each (identity, face) is requested
/// from the provider at most once; failures are remembered as `None`.
pub struct ArtifactCache<'p> {
    provider: &'p dyn ArtifactProvider,
    config: &'p PrintConfig,
    validator: Validator,
    entries: HashMap<(CardId, Face), Option<RasterImage>>,
    shared_back: Option<CardId>,
    warnings: Vec<ArtifactWarning>,
}

impl<'p> ArtifactCache<'p> {
    pub fn new(provider: &'p dyn ArtifactProvider, config: &'p PrintConfig) -> Self {
        Self {
            provider,
            config,
            validator: Validator::new(config.validation),
            entries: HashMap::new(),
            shared_back: None,
            warnings: vec![],
        }
    }

    pub fn front(&mut self, card_id: &CardId) -> Option<RasterImage> {
        self.get(card_id.clone(), Face::Front)
    }

    pub fn back(&mut self, card_id: &CardId) -> Option<RasterImage> {
        let key = self.back_key(card_id);
        self.get(key, Face::Back)
    }

    /// Acquire every distinct identity's face concurrently. Results land in
    /// the cache in first-occurrence order, so placement stays deterministic.
    ///
    /// Backs are only fetched for identities whose front is already cached
    /// and available, i.e. cards that will actually be placed. The shared
    /// back key is resolved locally and left unbound, so the first placed
    /// card still decides it.
    pub fn prefetch<'a>(&mut self, card_ids: impl IntoIterator<Item = &'a CardId>, face: Face) {
        let mut seen = HashSet::new();
        let mut pending = vec![];
        let mut shared = self.shared_back.clone();
        for id in card_ids {
            let key = match face {
                Face::Front => id.clone(),
                Face::Back => {
                    if !self.has_front(id) {
                        continue;
                    }
                    match self.config.back_design {
                        BackDesign::PerCard => id.clone(),
                        BackDesign::Shared => shared.get_or_insert_with(|| id.clone()).clone(),
                    }
                }
            };
            if !self.entries.contains_key(&(key.clone(), face)) && seen.insert(key.clone()) {
                pending.push(key);
            }
        }
        if pending.is_empty() {
            return;
        }

        debug!("Prefetching {} {} artifacts", pending.len(), face);
        let provider = self.provider;
        let acquired: Vec<_> = pending
            .into_par_iter()
            .map(|id| {
                let result = provider.render(&id, face);
                (id, result)
            })
            .collect();

        for (id, result) in acquired {
            let entry = self.admit(&id, face, result);
            self.entries.insert((id, face), entry);
        }
    }

    pub fn warnings(&self) -> &[ArtifactWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ArtifactWarning> {
        self.warnings
    }

    fn has_front(&self, card_id: &CardId) -> bool {
        matches!(self.entries.get(&(card_id.clone(), Face::Front)), Some(Some(_)))
    }

    fn back_key(&mut self, card_id: &CardId) -> CardId {
        match self.config.back_design {
            BackDesign::PerCard => card_id.clone(),
            BackDesign::Shared => self.shared_back.get_or_insert_with(|| card_id.clone()).clone(),
        }
    }

    fn get(&mut self, card_id: CardId, face: Face) -> Option<RasterImage> {
        if let Some(entry) = self.entries.get(&(card_id.clone(), face)) {
            return entry.clone();
        }
        let result = self.provider.render(&card_id, face);
        let entry = self.admit(&card_id, face, result);
        self.entries.insert((card_id, face), entry.clone());
        entry
    }

    fn admit(&mut self, card_id: &CardId, face: Face, result: Result<RasterImage, ArtifactError>) -> Option<RasterImage> {
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                warn!(card_id = %card_id, face = %face, error = %e, "Artifact unavailable");
                return None;
            }
        };

        let validation = self.validator.validate(card_id, face, &image, &self.config.card);
        if !validation.valid {
            let messages: Vec<_> = validation
                .violations
                .iter()
                .map(|v| format!("{}: {}", v.rule, v.message))
                .collect();
            let e = ArtifactError::Rejected(messages.join("; "));
            warn!(card_id = %card_id, face = %face, error = %e, "Artifact unavailable");
            return None;
        }

        for violation in validation.warnings() {
            debug!(card_id = %card_id, face = %face, rule = %violation.rule, "Artifact warning");
            self.warnings.push(ArtifactWarning {
                card_id: card_id.clone(),
                face,
                violation: violation.clone(),
            });
        }
        Some(image)
    }
}
