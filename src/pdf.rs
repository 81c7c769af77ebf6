//! PDF Export
//!
//! Writes a composed document as a paginated PDF. Layout coordinates are
//! millimeters from the top-left; PDF space is points from the bottom-left.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::GenericImageView;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::debug;

use crate::artifacts::RasterImage;
use crate::geometry::{Rect, Segment};
use crate::pipeline::Document;
use crate::print::CUT_MARK_LINE_WIDTH_MM;

const POINTS_PER_MM: f64 = 72.0 / 25.4;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to decode artifact for embedding: {0}")]
    Decode(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn pt(mm: f64) -> Object {
    ((mm * POINTS_PER_MM) as f32).into()
}

/// Decode a raster and flatten any alpha onto white paper.
fn rgb_pixels(image: &RasterImage) -> Result<(u32, u32, Vec<u8>), ExportError> {
    let decoded = image::load_from_memory(image.bytes())?;
    let (width, height) = decoded.dimensions();
    let rgba = decoded.to_rgba8();

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        for channel in [r, g, b] {
            let blended = (u32::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }
    Ok((width, height, rgb))
}

struct ImageTable {
    by_digest: HashMap<String, (String, ObjectId)>,
}

impl ImageTable {
    fn new() -> Self {
        Self { by_digest: HashMap::new() }
    }

    /// Embed each distinct raster once and return its resource name
    fn name_for(&mut self, pdf: &mut PdfDocument, image: &RasterImage) -> Result<String, ExportError> {
        let digest = image.digest();
        if let Some((name, _)) = self.by_digest.get(&digest) {
            return Ok(name.clone());
        }

        let (width, height, pixels) = rgb_pixels(image)?;
        let id = pdf.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            pixels,
        ));
        let name = format!("Im{}", self.by_digest.len());
        debug!(name = %name, width, height, "Embedded raster");
        self.by_digest.insert(digest, (name.clone(), id));
        Ok(name)
    }

    fn resources(&self) -> lopdf::Dictionary {
        let mut xobjects = lopdf::Dictionary::new();
        for (name, id) in self.by_digest.values() {
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        dictionary! { "XObject" => xobjects }
    }
}

fn draw_image(ops: &mut Vec<Operation>, page_height: f64, rect: &Rect, name: &str) {
    let bottom = page_height - (rect.y + rect.height);
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![pt(rect.width), 0.into(), 0.into(), pt(rect.height), pt(rect.x), pt(bottom)],
    ));
    ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
    ops.push(Operation::new("Q", vec![]));
}

fn draw_cut_marks(ops: &mut Vec<Operation>, page_height: f64, marks: &[Segment]) {
    if marks.is_empty() {
        return;
    }
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("w", vec![pt(CUT_MARK_LINE_WIDTH_MM)]));
    ops.push(Operation::new("G", vec![0.into()]));
    for m in marks {
        ops.push(Operation::new("m", vec![pt(m.x1), pt(page_height - m.y1)]));
        ops.push(Operation::new("l", vec![pt(m.x2), pt(page_height - m.y2)]));
        ops.push(Operation::new("S", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));
}

/// Render the document to PDF bytes.
pub fn render_pdf(document: &Document) -> Result<Vec<u8>, ExportError> {
    let geometry = &document.geometry;
    let mut pdf = PdfDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let mut images = ImageTable::new();

    let mut contents = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let mut ops = vec![];
        for placement in &page.placements {
            let name = images.name_for(&mut pdf, &placement.image)?;
            draw_image(&mut ops, geometry.page_height, &placement.rect, &name);
        }
        draw_cut_marks(&mut ops, geometry.page_height, &page.cut_marks);
        contents.push(Content { operations: ops }.encode()?);
    }

    let resources_id = pdf.add_object(images.resources());

    let mut kids: Vec<Object> = vec![];
    for content in contents {
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    pdf.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "MediaBox" => vec![0.into(), 0.into(), pt(geometry.page_width), pt(geometry.page_height)],
        },
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);

    let creation_date = document.created_at.format("D:%Y%m%d%H%M%SZ").to_string();
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal("ID Cards"),
        "Creator" => Object::string_literal(format!("cardsheet-core {}", document.engine_version)),
        "CreationDate" => Object::string_literal(creation_date),
    });
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut buffer = Vec::new();
    pdf.save_to(&mut buffer)?;
    Ok(buffer)
}

pub fn write_pdf(document: &Document, path: &Path) -> Result<usize, ExportError> {
    let bytes = render_pdf(document)?;
    fs::write(path, &bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::RasterFormat;

    #[test]
    fn test_alpha_flattens_to_white() {
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        let raster = RasterImage::new(RasterFormat::Png, 2, 1, buf.into_inner());

        let (w, h, rgb) = rgb_pixels(&raster).unwrap();
        assert_eq!((w, h), (2, 1));
        assert_eq!(rgb, vec![255, 255, 255, 10, 20, 30]);
    }

    #[test]
    fn test_undecodable_raster_is_error() {
        let raster = RasterImage::new(RasterFormat::Png, 1, 1, vec![1, 2, 3]);
        assert!(matches!(rgb_pixels(&raster), Err(ExportError::Decode(_))));
    }
}
