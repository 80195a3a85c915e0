// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! PDF text and embedded image extraction

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{file_label, ImageExtraction};
use crate::config::ExtractionConfig;
use crate::{ComparatorError, Result};

/// Page-tree depth after which parent lookups stop
const MAX_TREE_DEPTH: usize = 32;

/// Extract the full text of a PDF, pages concatenated in order
pub fn extract_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ComparatorError::Pdf(format!("PDF not found: {}", file_label(path))));
    }

    let bytes = std::fs::read(path)?;

    // pdf-extract panics on some malformed fonts and encodings
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(&bytes)
    }));

    let text = match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => return Err(ComparatorError::Pdf(format!("Text extraction failed: {}", e))),
        Err(_) => return Err(ComparatorError::Pdf("Text extraction panicked (malformed PDF)".to_string())),
    };

    debug!("Extracted {} chars from {:?}", text.len(), path);
    Ok(text)
}

/// Write every embedded raster image of a PDF into `output_dir`
///
/// Files are named `pg{page}_img{n}.{ext}`. Images that cannot be decoded are
/// recorded in [`ImageExtraction::skipped`] instead of failing the whole sheet.
pub fn extract_images(path: &Path, output_dir: &Path, config: &ExtractionConfig) -> Result<ImageExtraction> {
    if !path.exists() {
        return Err(ComparatorError::Pdf(format!("PDF not found: {}", file_label(path))));
    }

    let bytes = std::fs::read(path)?;
    let doc = Document::load_mem(&bytes)
        .map_err(|e| ComparatorError::Pdf(format!("Failed to load PDF: {}", e)))?;

    std::fs::create_dir_all(output_dir)?;

    let mut extraction = ImageExtraction::default();
    let mut seen_objects: HashSet<ObjectId> = HashSet::new();
    let mut seen_digests: HashSet<blake3::Hash> = HashSet::new();

    'pages: for (page_number, page_id) in doc.get_pages() {
        for (index, (object_id, stream)) in page_images(&doc, page_id).into_iter().enumerate() {
            if config.max_images_per_sheet > 0 && extraction.paths.len() >= config.max_images_per_sheet {
                info!("Image limit ({}) reached for {:?}", config.max_images_per_sheet, path);
                break 'pages;
            }

            if config.dedupe_images && !seen_objects.insert(object_id) {
                extraction.duplicates += 1;
                continue;
            }

            let decoded = match decode_image(&doc, stream) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("Skipping image {:?} on page {}: {}", object_id, page_number, e);
                    extraction.skipped.push(format!(
                        "Error extracting img xref {} pg {}. Skip. Err: {}",
                        object_id.0, page_number, e
                    ));
                    continue;
                }
            };

            if config.dedupe_images && !seen_digests.insert(decoded.digest()) {
                extraction.duplicates += 1;
                continue;
            }

            let target = output_dir.join(format!("pg{}_img{}.{}", page_number, index + 1, decoded.extension()));
            match decoded.write(&target) {
                Ok(()) => extraction.paths.push(target),
                Err(e) => {
                    warn!("Failed to save {:?}: {}", target, e);
                    extraction.skipped.push(format!("IOError saving image {}. Error: {}", target.display(), e));
                }
            }
        }
    }

    debug!(
        "Extracted {} images from {:?} ({} skipped, {} duplicates)",
        extraction.paths.len(),
        path,
        extraction.skipped.len(),
        extraction.duplicates
    );

    Ok(extraction)
}

/// An image ready to be written to disk
enum DecodedImage {
    /// Already a standalone file format, written byte for byte
    Encoded { bytes: Vec<u8>, extension: &'static str },
    /// Raw samples rebuilt into a bitmap
    Raster(DynamicImage),
}

impl DecodedImage {
    fn extension(&self) -> &'static str {
        match self {
            DecodedImage::Encoded { extension, .. } => extension,
            DecodedImage::Raster(_) => "png",
        }
    }

    fn digest(&self) -> blake3::Hash {
        match self {
            DecodedImage::Encoded { bytes, .. } => blake3::hash(bytes),
            DecodedImage::Raster(img) => blake3::hash(img.as_bytes()),
        }
    }

    fn write(&self, target: &Path) -> Result<()> {
        match self {
            DecodedImage::Encoded { bytes, .. } => std::fs::write(target, bytes)?,
            DecodedImage::Raster(img) => img.save_with_format(target, ImageFormat::Png)?,
        }
        Ok(())
    }
}

/// Image XObjects visible from a page, following inherited `Resources`
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<(ObjectId, &Stream)> {
    let mut found: Vec<(ObjectId, &Stream)> = Vec::new();
    let mut node = doc.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = node {
        if let Some(resources) = dict.get(b"Resources").ok().and_then(|o| resolve_dict(doc, o)) {
            if let Some(xobjects) = resources.get(b"XObject").ok().and_then(|o| resolve_dict(doc, o)) {
                for (_, value) in xobjects.iter() {
                    let Ok(id) = value.as_reference() else { continue };
                    if found.iter().any(|(seen, _)| *seen == id) {
                        continue;
                    }
                    if let Ok(Object::Stream(stream)) = doc.get_object(id) {
                        if is_image(stream) {
                            found.push((id, stream));
                        }
                    }
                }
            }
            break;
        }

        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }

    found
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key).ok()?.as_i64().ok().and_then(|v| u32::try_from(v).ok())
}

fn decode_image(doc: &Document, stream: &Stream) -> Result<DecodedImage> {
    let filters = filters(&stream.dict);

    match filters.as_slice() {
        [only] if only.as_slice() == b"DCTDecode" => Ok(DecodedImage::Encoded {
            bytes: stream.content.clone(),
            extension: "jpg",
        }),
        [only] if only.as_slice() == b"JPXDecode" => Ok(DecodedImage::Encoded {
            bytes: stream.content.clone(),
            extension: "jp2",
        }),
        [] => decode_raster(doc, stream, stream.content.clone()),
        [only] if only.as_slice() == b"FlateDecode" || only.as_slice() == b"LZWDecode" => {
            let data = stream
                .decompressed_content()
                .map_err(|e| ComparatorError::Pdf(format!("Failed to decompress image: {}", e)))?;
            decode_raster(doc, stream, data)
        }
        other => Err(ComparatorError::Pdf(format!(
            "Unsupported image encoding: {}",
            other
                .iter()
                .map(|f| String::from_utf8_lossy(f).to_string())
                .collect::<Vec<_>>()
                .join("+")
        ))),
    }
}

fn decode_raster(doc: &Document, stream: &Stream, data: Vec<u8>) -> Result<DecodedImage> {
    let dict = &stream.dict;
    let width = dict_u32(dict, b"Width").ok_or_else(|| ComparatorError::Pdf("Image has no Width".to_string()))?;
    let height = dict_u32(dict, b"Height").ok_or_else(|| ComparatorError::Pdf("Image has no Height".to_string()))?;
    let bits = dict_u32(dict, b"BitsPerComponent").unwrap_or(8);

    if bits != 8 {
        return Err(ComparatorError::Pdf(format!("Unsupported BitsPerComponent: {}", bits)));
    }

    let components = color_components(doc, dict)
        .ok_or_else(|| ComparatorError::Pdf("Unsupported color space".to_string()))?;

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(components as usize))
        .ok_or_else(|| ComparatorError::Pdf("Image dimensions overflow".to_string()))?;
    if data.len() < expected {
        return Err(ComparatorError::Pdf(format!(
            "Image data too short: {} bytes, expected {}",
            data.len(),
            expected
        )));
    }

    let mut samples = data;
    samples.truncate(expected);

    let too_small = || ComparatorError::Pdf("Image buffer does not match dimensions".to_string());
    let image = match components {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, samples).ok_or_else(too_small)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, samples).ok_or_else(too_small)?),
        4 => DynamicImage::ImageRgb8(
            RgbImage::from_raw(width, height, cmyk_to_rgb(&samples)).ok_or_else(too_small)?,
        ),
        n => return Err(ComparatorError::Pdf(format!("Unsupported component count: {}", n))),
    };

    Ok(DecodedImage::Raster(image))
}

fn color_components(doc: &Document, dict: &Dictionary) -> Option<u32> {
    let space = match dict.get(b"ColorSpace").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };

    match space {
        Object::Name(name) => components_for_name(name),
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            if family == b"ICCBased" {
                let id = items.get(1)?.as_reference().ok()?;
                let profile = doc.get_object(id).ok()?.as_stream().ok()?;
                dict_u32(&profile.dict, b"N")
            } else {
                components_for_name(family)
            }
        }
        _ => None,
    }
}

fn components_for_name(name: &[u8]) -> Option<u32> {
    match name {
        b"DeviceGray" | b"CalGray" => Some(1),
        b"DeviceRGB" | b"CalRGB" => Some(3),
        b"DeviceCMYK" => Some(4),
        _ => None,
    }
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u32::from(px[3]);
            let channel = |v: u8| ((255 - u32::from(v)) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}
