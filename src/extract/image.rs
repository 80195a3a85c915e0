// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Turn extracted image files into inline request parts

use image::GenericImageView;
use std::path::Path;
use tracing::debug;

use crate::gemini::Part;
use crate::Result;

/// Load an image, shrink it to `max_dimension` on its longest side, and encode it as JPEG
///
/// Images already within bounds are still re-encoded so the model only ever
/// receives one format.
pub fn prepare_image(path: &Path, max_dimension: u32) -> Result<Part> {
    let img = image::open(path)?;

    let img = if img.width() > max_dimension || img.height() > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    rgb.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

    debug!("Prepared {:?}: {}x{}, {} bytes", path, rgb.width(), rgb.height(), buffer.len());
    Ok(Part::image("image/jpeg", &buffer))
}
