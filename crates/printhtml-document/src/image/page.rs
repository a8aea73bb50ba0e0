// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page images -- the in-memory result of a scan or a rasterized render, with
// PNG encoding and on-disk persistence.

use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use printhtml_core::error::PrintHtmlError;
use printhtml_core::{Orientation, Paper};
use tracing::{debug, instrument};

/// Paper size used when a named size is not recognised.
const FALLBACK_PAGE_MM: (f64, f64) = (210.0, 297.0);

const MM_PER_INCH: f64 = 25.4;

/// Largest page, in pixels, `blank_page` will allocate.
pub const MAX_PAGE_PIXELS: u64 = 100_000_000;

/// A single page image.
///
/// Cheap to clone relative to the I/O it feeds; scans are small.
#[derive(Debug, Clone)]
pub struct PageImage {
    image: DynamicImage,
}

impl PageImage {
    // -- Construction ---------------------------------------------------------

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// A uniformly coloured RGB image.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let buffer = RgbImage::from_pixel(width, height, Rgb(rgb));
        Self {
            image: DynamicImage::ImageRgb8(buffer),
        }
    }

    /// A white page sized to `paper` at `dpi`, swapped for landscape.
    ///
    /// Fails without allocating when the page exceeds [`MAX_PAGE_PIXELS`].
    pub fn blank_page(
        paper: &Paper,
        orientation: Orientation,
        dpi: u32,
    ) -> Result<Self, PrintHtmlError> {
        let (w_mm, h_mm) = paper.dimensions_mm().unwrap_or(FALLBACK_PAGE_MM);
        let (w_mm, h_mm) = match orientation {
            Orientation::Portrait => (w_mm, h_mm),
            Orientation::Landscape => (h_mm, w_mm),
        };
        let to_px = |mm: f64| ((mm / MM_PER_INCH) * f64::from(dpi)).round().max(1.0);
        let (width, height) = (to_px(w_mm), to_px(h_mm));
        if width * height > MAX_PAGE_PIXELS as f64 {
            return Err(PrintHtmlError::ImageError(format!(
                "page of {width}x{height} px at {dpi} dpi exceeds the {MAX_PAGE_PIXELS} pixel limit"
            )));
        }
        Ok(Self::solid(width as u32, height as u32, [255, 255, 255]))
    }

    /// Decode from raw encoded bytes (PNG, JPEG, ...).
    pub fn from_bytes(data: &[u8]) -> Result<Self, PrintHtmlError> {
        let image = image::load_from_memory(data).map_err(|err| {
            PrintHtmlError::ImageError(format!("failed to decode image: {err}"))
        })?;
        Ok(Self { image })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PrintHtmlError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| PrintHtmlError::ImageError(format!("PNG encoding failed: {err}")))?;
        Ok(buffer)
    }

    /// Write the image to `path`.
    ///
    /// The format follows the file extension; paths without a recognised
    /// extension are written as PNG. Parent directories must already exist,
    /// see [`ensure_parent_dir`].
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), PrintHtmlError> {
        let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
        self.image.save_with_format(path, format).map_err(|err| {
            PrintHtmlError::ImageError(format!(
                "failed to save image to {}: {err}",
                path.display()
            ))
        })?;
        debug!(?format, "page image written");
        Ok(())
    }
}

/// Create the directory that will contain `path`, if any.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
