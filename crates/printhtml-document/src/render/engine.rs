// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering engine boundary.
//
// The HTML layout engine that actually loads and paginates pages lives
// outside this workspace.  `PrintEngine` is the contract the dispatcher
// depends on; `DryRunEngine` implements it without a browser: printing only
// reports what would have been printed, and rasterizing writes a blank page
// of the requested paper size.

use std::path::Path;

use async_trait::async_trait;
use printhtml_core::error::{PrintHtmlError, Result};
use printhtml_core::PrintJobSpec;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::image::page::{PageImage, ensure_parent_dir};

/// Resolution of rasterized pages written by [`DryRunEngine`].
const RASTER_DPI: u32 = 72;

/// URL schemes the dry-run engine accepts.
const SUPPORTED_SCHEMES: &[&str] = &["http://", "https://", "file://"];

/// Per-URL result of a print run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrintOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl PrintOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders URLs to a printer or to an image file.
#[async_trait]
pub trait PrintEngine: Send + Sync {
    /// Render each URL in order and send it to `spec.printer`.
    async fn print(&self, spec: &PrintJobSpec) -> PrintOutcome;

    /// Render the URLs to a single page image at `output`.
    async fn rasterize(&self, spec: &PrintJobSpec, output: &Path) -> Result<()>;
}

/// Engine that never touches a printer.
#[derive(Debug, Clone, Default)]
pub struct DryRunEngine;

impl DryRunEngine {
    fn is_supported(url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        SUPPORTED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
    }
}

#[async_trait]
impl PrintEngine for DryRunEngine {
    #[instrument(
        skip(self, spec),
        fields(printer = %spec.printer, urls = spec.urls.len(), test_mode = spec.test_mode)
    )]
    async fn print(&self, spec: &PrintJobSpec) -> PrintOutcome {
        let mut outcome = PrintOutcome::default();
        for url in &spec.urls {
            if Self::is_supported(url) {
                let pages = if spec.page_range.is_all() {
                    "all".to_string()
                } else {
                    format!("{}-{}", spec.page_range.from, spec.page_range.to)
                };
                info!(
                    url = %url,
                    paper = %spec.paper.name,
                    orientation = spec.orientation.as_str(),
                    pages = %pages,
                    "{}",
                    if spec.test_mode { "test run, not printed" } else { "would print" }
                );
                outcome.succeeded.push(url.clone());
            } else {
                warn!(url = %url, "unsupported URL scheme");
                outcome.failed.push(url.clone());
            }
        }
        outcome
    }

    #[instrument(skip(self, spec), fields(output = %output.display()))]
    async fn rasterize(&self, spec: &PrintJobSpec, output: &Path) -> Result<()> {
        let Some(url) = spec.urls.first() else {
            return Err(PrintHtmlError::Render("no URL to render".into()));
        };
        if !Self::is_supported(url) {
            return Err(PrintHtmlError::Render(format!("unsupported URL: {url}")));
        }

        let page = PageImage::blank_page(&spec.paper, spec.orientation, RASTER_DPI)
            .map_err(|e| PrintHtmlError::Render(e.to_string()))?;
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || {
            ensure_parent_dir(&output)?;
            page.save(&output)
        })
        .await
        .map_err(|e| PrintHtmlError::Render(format!("rasterize task: {e}")))??;

        info!(url = %url, "page rasterized");
        Ok(())
    }
}
