// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborators shared by every job the dispatcher starts.

use std::sync::Arc;
use std::time::Duration;

use printhtml_core::config::ServerConfig;
use printhtml_core::error::Result;
use printhtml_document::{DryRunEngine, PrintEngine, ScanDevice, SimulatedScanner};

use crate::upload::{HttpUploader, Uploader};

/// Scan device, rendering engine and upload client.
///
/// All three are stateless with respect to individual jobs and are shared
/// through `Arc`.
#[derive(Clone)]
pub struct JobServices {
    pub scanner: Arc<dyn ScanDevice>,
    pub engine: Arc<dyn PrintEngine>,
    pub uploader: Arc<dyn Uploader>,
}

impl JobServices {
    pub fn new(
        scanner: Arc<dyn ScanDevice>,
        engine: Arc<dyn PrintEngine>,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        Self {
            scanner,
            engine,
            uploader,
        }
    }

    /// Simulated scanner, dry-run engine and a real HTTP uploader.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            scanner: Arc::new(SimulatedScanner::new(Duration::from_millis(
                config.scan_delay_ms,
            ))),
            engine: Arc::new(DryRunEngine),
            uploader: Arc::new(HttpUploader::new()?),
        })
    }
}

impl std::fmt::Debug for JobServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobServices").finish_non_exhaustive()
    }
}
