// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan job lifecycle.
//
//   Idle -> Scanning -> [Saving] -> [Uploading] -> Finished
//
// `ScanJob` is a pure state machine: each transition consumes the result of
// the previous step and returns the next `ScanAction` to perform.  The I/O
// lives in `ScanJob::run`, which drives the machine against a `ScanDevice`
// and an `Uploader`.  A job finishes exactly once; its report is handed out
// with the `Notify` action and never again.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use printhtml_core::types::{ScanJobSpec, ScanReport, ScanResult};
use printhtml_document::image::{PageImage, ensure_parent_dir};
use printhtml_document::ScanDevice;

use crate::upload::{UploadOutcome, UploadPayload, Uploader};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

const MSG_SCAN_FAILED: &str = "Scanning failed.";
const MSG_UPLOADED: &str = "Scan and upload successful.";
const MSG_SAVED: &str = "Scan successful and image saved.";
const MSG_NO_OUTPUT: &str = "Scan successful (no output specified).";

// ---------------------------------------------------------------------------
// States and actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Saving,
    Uploading,
    Finished,
}

/// The next thing the driver must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanAction {
    /// Acquire an image from the named scanner.
    Acquire(String),
    /// Write the acquired image to this path.
    Save(PathBuf),
    /// Upload the acquired image to this URL.
    Upload(String),
    /// Deliver the terminal report.
    Notify(ScanReport),
    /// The transition did not apply in the current state.
    Ignored,
}

/// Result of writing the scanned image to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The output directory could not be created. Terminal.
    DirectoryFailed,
    /// The write itself failed. Logged, the job carries on.
    WriteFailed(String),
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ScanJob {
    spec: ScanJobSpec,
    state: ScanState,
    result: ScanResult,
    history: Vec<ScanState>,
    notified: bool,
}

impl ScanJob {
    pub fn new(spec: ScanJobSpec) -> Self {
        Self {
            spec,
            state: ScanState::Idle,
            result: ScanResult::default(),
            history: vec![ScanState::Idle],
            notified: false,
        }
    }

    pub fn spec(&self) -> &ScanJobSpec {
        &self.spec
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn result(&self) -> &ScanResult {
        &self.result
    }

    /// Every state the job has been in, in order.
    pub fn history(&self) -> &[ScanState] {
        &self.history
    }

    /// Idle -> Scanning.
    pub fn start(&mut self) -> ScanAction {
        if self.state != ScanState::Idle {
            return self.ignored("start");
        }
        self.enter(ScanState::Scanning);
        ScanAction::Acquire(self.spec.scanner.clone())
    }

    /// Scanning -> Saving | Uploading | Finished.
    pub fn on_acquired(&mut self, ok: bool) -> ScanAction {
        if self.state != ScanState::Scanning {
            return self.ignored("on_acquired");
        }
        if !ok {
            return self.finish(false, MSG_SCAN_FAILED.into());
        }
        match self.spec.output_file.clone() {
            Some(path) => {
                self.enter(ScanState::Saving);
                ScanAction::Save(path)
            }
            None => self.after_save(),
        }
    }

    /// Saving -> Uploading | Finished.
    pub fn on_saved(&mut self, outcome: SaveOutcome) -> ScanAction {
        if self.state != ScanState::Saving {
            return self.ignored("on_saved");
        }
        match outcome {
            SaveOutcome::Saved => {
                self.result.saved = true;
                self.after_save()
            }
            SaveOutcome::DirectoryFailed => {
                let path = self.output_display();
                self.finish(
                    false,
                    format!("Failed to create directory for output file: {path}"),
                )
            }
            SaveOutcome::WriteFailed(detail) => {
                warn!(path = %self.output_display(), error = %detail, "failed to save scanned image");
                self.after_save()
            }
        }
    }

    /// Uploading -> Finished.
    pub fn on_uploaded(&mut self, outcome: UploadOutcome) -> ScanAction {
        if self.state != ScanState::Uploading {
            return self.ignored("on_uploaded");
        }
        if outcome.success {
            self.result.uploaded = true;
            self.finish(true, MSG_UPLOADED.into())
        } else {
            self.finish(
                false,
                format!("Scan successful, but upload failed: {}", outcome.detail),
            )
        }
    }

    fn after_save(&mut self) -> ScanAction {
        if let Some(url) = self.spec.upload_url.clone() {
            self.enter(ScanState::Uploading);
            return ScanAction::Upload(url);
        }
        let message = match &self.spec.output_file {
            None => MSG_NO_OUTPUT.to_string(),
            Some(_) if self.result.saved => MSG_SAVED.to_string(),
            Some(path) => format!(
                "Scan successful, but the image could not be saved to {}.",
                path.display()
            ),
        };
        self.finish(true, message)
    }

    fn finish(&mut self, success: bool, message: String) -> ScanAction {
        if self.notified {
            return self.ignored("finish");
        }
        self.result.success = success;
        self.result.message = message;
        self.enter(ScanState::Finished);
        self.notified = true;
        ScanAction::Notify(ScanReport::new(&self.spec, &self.result))
    }

    fn enter(&mut self, next: ScanState) {
        debug!(from = ?self.state, to = ?next, "scan state transition");
        self.state = next;
        self.history.push(next);
    }

    fn ignored(&self, transition: &str) -> ScanAction {
        warn!(state = ?self.state, transition, "scan transition ignored");
        ScanAction::Ignored
    }

    fn output_display(&self) -> String {
        self.spec
            .output_file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    // -- Driver ---------------------------------------------------------------

    /// Run the job to completion and return its terminal report.
    #[instrument(skip_all, fields(scanner = %self.spec.scanner))]
    pub async fn run(mut self, device: &dyn ScanDevice, uploader: &dyn Uploader) -> ScanReport {
        let mut page: Option<PageImage> = None;
        let mut action = self.start();

        loop {
            action = match action {
                ScanAction::Acquire(scanner) => match device.acquire(&scanner).await {
                    Ok(image) => {
                        page = Some(image);
                        self.on_acquired(true)
                    }
                    Err(e) => {
                        warn!(error = %e, "scan device failed");
                        self.on_acquired(false)
                    }
                },
                ScanAction::Save(path) => {
                    let outcome = save_page(page.clone(), path).await;
                    self.on_saved(outcome)
                }
                ScanAction::Upload(url) => {
                    let outcome = match page.as_ref().map(PageImage::to_png_bytes) {
                        Some(Ok(bytes)) => uploader.upload(UploadPayload::scan_png(bytes), &url).await,
                        Some(Err(e)) => UploadOutcome::failed(e.to_string()),
                        None => UploadOutcome::failed("no image acquired"),
                    };
                    self.on_uploaded(outcome)
                }
                ScanAction::Notify(report) => {
                    info!(
                        status = ?report.status,
                        message = %report.message,
                        "scan job finished"
                    );
                    return report;
                }
                ScanAction::Ignored => {
                    // Unreachable while the driver follows its own actions.
                    return ScanReport::new(&self.spec, &self.result);
                }
            };
        }
    }
}

/// Create the parent directory, then write `page` to `path` off the runtime.
async fn save_page(page: Option<PageImage>, path: PathBuf) -> SaveOutcome {
    let Some(page) = page else {
        return SaveOutcome::WriteFailed("no image acquired".into());
    };
    let joined = tokio::task::spawn_blocking(move || save_blocking(&page, &path)).await;
    match joined {
        Ok(outcome) => outcome,
        Err(e) => SaveOutcome::WriteFailed(format!("save task: {e}")),
    }
}

fn save_blocking(page: &PageImage, path: &Path) -> SaveOutcome {
    if let Err(e) = ensure_parent_dir(path) {
        warn!(path = %path.display(), error = %e, "cannot create output directory");
        return SaveOutcome::DirectoryFailed;
    }
    match page.save(path) {
        Ok(()) => SaveOutcome::Saved,
        Err(e) => SaveOutcome::WriteFailed(e.to_string()),
    }
}
