// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload relay -- POSTs a scanned or rendered image to a remote URL as a
// `multipart/form-data` body.
//
// An upload succeeds only when the request reaches the server and it answers
// with a 2xx status.  Transport failures and non-2xx replies both come back
// as an unsuccessful `UploadOutcome` carrying a human-readable detail; the
// relay itself never returns `Err`.

use std::path::PathBuf;

use async_trait::async_trait;
use image::ImageFormat;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::{info, instrument, warn};

use printhtml_core::error::{PrintHtmlError, Result};

/// Multipart field the image is sent under.
pub const UPLOAD_FIELD: &str = "image";

/// File name announced for in-memory scans.
pub const SCAN_FILE_NAME: &str = "scan.png";

const FALLBACK_MIME: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// Payload / outcome
// ---------------------------------------------------------------------------

/// What to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPayload {
    /// Already-encoded bytes held in memory.
    Bytes {
        file_name: String,
        mime: String,
        data: Vec<u8>,
    },
    /// A file on disk, read at upload time.
    File(PathBuf),
}

impl UploadPayload {
    /// PNG bytes of a scan, sent as `scan.png`.
    pub fn scan_png(data: Vec<u8>) -> Self {
        Self::Bytes {
            file_name: SCAN_FILE_NAME.into(),
            mime: "image/png".into(),
            data,
        }
    }

    /// Resolve into `(file_name, mime, bytes)`.
    async fn into_parts(self) -> Result<(String, String, Vec<u8>)> {
        match self {
            Self::Bytes {
                file_name,
                mime,
                data,
            } => Ok((file_name, mime, data)),
            Self::File(path) => {
                let data = tokio::fs::read(&path).await.map_err(|e| {
                    PrintHtmlError::Upload(format!("failed to read {}: {e}", path.display()))
                })?;
                let file_name = path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or(SCAN_FILE_NAME)
                    .to_string();
                let mime = ImageFormat::from_path(&path)
                    .map(|f| f.to_mime_type())
                    .unwrap_or(FALLBACK_MIME)
                    .to_string();
                Ok((file_name, mime, data))
            }
        }
    }
}

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    /// Server status on success, error description otherwise.
    pub detail: String,
}

impl UploadOutcome {
    pub fn succeeded(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

/// Sends a payload to a destination URL.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, payload: UploadPayload, url: &str) -> UploadOutcome;
}

/// `reqwest`-backed multipart uploader.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
}

impl HttpUploader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(|e| PrintHtmlError::Upload(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("printhtml/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    #[instrument(skip(self, payload), fields(url = %url))]
    async fn upload(&self, payload: UploadPayload, url: &str) -> UploadOutcome {
        let (file_name, mime, data) = match payload.into_parts().await {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "upload payload unavailable");
                return UploadOutcome::failed(e.to_string());
            }
        };
        let size = data.len();

        let part = match Part::bytes(data).file_name(file_name).mime_str(&mime) {
            Ok(part) => part,
            Err(e) => return UploadOutcome::failed(error_chain(&e)),
        };
        let form = Form::new().part(UPLOAD_FIELD, part);

        match self.client.post(url).multipart(form).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    info!(%status, bytes = size, "upload complete");
                    UploadOutcome::succeeded(status.to_string())
                } else {
                    warn!(%status, "upload rejected");
                    UploadOutcome::failed(format!("server responded with {status}"))
                }
            }
            Err(e) => {
                let detail = error_chain(&e);
                warn!(error = %detail, "upload failed");
                UploadOutcome::failed(detail)
            }
        }
    }
}

/// `reqwest` errors keep the useful part (connection refused, DNS failure)
/// in their source chain; flatten it into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !detail.contains(&text) {
            detail.push_str(": ");
            detail.push_str(&text);
        }
        source = cause.source();
    }
    detail
}
