// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for PrintHtml.

use thiserror::Error;

/// Top-level error type for all PrintHtml operations.
#[derive(Debug, Error)]
pub enum PrintHtmlError {
    // -- Server / protocol --
    #[error("print server error: {0}")]
    Server(String),

    #[error("malformed request: {0}")]
    Protocol(String),

    // -- Jobs --
    #[error("scan failed: {0}")]
    Scan(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration / invocation --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintHtmlError>;
