// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrintHtml Print -- HTTP request dispatcher, print and scan job
// orchestration, and the multipart upload relay.  This crate bridges the
// core domain types defined in `printhtml-core` and the rendering / scanning
// boundaries in `printhtml-document`.

pub mod print_job;
pub mod query;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;
pub mod scan_job;
pub mod server;
pub mod services;
pub mod upload;

pub use print_job::{PrintEvent, PrintJob, PrintMode};
pub use registry::{JobLease, JobRegistry};
pub use router::{Route, Router};
pub use scan_job::{ScanJob, ScanState};
pub use server::PrintServer;
pub use services::JobServices;
pub use upload::{HttpUploader, UploadOutcome, UploadPayload, Uploader};
