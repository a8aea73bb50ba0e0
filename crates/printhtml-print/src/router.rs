// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request routing.
//
//   GET /print?url=...            -> print job, 200 + echo
//   GET /scan                     -> device scan job, 202 + acknowledgement
//   GET /scan?url=...             -> render-to-image job, 200 + echo
//   anything else                 -> 404
//
// Routing never waits on a job: each job is moved into its own task holding
// a `JobLease`, and the router returns as soon as the response is written
// (or, for deferred printing, handed to the job).

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use printhtml_core::config::{PrintResponseMode, ServerConfig};
use printhtml_core::error::Result;
use printhtml_core::types::{
    JobId, JobKind, Margins, PageRange, Paper, Orientation, PrintJobSpec, ScanJobSpec,
};

use crate::print_job::{PrintEvent, PrintJob, PrintMode};
use crate::query::QueryParams;
use crate::registry::{ConnectionGuard, JobLease, JobRegistry};
use crate::request::Request;
use crate::response::{HttpResponse, ResponseSink, Status, send_response};
use crate::scan_job::ScanJob;
use crate::services::JobServices;
use crate::upload::{UploadPayload, Uploader};

// ---------------------------------------------------------------------------
// Endpoints and parameter names
// ---------------------------------------------------------------------------

const PRINT_ENDPOINT: &str = "/print";
const SCAN_ENDPOINT: &str = "/scan";

const DEFAULT_PRINTER: &str = "Default";
const DEFAULT_SCANNER: &str = "Default";
const DEFAULT_PAPER: &str = "A4";

/// `(long name, short alias)` for the print layout parameters.
const PRINTER: (&str, &str) = ("printer", "p");
const LEFT: (&str, &str) = ("left", "l");
const TOP: (&str, &str) = ("top", "t");
const RIGHT: (&str, &str) = ("right", "r");
const BOTTOM: (&str, &str) = ("bottom", "b");
const PAPER: (&str, &str) = ("paper", "a");
const ORIENTATION: (&str, &str) = ("orientation", "o");

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Print,
    /// `/scan` without `url`: acquire from a scan device.
    ScanDevice,
    /// `/scan` with `url`: render the page to an image file.
    ScanRender,
    NotFound,
}

pub fn classify(request: &Request) -> Route {
    let has_url = request.param("url").is_some();
    match request.endpoint.as_str() {
        PRINT_ENDPOINT if has_url => Route::Print,
        SCAN_ENDPOINT if has_url => Route::ScanRender,
        SCAN_ENDPOINT => Route::ScanDevice,
        _ => Route::NotFound,
    }
}

// ---------------------------------------------------------------------------
// Parameter conversion
// ---------------------------------------------------------------------------

fn lookup<'a>(params: &'a QueryParams, (long, short): (&str, &str)) -> Option<&'a str> {
    params
        .get(long)
        .or_else(|| params.get(short))
        .map(String::as_str)
}

/// Non-negative float; anything unparsable or negative reads as 0.
fn non_negative(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Non-negative integer; anything else reads as 0.
fn page_number(value: &str) -> u32 {
    value.trim().parse::<u32>().unwrap_or(0)
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Build a print spec from `/print` (or `/scan?url=`) parameters.
pub fn print_spec_from_params(params: &QueryParams) -> PrintJobSpec {
    let margin = |key| lookup(params, key).map_or(0.5, non_negative);
    let number = |key: &str| params.get(key).map_or(0.0, |v| non_negative(v));
    let page = |key: &str| params.get(key).map_or(0, |v| page_number(v));

    let paper_value = lookup(params, PAPER).unwrap_or(DEFAULT_PAPER);

    PrintJobSpec {
        urls: params.get("url").cloned().into_iter().collect(),
        printer: lookup(params, PRINTER)
            .unwrap_or(DEFAULT_PRINTER)
            .to_string(),
        margins: Margins {
            left: margin(LEFT),
            top: margin(TOP),
            right: margin(RIGHT),
            bottom: margin(BOTTOM),
        },
        paper: Paper::from_param(paper_value, number("width"), number("height")),
        orientation: lookup(params, ORIENTATION)
            .map(Orientation::parse)
            .unwrap_or_default(),
        page_range: PageRange {
            from: page("pagefrom"),
            to: page("pageto"),
        },
        test_mode: params.get("test").is_some_and(|v| truthy(v)),
    }
}

/// Build a device-scan spec from `/scan` parameters.
pub fn scan_spec_from_params(params: &QueryParams) -> ScanJobSpec {
    let scanner = non_empty(params.get("scanner").map(String::as_str)).unwrap_or(DEFAULT_SCANNER);
    ScanJobSpec::new(scanner)
        .with_output_file(params.get("output_file").cloned().unwrap_or_default())
        .with_upload_url(params.get("upload_url").cloned().unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Echo of an accepted print job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintEcho {
    pub printer: String,
    pub urls: Vec<String>,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub paper: String,
    pub orientation: &'static str,
    pub pagefrom: u32,
    pub pageto: u32,
    pub width: f64,
    pub height: f64,
}

impl From<&PrintJobSpec> for PrintEcho {
    fn from(spec: &PrintJobSpec) -> Self {
        Self {
            printer: spec.printer.clone(),
            urls: spec.urls.clone(),
            left: spec.margins.left,
            top: spec.margins.top,
            right: spec.margins.right,
            bottom: spec.margins.bottom,
            paper: spec.paper.name.clone(),
            orientation: spec.orientation.as_str(),
            pagefrom: spec.page_range.from,
            pageto: spec.page_range.to,
            width: spec.paper.width_mm,
            height: spec.paper.height_mm,
        }
    }
}

/// Echo of an accepted render-to-image job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRenderEcho {
    #[serde(flatten)]
    pub print: PrintEcho,
    pub output: String,
    #[serde(rename = "uploadUrl", skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

/// Acknowledgement of a detached device scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanAck {
    pub status: &'static str,
    pub job_id: JobId,
    pub scanner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

impl ScanAck {
    pub fn new(job_id: JobId, spec: &ScanJobSpec) -> Self {
        Self {
            status: "scan_initiated",
            job_id,
            scanner: spec.scanner.clone(),
            output_file: spec.output_file.as_ref().map(|p| p.display().to_string()),
            upload_url: spec.upload_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Turns parsed requests into jobs and responses.
#[derive(Clone, Debug)]
pub struct Router {
    config: Arc<ServerConfig>,
    services: JobServices,
    jobs: JobRegistry,
}

impl Router {
    pub fn new(config: Arc<ServerConfig>, services: JobServices) -> Self {
        Self {
            config,
            services,
            jobs: JobRegistry::new(),
        }
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Answer `request` on `sink`, starting whatever job it names.
    ///
    /// `connection` is held until the response has been written, which for
    /// deferred printing is after the job finishes.
    #[instrument(skip_all, fields(endpoint = %request.endpoint))]
    pub async fn dispatch(
        &self,
        request: &Request,
        mut sink: ResponseSink,
        connection: Option<ConnectionGuard>,
    ) -> Result<Route> {
        let route = classify(request);
        debug!(?route, "request routed");
        match route {
            Route::Print => self.start_print(request, sink, connection).await?,
            Route::ScanDevice => self.start_scan(request, sink).await?,
            Route::ScanRender => self.start_scan_render(request, sink).await?,
            Route::NotFound => {
                info!(endpoint = %request.endpoint, "no route");
                send_response(&mut sink, &HttpResponse::empty(Status::NotFound).to_bytes())
                    .await?;
            }
        }
        Ok(route)
    }

    async fn start_print(
        &self,
        request: &Request,
        mut sink: ResponseSink,
        connection: Option<ConnectionGuard>,
    ) -> Result<()> {
        let spec = print_spec_from_params(&request.params);
        let response = HttpResponse::json(Status::Ok, &[PrintEcho::from(&spec)])?.to_bytes();
        let lease = self.jobs.admit(JobKind::Print);
        info!(
            job_id = %lease.id(),
            printer = %spec.printer,
            mode = ?self.config.print_response,
            "print job accepted"
        );

        let engine = Arc::clone(&self.services.engine);
        match self.config.print_response {
            PrintResponseMode::Immediate => {
                let (job, _events) = PrintJob::new(spec, PrintMode::Detached, engine);
                spawn_print(job, lease);
                send_response(&mut sink, &response).await
            }
            PrintResponseMode::Deferred => {
                let mode = PrintMode::Deferred {
                    sink,
                    response,
                    connection,
                };
                let (job, _events) = PrintJob::new(spec, mode, engine);
                spawn_print(job, lease);
                Ok(())
            }
        }
    }

    async fn start_scan(&self, request: &Request, mut sink: ResponseSink) -> Result<()> {
        let spec = scan_spec_from_params(&request.params);
        let lease = self.jobs.admit(JobKind::Scan);
        let ack = ScanAck::new(lease.id(), &spec);
        let response = HttpResponse::json(Status::Accepted, &ack)?.to_bytes();
        info!(job_id = %lease.id(), scanner = %spec.scanner, "scan job accepted");

        let scanner = Arc::clone(&self.services.scanner);
        let uploader = Arc::clone(&self.services.uploader);
        tokio::spawn(async move {
            let job_id = lease.id();
            let report = ScanJob::new(spec)
                .run(scanner.as_ref(), uploader.as_ref())
                .await;
            info!(job_id = %job_id, result = %report.to_json(), "scan job result");
            lease.release();
        });

        send_response(&mut sink, &response).await
    }

    async fn start_scan_render(&self, request: &Request, mut sink: ResponseSink) -> Result<()> {
        let spec = print_spec_from_params(&request.params);
        let output = non_empty(request.param("output"))
            .unwrap_or(self.config.default_scan_output.as_str())
            .to_string();
        let upload_url = non_empty(request.param("uploadUrl")).map(str::to_string);

        let echo = ScanRenderEcho {
            print: PrintEcho::from(&spec),
            output: output.clone(),
            upload_url: upload_url.clone(),
        };
        let response = HttpResponse::json(Status::Ok, &[echo])?.to_bytes();
        let lease = self.jobs.admit(JobKind::ScanRender);
        info!(job_id = %lease.id(), output = %output, "render-to-image job accepted");

        let output = PathBuf::from(output);
        let mode = PrintMode::Rasterize {
            output: output.clone(),
        };
        let (job, events) = PrintJob::new(spec, mode, Arc::clone(&self.services.engine));
        tokio::spawn(job.run());
        tokio::spawn(upload_when_rendered(
            events,
            output,
            upload_url,
            Arc::clone(&self.services.uploader),
            lease,
        ));

        send_response(&mut sink, &response).await
    }
}

fn spawn_print(job: PrintJob, lease: JobLease) {
    tokio::spawn(async move {
        job.run().await;
        lease.release();
    });
}

/// Follow a rasterize job and upload its image once it is written.
async fn upload_when_rendered(
    mut events: mpsc::UnboundedReceiver<PrintEvent>,
    output: PathBuf,
    upload_url: Option<String>,
    uploader: Arc<dyn Uploader>,
    lease: JobLease,
) {
    while let Some(event) = events.recv().await {
        match event {
            PrintEvent::ScanRenderFinished(true) => {
                let Some(url) = upload_url.as_deref() else {
                    continue;
                };
                let outcome = uploader.upload(UploadPayload::File(output.clone()), url).await;
                if outcome.success {
                    info!(job_id = %lease.id(), url, "rendered image uploaded");
                } else {
                    warn!(job_id = %lease.id(), url, error = %outcome.detail, "rendered image upload failed");
                }
            }
            PrintEvent::ScanRenderFinished(false) => {
                debug!(job_id = %lease.id(), "render failed, nothing to upload");
            }
            PrintEvent::Finished => break,
        }
    }
    lease.release();
}
