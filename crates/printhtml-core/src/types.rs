// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the PrintHtml dispatcher.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a print or scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Render URLs and send them to a printer.
    Print,
    /// Acquire an image from a scan device.
    Scan,
    /// Render URLs to an image file (the `/scan?url=` form).
    ScanRender,
}

/// Bookkeeping record for a live job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTicket {
    pub id: JobId,
    pub kind: JobKind,
    pub accepted_at: DateTime<Utc>,
}

impl JobTicket {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            accepted_at: Utc::now(),
        }
    }
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            left: 0.5,
            top: 0.5,
            right: 0.5,
            bottom: 0.5,
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Lenient parse: anything other than "landscape" (any case) is portrait.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("landscape") {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

/// Paper selection: a named size, optionally overridden by explicit
/// dimensions in millimetres.
///
/// A zero width/height means "use the named size".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub name: String,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl Default for Paper {
    fn default() -> Self {
        Self::named("A4")
    }
}

impl Paper {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width_mm: 0.0,
            height_mm: 0.0,
        }
    }

    /// Build from a `paper` value plus any explicit width/height.
    ///
    /// A value of the form `width,height` with both parts positive numbers
    /// overrides the explicit dimensions. Anything else is kept as the name
    /// and the explicit dimensions stand.
    pub fn from_param(value: &str, width_mm: f64, height_mm: f64) -> Self {
        let (width_mm, height_mm) = if value.contains(',') {
            parse_custom_size(value).unwrap_or((width_mm, height_mm))
        } else {
            (width_mm, height_mm)
        };
        Self {
            name: value.to_string(),
            width_mm,
            height_mm,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.width_mm > 0.0 && self.height_mm > 0.0
    }

    /// Physical size (width, height) in millimetres, if known.
    pub fn dimensions_mm(&self) -> Option<(f64, f64)> {
        if self.is_custom() {
            return Some((self.width_mm, self.height_mm));
        }
        match self.name.to_ascii_lowercase().as_str() {
            "a3" => Some((297.0, 420.0)),
            "a4" => Some((210.0, 297.0)),
            "a5" => Some((148.0, 210.0)),
            "letter" => Some((215.9, 279.4)),
            "legal" => Some((215.9, 355.6)),
            "tabloid" => Some((279.4, 431.8)),
            _ => None,
        }
    }
}

/// Parse `width,height` in millimetres. Both parts must be finite and > 0.
pub fn parse_custom_size(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split(',');
    let width = parts.next()?.trim().parse::<f64>().ok()?;
    let height = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let valid = |v: f64| v.is_finite() && v > 0.0;
    (valid(width) && valid(height)).then_some((width, height))
}

/// Page range; `0` in either bound means "all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRange {
    pub from: u32,
    pub to: u32,
}

impl PageRange {
    pub fn is_all(&self) -> bool {
        self.from == 0 && self.to == 0
    }
}

/// Everything a print job needs to render its URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJobSpec {
    pub urls: Vec<String>,
    pub printer: String,
    pub margins: Margins,
    pub paper: Paper,
    pub orientation: Orientation,
    pub page_range: PageRange,
    pub test_mode: bool,
}

impl Default for PrintJobSpec {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            printer: "Default".into(),
            margins: Margins::default(),
            paper: Paper::default(),
            orientation: Orientation::Portrait,
            page_range: PageRange::default(),
            test_mode: false,
        }
    }
}

/// Parameters of a device scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJobSpec {
    pub scanner: String,
    pub output_file: Option<PathBuf>,
    pub upload_url: Option<String>,
    pub json_output: bool,
}

impl ScanJobSpec {
    pub fn new(scanner: impl Into<String>) -> Self {
        Self {
            scanner: scanner.into(),
            output_file: None,
            upload_url: None,
            json_output: false,
        }
    }

    /// Set the output path; an empty string means "don't save".
    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.output_file = (!path.is_empty()).then(|| PathBuf::from(path));
        self
    }

    /// Set the upload destination; an empty string means "don't upload".
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.upload_url = (!url.is_empty()).then_some(url);
        self
    }

    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }
}

/// Outcome accumulated by a scan job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    pub message: String,
    pub saved: bool,
    pub uploaded: bool,
}

/// `status` field of the terminal scan report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
}

/// Terminal notification of a scan job, serialized as the JSON result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub status: ReportStatus,
    pub message: String,
    pub scanner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}

impl ScanReport {
    pub fn new(spec: &ScanJobSpec, result: &ScanResult) -> Self {
        Self {
            status: if result.success {
                ReportStatus::Success
            } else {
                ReportStatus::Error
            },
            message: result.message.clone(),
            scanner: spec.scanner.clone(),
            output_file: spec
                .output_file
                .as_ref()
                .map(|p| p.display().to_string()),
            upload_url: spec.upload_url.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Success
    }

    /// Compact single-line JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Status of the embedded HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_size_requires_two_positive_numbers() {
        assert_eq!(parse_custom_size("105,148"), Some((105.0, 148.0)));
        assert_eq!(parse_custom_size(" 105 , 148.5 "), Some((105.0, 148.5)));
        assert_eq!(parse_custom_size("105"), None);
        assert_eq!(parse_custom_size("105,0"), None);
        assert_eq!(parse_custom_size("-1,148"), None);
        assert_eq!(parse_custom_size("a,b"), None);
        assert_eq!(parse_custom_size("1,2,3"), None);
    }

    #[test]
    fn paper_custom_overrides_explicit_dimensions() {
        let paper = Paper::from_param("105,148", 10.0, 20.0);
        assert_eq!(paper.name, "105,148");
        assert_eq!((paper.width_mm, paper.height_mm), (105.0, 148.0));
        assert!(paper.is_custom());
    }

    #[test]
    fn paper_invalid_custom_keeps_name() {
        let paper = Paper::from_param("105,abc", 0.0, 0.0);
        assert_eq!(paper.name, "105,abc");
        assert!(!paper.is_custom());

        let paper = Paper::from_param("105", 0.0, 0.0);
        assert_eq!(paper.name, "105");
        assert_eq!((paper.width_mm, paper.height_mm), (0.0, 0.0));
        assert_eq!(paper.dimensions_mm(), None);
    }

    #[test]
    fn named_paper_dimensions() {
        assert_eq!(Paper::named("a4").dimensions_mm(), Some((210.0, 297.0)));
        assert_eq!(Paper::named("Letter").dimensions_mm(), Some((215.9, 279.4)));
    }

    #[test]
    fn orientation_parse_is_lenient() {
        assert_eq!(Orientation::parse("Landscape"), Orientation::Landscape);
        assert_eq!(Orientation::parse("portrait"), Orientation::Portrait);
        assert_eq!(Orientation::parse("sideways"), Orientation::Portrait);
    }

    #[test]
    fn scan_spec_treats_empty_strings_as_absent() {
        let spec = ScanJobSpec::new("Default")
            .with_output_file("")
            .with_upload_url("");
        assert!(spec.output_file.is_none());
        assert!(spec.upload_url.is_none());
    }

    #[test]
    fn scan_report_omits_absent_fields() {
        let spec = ScanJobSpec::new("Flatbed");
        let result = ScanResult {
            success: false,
            message: "Scanning failed.".into(),
            ..ScanResult::default()
        };
        let json = ScanReport::new(&spec, &result).to_json();
        assert_eq!(
            json,
            r#"{"status":"error","message":"Scanning failed.","scanner":"Flatbed"}"#
        );
    }

    #[test]
    fn scan_report_includes_output_and_upload() {
        let spec = ScanJobSpec::new("Flatbed")
            .with_output_file("out/scan.png")
            .with_upload_url("http://example.com/up");
        let result = ScanResult {
            success: true,
            message: "Scan and upload successful.".into(),
            saved: true,
            uploaded: true,
        };
        let report = ScanReport::new(&spec, &result);
        assert!(report.is_success());
        let value: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["output_file"], "out/scan.png");
        assert_eq!(value["upload_url"], "http://example.com/up");
    }
}
