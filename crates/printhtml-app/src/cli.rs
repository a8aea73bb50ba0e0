// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface for the `printhtml` binary.
//
// Single-dash long options (`-server`, `-test`, `-json`, `-pagefrom`,
// `-pageto`) are accepted for compatibility and rewritten to their
// double-dash spelling before clap sees them.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use printhtml_core::error::{PrintHtmlError, Result};
use printhtml_core::types::{
    Margins, Orientation, PageRange, Paper, PrintJobSpec, ScanJobSpec, parse_custom_size,
};

#[derive(Parser, Debug, PartialEq)]
#[command(
    name = "printhtml",
    version,
    about = "Headless HTML print and scan dispatcher",
    long_about = None,
    after_help = "Print and scan modes are mutually exclusive. \
                  A page range of 0..0 prints the whole document."
)]
pub struct Cli {
    /// Run as an HTTP server on PORT (default 8080)
    #[arg(long, value_name = "PORT", num_args = 0..=1, default_missing_value = "8080")]
    pub server: Option<u16>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE", env = "PRINTHTML_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write results as JSON to stdout
    #[arg(long)]
    pub json: bool,

    // -- Print mode -----------------------------------------------------------
    /// URLs to print, one after the other
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Don't print, just report what would have printed
    #[arg(long)]
    pub test: bool,

    /// Printer to print to ('Default' for the system default)
    #[arg(short = 'p', long, default_value = "Default")]
    pub printer: String,

    /// Left margin in inches
    #[arg(short = 'l', long, default_value_t = 0.5)]
    pub left: f64,

    /// Top margin in inches
    #[arg(short = 't', long, default_value_t = 0.5)]
    pub top: f64,

    /// Right margin in inches
    #[arg(short = 'r', long, default_value_t = 0.5)]
    pub right: f64,

    /// Bottom margin in inches
    #[arg(short = 'b', long, default_value_t = 0.5)]
    pub bottom: f64,

    /// Paper type (A4, A5, Letter, ...) or custom size `width,height` in mm
    #[arg(short = 'a', long, default_value = "A4")]
    pub paper: String,

    /// Portrait or Landscape
    #[arg(short = 'o', long, default_value = "portrait")]
    pub orientation: String,

    /// First page of the range to print
    #[arg(long, default_value_t = 0)]
    pub pagefrom: u32,

    /// Last page of the range to print
    #[arg(long, default_value_t = 0)]
    pub pageto: u32,

    // -- Scan mode ------------------------------------------------------------
    /// Acquire an image from a scanner instead of printing
    #[arg(long)]
    pub scan: bool,

    /// Scanner to use ('Default' for the system default)
    #[arg(long, default_value = "Default")]
    pub scanner: String,

    /// Where to save the scanned image
    #[arg(long, value_name = "PATH")]
    pub output_file: Option<String>,

    /// Where to upload the scanned image
    #[arg(long, value_name = "URL")]
    pub upload_url: Option<String>,
}

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Server { port: u16 },
    Print { spec: PrintJobSpec, json: bool },
    Scan { spec: ScanJobSpec },
}

/// Rewrite single-dash long options to their double-dash form.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let rewritten = arg.to_str().and_then(|s| {
                let lower = s.to_ascii_lowercase();
                match lower.as_str() {
                    "-server" | "-test" | "-json" | "-pagefrom" | "-pageto" => {
                        Some(OsString::from(format!("-{lower}")))
                    }
                    _ => None,
                }
            });
            rewritten.unwrap_or(arg)
        })
        .collect()
}

impl Cli {
    /// Parse `std::env::args_os()` after normalisation.
    pub fn try_parse_normalized() -> std::result::Result<Self, clap::Error> {
        Self::try_parse_from(normalize_args(std::env::args_os()))
    }

    /// Validate option combinations and build the requested mode.
    pub fn mode(&self) -> Result<Mode> {
        if self.scan && !self.urls.is_empty() {
            return Err(PrintHtmlError::InvalidArgument(
                "cannot use URL arguments with --scan".into(),
            ));
        }
        if self.scan && self.server.is_some() {
            return Err(PrintHtmlError::InvalidArgument(
                "cannot use --scan together with --server".into(),
            ));
        }

        if let Some(port) = self.server {
            return Ok(Mode::Server { port });
        }
        if self.scan {
            return Ok(Mode::Scan {
                spec: ScanJobSpec::new(self.scanner.clone())
                    .with_output_file(self.output_file.clone().unwrap_or_default())
                    .with_upload_url(self.upload_url.clone().unwrap_or_default())
                    .with_json_output(self.json),
            });
        }
        if self.urls.is_empty() {
            return Err(PrintHtmlError::InvalidArgument(
                "no URL to print (see --help)".into(),
            ));
        }
        Ok(Mode::Print {
            spec: self.print_spec()?,
            json: self.json,
        })
    }

    fn print_spec(&self) -> Result<PrintJobSpec> {
        let paper = if self.paper.contains(',') {
            let (width, height) = parse_custom_size(&self.paper).ok_or_else(|| {
                PrintHtmlError::InvalidArgument(format!(
                    "invalid custom paper size {:?}, expected width,height in mm (e.g. 105,148)",
                    self.paper
                ))
            })?;
            Paper {
                name: self.paper.clone(),
                width_mm: width,
                height_mm: height,
            }
        } else {
            Paper::named(self.paper.clone())
        };

        for (name, value) in [
            ("left", self.left),
            ("top", self.top),
            ("right", self.right),
            ("bottom", self.bottom),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PrintHtmlError::InvalidArgument(format!(
                    "{name} margin must be a non-negative number, got {value}"
                )));
            }
        }

        Ok(PrintJobSpec {
            urls: self.urls.clone(),
            printer: self.printer.clone(),
            margins: Margins {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
            },
            paper,
            orientation: Orientation::parse(&self.orientation),
            page_range: PageRange {
                from: self.pagefrom,
                to: self.pageto,
            },
            test_mode: self.test,
        })
    }
}
