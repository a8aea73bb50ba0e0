// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print job -- wraps a `PrintEngine` run and reports its lifecycle.
//
// A job runs in one of three modes:
//
//   - `Detached`:  the HTTP response has already been sent; just print.
//   - `Deferred`:  the job owns the client connection, and its registry
//                  entry, and writes the prepared response once printing
//                  is done.
//   - `Rasterize`: render to an image file instead of a printer, then emit
//                  `ScanRenderFinished` so the caller can chain an upload.
//
// Events are delivered on an unbounded channel.  `Finished` is always the
// last event and is sent exactly once.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use printhtml_core::types::PrintJobSpec;
use printhtml_document::{PrintEngine, PrintOutcome};

use crate::registry::ConnectionGuard;
use crate::response::{ResponseSink, send_response};

/// How the job delivers its result.
pub enum PrintMode {
    Detached,
    Deferred {
        sink: ResponseSink,
        response: Vec<u8>,
        /// Keeps the connection registered until the response is written.
        connection: Option<ConnectionGuard>,
    },
    Rasterize {
        output: PathBuf,
    },
}

impl std::fmt::Debug for PrintMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detached => f.write_str("Detached"),
            Self::Deferred {
                response,
                connection,
                ..
            } => f
                .debug_struct("Deferred")
                .field("response_bytes", &response.len())
                .field("connection", &connection.as_ref().map(|c| c.id()))
                .finish(),
            Self::Rasterize { output } => {
                f.debug_struct("Rasterize").field("output", output).finish()
            }
        }
    }
}

/// Lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintEvent {
    /// Rasterize mode only; `true` when the image file was written.
    ScanRenderFinished(bool),
    Finished,
}

pub struct PrintJob {
    spec: PrintJobSpec,
    mode: PrintMode,
    engine: Arc<dyn PrintEngine>,
    events: mpsc::UnboundedSender<PrintEvent>,
}

impl PrintJob {
    /// Build a job and the receiver for its events.
    pub fn new(
        spec: PrintJobSpec,
        mode: PrintMode,
        engine: Arc<dyn PrintEngine>,
    ) -> (Self, mpsc::UnboundedReceiver<PrintEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                spec,
                mode,
                engine,
                events,
            },
            rx,
        )
    }

    pub fn spec(&self) -> &PrintJobSpec {
        &self.spec
    }

    /// Run to completion. In rasterize mode the outcome lists the rendered
    /// URL under `succeeded` or `failed`.
    #[instrument(skip_all, fields(printer = %self.spec.printer, mode = ?self.mode))]
    pub async fn run(self) -> PrintOutcome {
        let Self {
            spec,
            mode,
            engine,
            events,
        } = self;

        let outcome = match mode {
            PrintMode::Detached => engine.print(&spec).await,
            PrintMode::Deferred {
                mut sink,
                response,
                connection,
            } => {
                let outcome = engine.print(&spec).await;
                if let Err(e) = send_response(&mut sink, &response).await {
                    warn!(error = %e, "deferred response not delivered");
                }
                drop(sink);
                drop(connection);
                outcome
            }
            PrintMode::Rasterize { output } => {
                let rendered = match engine.rasterize(&spec, &output).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(output = %output.display(), error = %e, "render to image failed");
                        false
                    }
                };
                // The receiver may already be gone; nothing else to do then.
                let _ = events.send(PrintEvent::ScanRenderFinished(rendered));
                let url = spec.urls.first().cloned().unwrap_or_default();
                if rendered {
                    PrintOutcome {
                        succeeded: vec![url],
                        failed: Vec::new(),
                    }
                } else {
                    PrintOutcome {
                        succeeded: Vec::new(),
                        failed: vec![url],
                    }
                }
            }
        };

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "print job finished"
        );
        let _ = events.send(PrintEvent::Finished);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printhtml_document::DryRunEngine;
    use tokio::io::AsyncReadExt;

    use crate::registry::ConnectionRegistry;

    fn spec(urls: &[&str]) -> PrintJobSpec {
        PrintJobSpec {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            ..PrintJobSpec::default()
        }
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<PrintEvent>) -> Vec<PrintEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn detached_job_emits_only_finished() {
        let (job, rx) = PrintJob::new(
            spec(&["http://a", "ftp://b"]),
            PrintMode::Detached,
            Arc::new(DryRunEngine),
        );
        let outcome = job.run().await;
        assert_eq!(outcome.succeeded, vec!["http://a"]);
        assert_eq!(outcome.failed, vec!["ftp://b"]);
        assert_eq!(drain(rx).await, vec![PrintEvent::Finished]);
    }

    #[tokio::test]
    async fn deferred_job_writes_response_after_printing() {
        let (client, server) = tokio::io::duplex(1024);
        let connections = ConnectionRegistry::new();
        let guard = connections.register("127.0.0.1:5000".parse().unwrap());
        let (job, rx) = PrintJob::new(
            spec(&["http://a"]),
            PrintMode::Deferred {
                sink: Box::new(server),
                response: b"HTTP/1.1 200 OK\r\n\r\n".to_vec(),
                connection: Some(guard),
            },
            Arc::new(DryRunEngine),
        );
        assert_eq!(connections.active(), 1);
        job.run().await;
        assert_eq!(connections.active(), 0);

        let mut received = Vec::new();
        let mut client = client;
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(drain(rx).await, vec![PrintEvent::Finished]);
    }

    #[tokio::test]
    async fn rasterize_emits_render_result_before_finished() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("render.png");
        let (job, rx) = PrintJob::new(
            spec(&["http://a"]),
            PrintMode::Rasterize {
                output: output.clone(),
            },
            Arc::new(DryRunEngine),
        );
        let outcome = job.run().await;
        assert!(outcome.is_success());
        assert!(output.exists());
        assert_eq!(
            drain(rx).await,
            vec![PrintEvent::ScanRenderFinished(true), PrintEvent::Finished]
        );
    }

    #[tokio::test]
    async fn rasterize_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (job, rx) = PrintJob::new(
            spec(&["gopher://nope"]),
            PrintMode::Rasterize {
                output: dir.path().join("render.png"),
            },
            Arc::new(DryRunEngine),
        );
        let outcome = job.run().await;
        assert_eq!(outcome.failed, vec!["gopher://nope"]);
        assert_eq!(
            drain(rx).await,
            vec![PrintEvent::ScanRenderFinished(false), PrintEvent::Finished]
        );
    }
}
