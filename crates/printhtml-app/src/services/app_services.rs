// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer -- owns the configuration and the job collaborators
// and runs each top-level mode: HTTP server, one-shot print, one-shot scan.

use std::future::Future;

use printhtml_core::config::ServerConfig;
use printhtml_core::error::Result;
use printhtml_core::types::{PrintJobSpec, ScanJobSpec, ScanReport};
use printhtml_document::PrintOutcome;
use printhtml_print::{JobServices, PrintJob, PrintMode, PrintServer, ScanJob};
use tracing::{info, instrument};

#[derive(Clone, Debug)]
pub struct AppServices {
    config: ServerConfig,
    jobs: JobServices,
}

impl AppServices {
    /// Build the default collaborators for `config`.
    pub fn init(config: ServerConfig) -> Result<Self> {
        let jobs = JobServices::from_config(&config)?;
        info!(
            scan_delay_ms = config.scan_delay_ms,
            print_response = ?config.print_response,
            "app services initialised"
        );
        Ok(Self::with_services(config, jobs))
    }

    pub fn with_services(config: ServerConfig, jobs: JobServices) -> Self {
        Self { config, jobs }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // -- Server ---------------------------------------------------------------

    /// Serve on `port` until `shutdown` resolves, then wait for accepted jobs.
    #[instrument(skip(self, shutdown))]
    pub async fn serve_until<F>(&self, port: u16, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut server = PrintServer::new(self.config.clone(), self.jobs.clone());
        let addr = server.listen(port).await?;
        info!(%addr, "server mode");

        shutdown.await;
        server.stop().await?;

        let pending = server.jobs().snapshot();
        if !pending.is_empty() {
            for ticket in &pending {
                info!(job_id = %ticket.id, kind = ?ticket.kind, "waiting for job");
            }
            server.jobs().wait_idle().await;
        }
        Ok(())
    }

    /// Serve on `port` until Ctrl-C.
    pub async fn serve(&self, port: u16) -> Result<()> {
        self.serve_until(port, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
            }
        })
        .await
    }

    // -- One-shot jobs --------------------------------------------------------

    /// Print `spec` and wait for the result.
    pub async fn print(&self, spec: PrintJobSpec) -> PrintOutcome {
        let (job, _events) = PrintJob::new(spec, PrintMode::Detached, self.jobs.engine.clone());
        job.run().await
    }

    /// Scan according to `spec` and wait for the terminal report.
    pub async fn scan(&self, spec: ScanJobSpec) -> ScanReport {
        ScanJob::new(spec)
            .run(self.jobs.scanner.as_ref(), self.jobs.uploader.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use printhtml_document::{DryRunEngine, SimulatedScanner};
    use printhtml_print::HttpUploader;

    fn services() -> AppServices {
        let jobs = JobServices::new(
            Arc::new(SimulatedScanner::new(Duration::ZERO)),
            Arc::new(DryRunEngine),
            Arc::new(HttpUploader::new().unwrap()),
        );
        let config = ServerConfig {
            bind_address: "127.0.0.1".parse().unwrap(),
            ..ServerConfig::default()
        };
        AppServices::with_services(config, jobs)
    }

    #[tokio::test]
    async fn print_reports_each_url() {
        let spec = PrintJobSpec {
            urls: vec!["http://a".into(), "mailto:b".into()],
            ..PrintJobSpec::default()
        };
        let outcome = services().print(spec).await;
        assert_eq!(outcome.succeeded, vec!["http://a"]);
        assert_eq!(outcome.failed, vec!["mailto:b"]);
    }

    #[tokio::test]
    async fn scan_saves_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("scan.png");
        let spec = ScanJobSpec::new("Default").with_output_file(output.to_string_lossy());
        let report = services().scan(spec).await;
        assert!(report.is_success());
        assert_eq!(report.message, "Scan successful and image saved.");
        assert!(output.exists());
    }

    #[tokio::test]
    async fn serve_returns_after_shutdown() {
        let result = services().serve_until(0, async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn serve_fails_when_port_taken() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let result = services().serve_until(port, async {}).await;
        assert!(result.is_err());
    }
}
