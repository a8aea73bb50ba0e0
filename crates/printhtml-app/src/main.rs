// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrintHtml -- headless print and scan dispatcher
//
// Entry point. Initialises logging, parses the command line, loads the
// configuration and runs the selected mode on a single-threaded runtime.

mod cli;
mod services;

use std::process::ExitCode;

use printhtml_core::config::ServerConfig;
use printhtml_core::error::Result;

use cli::{Cli, Mode};
use services::app_services::AppServices;

/// Argument, configuration or startup failure.
const EXIT_USAGE: u8 = 255;
/// The job ran but did not succeed.
const EXIT_JOB_FAILED: u8 = 1;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse_normalized() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let mode = match cli.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("printhtml: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let config = match load_config(&cli, &mode) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "cannot load configuration");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "cannot start async runtime");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "PrintHtml starting");
    runtime.block_on(run(config, mode))
}

/// Config file (if any), with the CLI server port taking precedence.
fn load_config(cli: &Cli, mode: &Mode) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Mode::Server { port } = mode {
        config.port = *port;
    }
    Ok(config)
}

async fn run(config: ServerConfig, mode: Mode) -> ExitCode {
    let svc = match AppServices::init(config) {
        Ok(svc) => svc,
        Err(e) => {
            tracing::error!(error = %e, "backend services failed to initialise");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match mode {
        Mode::Server { .. } => match svc.serve(svc.config().port).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "server failed");
                ExitCode::from(EXIT_USAGE)
            }
        },
        Mode::Print { spec, json } => {
            let outcome = svc.print(spec).await;
            if json {
                match serde_json::to_string(&outcome) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::error!(error = %e, "cannot serialize print result"),
                }
            }
            exit_for(outcome.is_success())
        }
        Mode::Scan { spec } => {
            let json = spec.json_output;
            let report = svc.scan(spec).await;
            if json {
                println!("{}", report.to_json());
            } else {
                println!("{}", report.message);
            }
            exit_for(report.is_success())
        }
    }
}

fn exit_for(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_JOB_FAILED)
    }
}
