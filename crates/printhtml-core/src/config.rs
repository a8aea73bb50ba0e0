// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.

use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PrintHtmlError, Result};

/// How `/print` answers the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintResponseMode {
    /// Echo is written and the connection closed before the job finishes.
    #[default]
    Immediate,
    /// The print job owns the socket and writes the echo once rendering is done.
    Deferred,
}

/// Settings for the embedded HTTP dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on (default 8080).
    pub port: u16,
    /// Interface to bind (default `::`, all interfaces, IPv4 included).
    pub bind_address: IpAddr,
    /// Longest request line accepted before answering 400.
    pub max_request_line_bytes: usize,
    /// Response strategy for `/print`.
    pub print_response: PrintResponseMode,
    /// Output path for `/scan?url=` when the request gives none.
    pub default_scan_output: String,
    /// Latency of the built-in simulated scanner, in milliseconds.
    pub scan_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            max_request_line_bytes: 8 * 1024,
            print_response: PrintResponseMode::Immediate,
            default_scan_output: "output.png".into(),
            scan_delay_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            PrintHtmlError::Config(format!("read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_request_line_bytes < 16 {
            return Err(PrintHtmlError::Config(format!(
                "max_request_line_bytes too small: {}",
                self.max_request_line_bytes
            )));
        }
        if self.default_scan_output.is_empty() {
            return Err(PrintHtmlError::Config(
                "default_scan_output must not be empty".into(),
            ));
        }
        Ok(())
    }
}
