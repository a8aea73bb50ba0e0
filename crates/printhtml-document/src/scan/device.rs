// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan device boundary.
//
// A real driver (SANE, TWAIN, WIA, eSCL) implements `ScanDevice`; the
// dispatcher only ever sees this trait.  `SimulatedScanner` stands in when no
// hardware is wired up: it waits for a configurable latency and returns a
// solid-colour page.

use std::time::Duration;

use async_trait::async_trait;
use printhtml_core::error::Result;
use tracing::{debug, info, instrument};

use crate::image::page::PageImage;

/// Acquires one image from a named scanner.
#[async_trait]
pub trait ScanDevice: Send + Sync {
    /// Acquire a single page from `scanner`.
    ///
    /// `"Default"` selects whatever the platform considers the default device.
    async fn acquire(&self, scanner: &str) -> Result<PageImage>;
}

/// Software scanner returning a solid-colour page after a delay.
#[derive(Debug, Clone)]
pub struct SimulatedScanner {
    delay: Duration,
    width: u32,
    height: u32,
    rgb: [u8; 3],
}

impl Default for SimulatedScanner {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl SimulatedScanner {
    /// A 100x100 blue page after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            width: 100,
            height: 100,
            rgb: [0, 0, 255],
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl ScanDevice for SimulatedScanner {
    #[instrument(skip(self), fields(delay_ms = self.delay.as_millis() as u64))]
    async fn acquire(&self, scanner: &str) -> Result<PageImage> {
        debug!("simulating scan");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let page = PageImage::solid(self.width, self.height, self.rgb);
        info!(width = page.width(), height = page.height(), "simulated scan complete");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_scan_returns_blue_page() {
        let scanner = SimulatedScanner::new(Duration::ZERO);
        let page = scanner.acquire("Default").await.expect("scan");
        assert_eq!((page.width(), page.height()), (100, 100));
        assert_eq!(page.as_dynamic().to_rgb8().get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_scan_waits_for_delay() {
        let scanner = SimulatedScanner::default().with_size(10, 20);
        let started = tokio::time::Instant::now();
        let page = scanner.acquire("Flatbed").await.expect("scan");
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!((page.width(), page.height()), (10, 20));
    }
}
