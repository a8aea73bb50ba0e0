// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printhtml-document -- the collaborators jobs delegate to.
//
// Provides the `ScanDevice` and `PrintEngine` boundaries, built-in stand-ins
// for both (a simulated scanner and a dry-run renderer), and the page image
// type they exchange with the dispatcher.

pub mod image;
pub mod render;
pub mod scan;

pub use image::page::PageImage;
pub use render::engine::{DryRunEngine, PrintEngine, PrintOutcome};
pub use scan::device::{ScanDevice, SimulatedScanner};
