// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering engines -- turn URLs into printed output or page images.

pub mod engine;

pub use engine::{DryRunEngine, PrintEngine, PrintOutcome};
