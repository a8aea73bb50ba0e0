// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan devices -- the acquisition boundary used by scan jobs.

pub mod device;

pub use device::{ScanDevice, SimulatedScanner};
