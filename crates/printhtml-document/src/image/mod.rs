// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module -- page images produced by scanners and rasterizing renders.

pub mod page;

pub use page::{PageImage, ensure_parent_dir};
