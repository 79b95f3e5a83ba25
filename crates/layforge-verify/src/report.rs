use std::fmt;

use serde::{Deserialize, Serialize};

use layforge_core::{CellId, Layout, MissingConnection};

use crate::shorts::{check_shorts, ShortCheckResult};

/// Progress of a cell's connectivity checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub cell: String,
    /// Per-copy and external requirements.
    pub required: usize,
    pub covered: usize,
    pub missing: Vec<MissingConnection>,
}

impl ConnectivityReport {
    pub fn build(layout: &Layout, cell: CellId) -> Self {
        let checklist = layout
            .checklist(cell)
            .cloned()
            .unwrap_or_else(|| layout.build_checklist(cell));
        Self {
            cell: layout.hierarchy_name(cell),
            required: checklist.len(),
            covered: checklist.covered_count(),
            missing: checklist.missing(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Connectivity of {}: {}/{} connections made",
            self.cell, self.covered, self.required
        )];
        lines.extend(self.missing.iter().map(|m| format!("  missing {m}")));
        lines.join("\n")
    }
}

impl fmt::Display for ConnectivityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Shorts and missing connections of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub shorts: ShortCheckResult,
    pub connectivity: ConnectivityReport,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.shorts.is_clean() && self.connectivity.is_complete()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.connectivity.summary(),
            self.shorts.summary(),
            if self.passed() { "PASS" } else { "FAIL" }
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Runs the short check and the connectivity report on `cell`.
pub fn verify(layout: &Layout, cell: CellId) -> VerificationReport {
    let report = VerificationReport {
        shorts: check_shorts(layout, cell),
        connectivity: ConnectivityReport::build(layout, cell),
    };
    if report.passed() {
        log::info!("{}: verification passed", layout.hierarchy_name(cell));
    } else {
        log::info!(
            "{}: {} shorts, {} missing connections",
            layout.hierarchy_name(cell),
            report.shorts.len(),
            report.connectivity.missing.len()
        );
    }
    report
}
