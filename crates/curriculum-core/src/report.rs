//! # Report Aggregator
//!
//! Per-kind outcome counts of one import run, plus the row-scoped issues
//! behind them. A report is always complete: it holds one entry per kind
//! in import order, including kinds that failed fatally.

use crate::schema;
use crate::types::{Kind, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// =============================================================================
// ROW ISSUES
// =============================================================================

/// A row rejected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: Kind,
    /// The row's identifier cell, or `"unknown"` when it is absent.
    pub source_id: String,
    pub line: usize,
    pub reason: String,
}

/// A row whose parent reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    pub kind: Kind,
    pub source_id: RecordId,
    pub parent_kind: Kind,
    pub parent_source_id: RecordId,
    pub line: usize,
}

/// A row-scoped problem. None of these abort the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum RowIssue {
    Validation(ValidationError),
    MissingDependency(MissingDependency),
    DuplicateSourceId {
        kind: Kind,
        source_id: RecordId,
        line: usize,
    },
}

impl RowIssue {
    /// Line of the offending row within its table.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            RowIssue::Validation(e) => e.line,
            RowIssue::MissingDependency(m) => m.line,
            RowIssue::DuplicateSourceId { line, .. } => *line,
        }
    }

    /// One-line description for logs and summaries.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            RowIssue::Validation(e) => {
                format!("line {}: {} {}: {}", e.line, e.kind, e.source_id, e.reason)
            }
            RowIssue::MissingDependency(m) => format!(
                "line {}: {} {} references missing {} {}",
                m.line, m.kind, m.source_id, m.parent_kind, m.parent_source_id
            ),
            RowIssue::DuplicateSourceId {
                kind,
                source_id,
                line,
            } => format!("line {line}: {kind} {source_id} appears more than once"),
        }
    }
}

// =============================================================================
// KIND REPORT
// =============================================================================

/// Outcome counts of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    pub kind: Kind,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub skipped_missing_dependency: usize,
    /// Validator rejections plus repeated source ids.
    pub validation_failed: usize,
    /// Set when the commit pass was rolled back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
    #[serde(default)]
    pub issues: Vec<RowIssue>,
}

impl KindReport {
    /// Create an empty report for a kind.
    #[must_use]
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            inserted: 0,
            skipped_duplicate: 0,
            skipped_missing_dependency: 0,
            validation_failed: 0,
            fatal: None,
            issues: Vec::new(),
        }
    }

    /// Record a row issue and bump the matching counter.
    pub fn push_issue(&mut self, issue: RowIssue) {
        match issue {
            RowIssue::Validation(_) | RowIssue::DuplicateSourceId { .. } => {
                self.validation_failed += 1;
            }
            RowIssue::MissingDependency(_) => self.skipped_missing_dependency += 1,
        }
        self.issues.push(issue);
    }

    /// Whether the kind's commit pass was rolled back.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Rows that were not inserted for any reason.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_duplicate + self.skipped_missing_dependency + self.validation_failed
    }
}

// =============================================================================
// IMPORT REPORT
// =============================================================================

/// Complete outcome of one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Whether the run only validated (nothing was written).
    pub dry_run: bool,
    /// One entry per kind, in import order.
    pub kinds: Vec<KindReport>,
}

impl ImportReport {
    /// Create a report with an empty entry for every kind.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            kinds: schema::import_order()
                .iter()
                .map(|k| KindReport::new(*k))
                .collect(),
        }
    }

    /// Entry of a kind.
    #[must_use]
    pub fn kind(&self, kind: Kind) -> Option<&KindReport> {
        self.kinds.iter().find(|r| r.kind == kind)
    }

    /// Replace the entry of a kind.
    pub fn set(&mut self, report: KindReport) {
        if let Some(slot) = self.kinds.iter_mut().find(|r| r.kind == report.kind) {
            *slot = report;
        }
    }

    /// Total inserted rows across all kinds.
    #[must_use]
    pub fn total_inserted(&self) -> usize {
        self.kinds.iter().map(|r| r.inserted).sum()
    }

    /// Whether any kind failed fatally.
    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.kinds.iter().any(KindReport::is_fatal)
    }

    /// Whether every row of every kind was inserted or skipped as duplicate.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.kinds.iter().all(|r| {
            r.fatal.is_none() && r.skipped_missing_dependency == 0 && r.validation_failed == 0
        })
    }

    /// Human-readable summary, one line per kind in import order.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if self.dry_run {
            out.push_str("Dry run: nothing was written\n");
        }
        let _ = writeln!(
            out,
            "{:<28} {:>9} {:>10} {:>8} {:>8}",
            "kind", "inserted", "duplicate", "missing", "invalid"
        );
        for r in &self.kinds {
            let _ = write!(
                out,
                "{:<28} {:>9} {:>10} {:>8} {:>8}",
                schema::schema_of(r.kind).label,
                r.inserted,
                r.skipped_duplicate,
                r.skipped_missing_dependency,
                r.validation_failed
            );
            if let Some(reason) = &r.fatal {
                let _ = write!(out, "  FAILED: {reason}");
            }
            out.push('\n');
        }
        let _ = writeln!(out, "Total inserted: {}", self.total_inserted());
        out
    }
}
