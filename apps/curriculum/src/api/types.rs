//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use curriculum_core::{ImportReport, Kind, Table};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Number of records (or rows) of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: Kind,
    pub count: usize,
}

/// Catalog status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `memory` or `redb`.
    pub backend: String,
    pub counts: Vec<KindCount>,
    pub total: usize,
}

impl StatusResponse {
    pub fn new(backend: &str, counts: Vec<(Kind, usize)>) -> Self {
        let counts: Vec<KindCount> = counts
            .into_iter()
            .map(|(kind, count)| KindCount { kind, count })
            .collect();
        Self {
            backend: backend.to_string(),
            total: counts.iter().map(|c| c.count).sum(),
            counts,
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded archive
    pub counts: Vec<KindCount>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], tables: &[Table]) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            counts: tables
                .iter()
                .map(|t| KindCount {
                    kind: t.kind,
                    count: t.len(),
                })
                .collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            counts: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// IMPORT REQUEST/RESPONSE
// =============================================================================

/// Archive import request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Base64 encoded archive.
    pub archive: String,
    #[serde(default)]
    pub dry_run: bool,
    /// Overrides the configured `strict_references` for this request.
    #[serde(default)]
    pub strict_references: Option<bool>,
}

/// Archive import response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub report: Option<ImportReport>,
    pub error: Option<String>,
}

impl ImportResponse {
    pub fn success(report: ImportReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// READ VIEWS
// =============================================================================

/// Query string of `GET /curricula`.
///
/// `page` is kept as text: anything that is not a valid page number falls
/// back to the first page instead of rejecting the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub state: Option<String>,
    pub subject: Option<String>,
}

impl ListQuery {
    pub fn page_number(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }
}

/// Error body of the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
