//! # Engine Constants
//!
//! Hardcoded limits and archive constants for the curriculum engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! The application layer may apply tighter limits (e.g. the HTTP body limit)
//! but never looser ones.

/// UTF-8 byte-order mark written at the start of every table.
///
/// Spreadsheet programs use it to detect the encoding of a CSV file.
pub const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";

/// File name of the archive manifest.
pub const MANIFEST_FILE: &str = "MANIFEST.txt";

/// First line of the manifest.
pub const MANIFEST_MAGIC: &str = "curriculum-archive";

/// Current archive format version.
///
/// Increment this when making breaking changes to the table layout.
pub const ARCHIVE_VERSION: u8 = 1;

/// Encoding declaration written into the manifest.
pub const ARCHIVE_ENCODING: &str = "utf-8-bom";

/// Field name of the identifier column in every table.
pub const ID_FIELD: &str = "id";

/// Separator between ancestor stem and field in denormalised columns.
///
/// `sub_objective__name` is the name of a row's sub-objective.
pub const ANCESTOR_SEPARATOR: &str = "__";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of an archive accepted for import (64 MiB).
///
/// Checked before the tar stream is read.
pub const MAX_ARCHIVE_BYTES: usize = 64 * 1024 * 1024;

/// Maximum number of data rows in a single table.
pub const MAX_TABLE_ROWS: usize = 200_000;

/// Width of the short text columns (names, subject, state, grade levels).
pub const MAX_NAME_LENGTH: usize = 100;

/// Number of curricula per page in list views.
pub const PAGE_SIZE: usize = 20;
