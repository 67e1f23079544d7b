//! # Row Validator
//!
//! Structural and semantic checks on one input row. Checks run in order
//! and the first failure wins:
//!
//! 1. every declared field is present and non-empty
//! 2. the identifier is a non-negative integer
//! 3. no value echoes its own header (stray header line)
//! 4. reference and integer columns are non-negative integers
//! 5. bounded text columns fit their width
//!
//! Undeclared columns (such as denormalised ancestor names) are ignored.
//! Surrounding whitespace is ignored for the checks and for numeric
//! columns, but text values are stored exactly as read.
//! Validation never mutates anything and never fails fatally.

use crate::primitives::ID_FIELD;
use crate::report::ValidationError;
use crate::schema::{self, FieldType};
use crate::types::{Fields, Kind, RawRow, RecordId};

/// A row that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub line: usize,
    /// Identifier assigned by the system that produced the archive.
    pub source_id: RecordId,
    /// Declared fields without `id`, in canonical form.
    pub fields: Fields,
}

/// Validate one raw row of `kind`.
pub fn validate(kind: Kind, row: &RawRow) -> Result<ValidatedRow, ValidationError> {
    let source_label = row
        .get(ID_FIELD)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown");
    let fail = |reason: String| ValidationError {
        kind,
        source_id: source_label.to_string(),
        line: row.line,
        reason,
    };

    let specs = schema::fields_of(kind);

    // (a) required fields
    for spec in specs {
        match row.get(spec.name).map(str::trim) {
            None => return Err(fail(format!("missing field `{}`", spec.name))),
            Some("") => return Err(fail(format!("empty field `{}`", spec.name))),
            Some(_) => {}
        }
    }

    // (b) identifier
    let source_id = row
        .get(ID_FIELD)
        .and_then(parse_non_negative)
        .map(RecordId)
        .ok_or_else(|| fail(format!("`{}` is not a non-negative integer", source_label)))?;

    // (c) header echo
    for spec in specs {
        let value = row.get(spec.name).map(str::trim).unwrap_or_default();
        if value.eq_ignore_ascii_case(spec.name) {
            return Err(fail(format!("value of `{}` repeats its header", spec.name)));
        }
    }

    // (d), (e) typed columns. Text is kept byte for byte.
    let mut fields = Fields::new();
    for spec in specs {
        let value = row.get(spec.name).unwrap_or_default();
        let canonical = match spec.ty {
            FieldType::Identifier => continue,
            FieldType::Reference(_) | FieldType::Integer => parse_non_negative(value)
                .map(|n| n.to_string())
                .ok_or_else(|| {
                    fail(format!(
                        "`{}` is not a non-negative integer: {:?}",
                        spec.name,
                        value.trim()
                    ))
                })?,
            FieldType::Text { max_len } => {
                let len = value.chars().count();
                if let Some(max) = max_len
                    && len > max
                {
                    return Err(fail(format!(
                        "`{}` is {} characters long (max {})",
                        spec.name, len, max
                    )));
                }
                value.to_string()
            }
        };
        fields.insert(spec.name.to_string(), canonical);
    }

    Ok(ValidatedRow {
        line: row.line,
        source_id,
        fields,
    })
}

/// Parse a trimmed decimal without sign.
fn parse_non_negative(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
