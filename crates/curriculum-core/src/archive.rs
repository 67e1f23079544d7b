//! # Archive Packager
//!
//! Bundles the per-kind tables into one portable archive and back.
//!
//! ## Format
//!
//! An uncompressed tar stream holding:
//!
//! ```text
//! MANIFEST.txt
//! 1_curriculum.csv
//! 2_learning_area.csv
//! ...
//! 8_content_description.csv
//! ```
//!
//! Tables are comma-delimited CSV, UTF-8 with a byte-order mark. The
//! manifest is plain text:
//!
//! ```text
//! curriculum-archive v1
//! encoding: utf-8-bom
//! 1 curriculum 1_curriculum.csv 12
//! 2 learning_area 2_learning_area.csv 40
//! ...
//! ```
//!
//! On unpack, entries are matched by file name only; directory prefixes
//! and archive position are irrelevant. The manifest is optional but, if
//! present, must declare a supported version.

use crate::primitives::{
    ARCHIVE_ENCODING, ARCHIVE_VERSION, MANIFEST_FILE, MANIFEST_MAGIC, MAX_ARCHIVE_BYTES,
    MAX_TABLE_ROWS, UTF8_BOM,
};
use crate::schema;
use crate::types::{CurriculumError, Kind, RawRow};
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, warn};

// =============================================================================
// TABLES
// =============================================================================

/// One flat table of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub kind: Kind,
    /// Column names in file order.
    pub headers: Vec<String>,
    /// Data rows; `line` is the 1-based line in the file (header = 1).
    pub rows: Vec<RawRow>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new(kind: Kind, headers: Vec<String>) -> Self {
        Self {
            kind,
            headers,
            rows: Vec::new(),
        }
    }

    /// Archive entry name of this table.
    #[must_use]
    pub fn file_name(&self) -> String {
        schema::table_file_name(self.kind)
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_err(e: csv::Error) -> CurriculumError {
    CurriculumError::ArchiveFormat(e.to_string())
}

fn io_err(e: std::io::Error) -> CurriculumError {
    CurriculumError::IoError(e.to_string())
}

/// Serialise a table as BOM-prefixed CSV.
pub fn write_table(table: &Table) -> Result<Vec<u8>, CurriculumError> {
    let mut out = UTF8_BOM.to_vec();
    {
        let mut writer = csv::WriterBuilder::new().from_writer(&mut out);
        writer.write_record(&table.headers).map_err(csv_err)?;
        for row in &table.rows {
            writer
                .write_record(table.headers.iter().map(|h| row.get(h).unwrap_or("")))
                .map_err(csv_err)?;
        }
        writer.flush().map_err(io_err)?;
    }
    Ok(out)
}

/// Parse a table of `kind` from CSV bytes (BOM optional).
pub fn read_table(kind: Kind, bytes: &[u8]) -> Result<Table, CurriculumError> {
    let bytes = bytes.strip_prefix(UTF8_BOM.as_slice()).unwrap_or(bytes);
    let file = schema::table_file_name(kind);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CurriculumError::ArchiveFormat(format!("{file}: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = Table::new(kind, headers);
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CurriculumError::ArchiveFormat(format!("{file}: {e}")))?;
        if table.rows.len() >= MAX_TABLE_ROWS {
            return Err(CurriculumError::ArchiveFormat(format!(
                "{file}: more than {MAX_TABLE_ROWS} rows"
            )));
        }
        let line = record
            .position()
            .map_or(index + 2, |p| p.line() as usize);
        let values = table
            .headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()));
        table.rows.push(RawRow::new(line, values));
    }
    Ok(table)
}

// =============================================================================
// MANIFEST
// =============================================================================

/// One table line of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub position: usize,
    pub kind: Kind,
    pub file_name: String,
    pub rows: usize,
}

/// Parsed `MANIFEST.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: u8,
    pub encoding: String,
    /// Required import order.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Describe a set of tables, listed in import order.
    #[must_use]
    pub fn for_tables(tables: &[Table]) -> Self {
        let mut entries: Vec<ManifestEntry> = tables
            .iter()
            .map(|t| ManifestEntry {
                position: t.kind.position(),
                kind: t.kind,
                file_name: t.file_name(),
                rows: t.len(),
            })
            .collect();
        entries.sort_by_key(|e| e.position);
        Self {
            version: ARCHIVE_VERSION,
            encoding: ARCHIVE_ENCODING.to_string(),
            entries,
        }
    }

    /// Render the manifest text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "{MANIFEST_MAGIC} v{}\nencoding: {}\n",
            self.version, self.encoding
        );
        for e in &self.entries {
            out.push_str(&format!(
                "{} {} {} {}\n",
                e.position, e.kind, e.file_name, e.rows
            ));
        }
        out
    }

    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, CurriculumError> {
        let bad = |msg: String| CurriculumError::ArchiveFormat(format!("{MANIFEST_FILE}: {msg}"));
        let mut lines = text
            .trim_start_matches('\u{feff}')
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let first = lines.next().ok_or_else(|| bad("empty".to_string()))?;
        let version = first
            .strip_prefix(MANIFEST_MAGIC)
            .map(str::trim)
            .and_then(|v| v.strip_prefix('v'))
            .and_then(|v| v.parse::<u8>().ok())
            .ok_or_else(|| bad(format!("unrecognised header {first:?}")))?;
        if version != ARCHIVE_VERSION {
            return Err(bad(format!("unsupported version v{version}")));
        }

        let mut encoding = ARCHIVE_ENCODING.to_string();
        let mut entries = Vec::new();
        for line in lines {
            if let Some(value) = line.strip_prefix("encoding:") {
                encoding = value.trim().to_ascii_lowercase();
                if !encoding.starts_with("utf-8") {
                    return Err(bad(format!("unsupported encoding {encoding}")));
                }
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            let [position, kind, file_name, rows] = parts.as_slice() else {
                return Err(bad(format!("malformed line {line:?}")));
            };
            let kind = Kind::parse(kind).ok_or_else(|| bad(format!("unknown kind {kind:?}")))?;
            entries.push(ManifestEntry {
                position: position
                    .parse()
                    .map_err(|_| bad(format!("bad position in {line:?}")))?,
                kind,
                file_name: (*file_name).to_string(),
                rows: rows
                    .parse()
                    .map_err(|_| bad(format!("bad row count in {line:?}")))?,
            });
        }

        Ok(Self {
            version,
            encoding,
            entries,
        })
    }
}

// =============================================================================
// PACK / UNPACK
// =============================================================================

/// An unpacked archive: every table present, manifest if shipped.
#[derive(Debug, Clone)]
pub struct Archive {
    pub manifest: Option<Manifest>,
    tables: BTreeMap<Kind, Table>,
}

impl Archive {
    /// Table of a kind. Always present after a successful unpack.
    #[must_use]
    pub fn table(&self, kind: Kind) -> Option<&Table> {
        self.tables.get(&kind)
    }

    /// Tables in import order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}

/// Bundle tables plus a manifest into tar bytes.
pub fn pack(tables: &[Table]) -> Result<Vec<u8>, CurriculumError> {
    let manifest = Manifest::for_tables(tables);

    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, MANIFEST_FILE, manifest.render().as_bytes())?;
    for entry in &manifest.entries {
        if let Some(table) = tables.iter().find(|t| t.kind == entry.kind) {
            append(&mut builder, &entry.file_name, &write_table(table)?)?;
        }
    }
    builder.into_inner().map_err(io_err)
}

fn append(
    builder: &mut tar::Builder<Vec<u8>>,
    name: &str,
    data: &[u8],
) -> Result<(), CurriculumError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, name, data).map_err(io_err)
}

/// Unpack tar bytes and parse every table.
///
/// Fails with `IncompleteArchive` naming every missing table before any
/// table is parsed.
pub fn unpack(bytes: &[u8]) -> Result<Archive, CurriculumError> {
    if bytes.len() > MAX_ARCHIVE_BYTES {
        return Err(CurriculumError::ArchiveFormat(format!(
            "archive is {} bytes (max {MAX_ARCHIVE_BYTES})",
            bytes.len()
        )));
    }

    let mut manifest = None;
    let mut raw: BTreeMap<Kind, Vec<u8>> = BTreeMap::new();

    let mut archive = tar::Archive::new(bytes);
    let entries = archive
        .entries()
        .map_err(|e| CurriculumError::ArchiveFormat(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| CurriculumError::ArchiveFormat(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| CurriculumError::ArchiveFormat(e.to_string()))?
            .into_owned();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(io_err)?;

        if name == MANIFEST_FILE {
            let text = String::from_utf8(data)
                .map_err(|_| CurriculumError::ArchiveFormat(format!("{MANIFEST_FILE} is not UTF-8")))?;
            manifest = Some(Manifest::parse(&text)?);
        } else if let Some(kind) = schema::kind_for_file_name(&name) {
            if raw.insert(kind, data).is_some() {
                return Err(CurriculumError::ArchiveFormat(format!(
                    "{name} appears more than once"
                )));
            }
        } else {
            debug!(entry = %path.display(), "ignoring unknown archive entry");
        }
    }

    let missing: Vec<String> = schema::import_order()
        .iter()
        .filter(|k| !raw.contains_key(k))
        .map(|k| schema::table_file_name(*k))
        .collect();
    if !missing.is_empty() {
        return Err(CurriculumError::IncompleteArchive { missing });
    }

    if manifest.is_none() {
        warn!("archive has no {MANIFEST_FILE}, using built-in table order");
    }

    let mut tables = BTreeMap::new();
    for (kind, data) in raw {
        let table = read_table(kind, &data)?;
        if let Some(entry) = manifest
            .as_ref()
            .and_then(|m: &Manifest| m.entries.iter().find(|e| e.kind == kind))
            && entry.rows != table.len()
        {
            warn!(
                table = %table.file_name(),
                declared = entry.rows,
                found = table.len(),
                "manifest row count differs from table"
            );
        }
        tables.insert(kind, table);
    }

    Ok(Archive { manifest, tables })
}
