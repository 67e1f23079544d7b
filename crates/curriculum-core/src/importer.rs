//! # Transactional Importer
//!
//! Orchestrates one import run over an unpacked archive.
//!
//! For every kind, in the fixed import order:
//!
//! 1. reset the kind's remapper bucket
//! 2. dry pass: validate, resolve and check duplicates without writing
//! 3. commit pass inside one transaction: the same pipeline again, this
//!    time persisting survivors and recording their new identifiers
//! 4. on a storage failure, roll the kind back, reset its bucket and mark
//!    it failed; the next kind runs regardless. Any other error also rolls
//!    the kind back but ends the run.
//! 5. store the kind's counts in the report
//!
//! There is no transaction spanning kinds. Rows are persisted one at a
//! time in source order.

use crate::archive::{self, Archive, Table};
use crate::dedup::{Verdict, check_duplicate};
use crate::remap::IdentityRemapper;
use crate::report::{ImportReport, KindReport, RowIssue};
use crate::resolve::{Resolution, resolve_parent};
use crate::schema;
use crate::storage::Store;
use crate::types::{CurriculumError, Kind, RawRow, RecordId};
use crate::validate::validate;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

// =============================================================================
// OPTIONS
// =============================================================================

/// Knobs of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Validate only. No transaction is opened and nothing is written.
    pub dry_run: bool,
    /// Never resolve an unmapped parent reference against existing records.
    pub strict_references: bool,
}

impl ImportOptions {
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }
}

// =============================================================================
// IMPORTER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Read-only preview.
    Dry,
    /// Persisting pass inside the kind's transaction.
    Commit,
}

/// One import invocation. Owns the run-scoped identity mapping.
#[derive(Debug)]
pub struct Importer {
    options: ImportOptions,
    remapper: IdentityRemapper,
    /// Next provisional identifier handed out in dry-run mode.
    provisional: u64,
}

impl Importer {
    /// Create an importer for one run.
    #[must_use]
    pub fn new(options: ImportOptions) -> Self {
        let remapper = if options.strict_references {
            IdentityRemapper::strict()
        } else {
            IdentityRemapper::new()
        };
        Self {
            options,
            remapper,
            provisional: u64::MAX,
        }
    }

    /// Unpack archive bytes and import them.
    ///
    /// Archive-level failures (`IncompleteArchive`, `ArchiveFormat`) are
    /// returned before anything is written. Everything after that ends in
    /// a complete report.
    pub fn run<S: Store + ?Sized>(
        self,
        store: &mut S,
        bytes: &[u8],
    ) -> Result<ImportReport, CurriculumError> {
        let archive = archive::unpack(bytes)?;
        self.run_archive(store, &archive)
    }

    /// Import an already unpacked archive.
    pub fn run_archive<S: Store + ?Sized>(
        mut self,
        store: &mut S,
        archive: &Archive,
    ) -> Result<ImportReport, CurriculumError> {
        if store.in_transaction() {
            return Err(CurriculumError::InvalidInput(
                "store already has an open transaction".to_string(),
            ));
        }

        let mut report = ImportReport::new(self.options.dry_run);
        for kind in schema::import_order() {
            let Some(table) = archive.table(*kind) else {
                return Err(CurriculumError::IncompleteArchive {
                    missing: vec![schema::table_file_name(*kind)],
                });
            };
            let kind_report = self.import_kind(store, table)?;
            info!(
                kind = %kind,
                inserted = kind_report.inserted,
                duplicate = kind_report.skipped_duplicate,
                missing = kind_report.skipped_missing_dependency,
                invalid = kind_report.validation_failed,
                fatal = kind_report.fatal.is_some(),
                "imported kind"
            );
            report.set(kind_report);
        }
        Ok(report)
    }

    fn import_kind<S: Store + ?Sized>(
        &mut self,
        store: &mut S,
        table: &Table,
    ) -> Result<KindReport, CurriculumError> {
        let kind = table.kind;
        self.remapper.reset(kind);

        let dry = match self.pass(store, kind, &table.rows, Pass::Dry) {
            Ok(report) => report,
            Err(e) => return self.fail(kind, KindReport::new(kind), e),
        };
        if self.options.dry_run {
            return Ok(dry);
        }

        if let Err(e) = store.begin() {
            return self.fail(kind, dry, e);
        }
        let outcome = self
            .pass(store, kind, &table.rows, Pass::Commit)
            .and_then(|report| store.commit().map(|()| report));
        match outcome {
            Ok(report) => Ok(report),
            Err(e) => {
                if store.in_transaction()
                    && let Err(rollback) = store.rollback()
                {
                    warn!(kind = %kind, error = %rollback, "rollback failed");
                }
                self.fail(kind, dry, e)
            }
        }
    }

    /// Mark a kind failed. Counts of the dry pass are kept for reference,
    /// the insert count is zero.
    ///
    /// Only kind-fatal errors let the run continue with the next kind. Any
    /// other error is a broken contract between pipeline stages and ends
    /// the run.
    fn fail(
        &mut self,
        kind: Kind,
        mut report: KindReport,
        error: CurriculumError,
    ) -> Result<KindReport, CurriculumError> {
        self.remapper.reset(kind);
        if !error.is_kind_fatal() {
            error!(kind = %kind, error = %error, "import aborted");
            return Err(error);
        }
        warn!(kind = %kind, error = %error, "kind rolled back");
        report.inserted = 0;
        report.fatal = Some(error.to_string());
        Ok(report)
    }

    /// Run validator, resolver and duplicate check over every row.
    ///
    /// Only store failures end the pass early; every row-scoped outcome is
    /// collected into the returned report.
    fn pass<S: Store + ?Sized>(
        &mut self,
        store: &mut S,
        kind: Kind,
        rows: &[RawRow],
        pass: Pass,
    ) -> Result<KindReport, CurriculumError> {
        let mut report = KindReport::new(kind);
        let mut seen: BTreeSet<RecordId> = BTreeSet::new();

        for raw in rows {
            let row = match validate(kind, raw) {
                Ok(row) => row,
                Err(e) => {
                    debug!(kind = %kind, line = e.line, reason = %e.reason, "invalid row");
                    report.push_issue(RowIssue::Validation(e));
                    continue;
                }
            };

            if !seen.insert(row.source_id) {
                debug!(kind = %kind, source_id = %row.source_id, "repeated source id");
                report.push_issue(RowIssue::DuplicateSourceId {
                    kind,
                    source_id: row.source_id,
                    line: row.line,
                });
                continue;
            }

            let row = match resolve_parent(&*store, &mut self.remapper, kind, row)? {
                Resolution::Resolved(row) => row,
                Resolution::Missing(missing) => {
                    debug!(
                        kind = %kind,
                        source_id = %missing.source_id,
                        parent = %missing.parent_source_id,
                        "missing dependency"
                    );
                    report.push_issue(RowIssue::MissingDependency(missing));
                    continue;
                }
            };

            let target = match check_duplicate(&*store, kind, &row.fields)? {
                Verdict::Duplicate(existing) => {
                    report.skipped_duplicate += 1;
                    existing
                }
                Verdict::Fresh => {
                    report.inserted += 1;
                    match pass {
                        Pass::Commit => store.persist(kind, &row.fields)?,
                        Pass::Dry => self.next_provisional(),
                    }
                }
            };

            // A normal dry pass leaves the bucket untouched; the commit pass
            // fills it, and so does a dry run so descendants can be checked.
            if pass == Pass::Commit || self.options.dry_run {
                self.remapper.record(kind, row.source_id, target)?;
            }
        }

        Ok(report)
    }

    /// Identifier from the top of the id space that no stored record holds.
    fn next_provisional(&mut self) -> RecordId {
        let id = RecordId(self.provisional);
        self.provisional = self.provisional.saturating_sub(1);
        id
    }
}

/// Import archive bytes with default options.
pub fn import_all<S: Store + ?Sized>(
    store: &mut S,
    bytes: &[u8],
) -> Result<ImportReport, CurriculumError> {
    Importer::new(ImportOptions::default()).run(store, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::pack;
    use crate::storage::MemoryStore;

    fn table(kind: Kind, rows: &[&[&str]]) -> Table {
        let headers: Vec<String> = schema::fields_of(kind)
            .iter()
            .map(|f| f.name.to_string())
            .collect();
        let mut t = Table::new(kind, headers.clone());
        for (i, cells) in rows.iter().enumerate() {
            t.rows.push(RawRow::new(
                i + 2,
                headers.iter().cloned().zip(cells.iter().map(|c| c.to_string())),
            ));
        }
        t
    }

    fn archive_with(roots: &[&[&str]], areas: &[&[&str]]) -> Vec<u8> {
        let tables: Vec<Table> = Kind::ALL
            .iter()
            .map(|k| match k {
                Kind::Curriculum => table(*k, roots),
                Kind::LearningArea => table(*k, areas),
                _ => table(*k, &[]),
            })
            .collect();
        pack(&tables).expect("pack")
    }

    #[test]
    fn roots_and_children_are_inserted() {
        let bytes = archive_with(
            &[&["10", "5", "Bavaria", "Math"]],
            &[&["20", "10", "1", "Numbers", "30"]],
        );
        let mut store = MemoryStore::new();
        let report = import_all(&mut store, &bytes).expect("import");

        assert_eq!(report.kind(Kind::Curriculum).map(|r| r.inserted), Some(1));
        assert_eq!(report.kind(Kind::LearningArea).map(|r| r.inserted), Some(1));
        let area = &store.records(Kind::LearningArea).expect("records")[0];
        assert_eq!(area.field("curriculum_id"), "1");
    }

    #[test]
    fn repeated_source_id_counts_as_invalid() {
        let bytes = archive_with(
            &[
                &["1", "5", "Bavaria", "Math"],
                &["1", "6", "Bavaria", "Math"],
            ],
            &[],
        );
        let mut store = MemoryStore::new();
        let report = import_all(&mut store, &bytes).expect("import");
        let root = report.kind(Kind::Curriculum).expect("root");

        assert_eq!(root.inserted, 1);
        assert_eq!(root.validation_failed, 1);
        assert!(matches!(
            root.issues[0],
            RowIssue::DuplicateSourceId { line: 3, .. }
        ));
    }

    #[test]
    fn dry_run_writes_nothing_but_checks_children() {
        let bytes = archive_with(
            &[&["1", "5", "Bavaria", "Math"]],
            &[
                &["1", "1", "1", "Numbers", "30"],
                &["2", "9", "1", "Orphan", "30"],
            ],
        );
        let mut store = MemoryStore::new();
        let report = Importer::new(ImportOptions::default().dry_run(true))
            .run(&mut store, &bytes)
            .expect("import");

        assert!(report.dry_run);
        assert_eq!(store.count(Kind::Curriculum).expect("count"), 0);
        let areas = report.kind(Kind::LearningArea).expect("areas");
        assert_eq!(areas.inserted, 1);
        assert_eq!(areas.skipped_missing_dependency, 1);
    }

    #[test]
    fn open_transaction_is_refused() {
        let bytes = archive_with(&[], &[]);
        let mut store = MemoryStore::new();
        store.begin().expect("begin");
        assert!(matches!(
            import_all(&mut store, &bytes),
            Err(CurriculumError::InvalidInput(_))
        ));
    }

    #[test]
    fn options_builder() {
        let options = ImportOptions::default()
            .dry_run(true)
            .strict_references(true);
        assert!(options.dry_run);
        assert!(options.strict_references);
        assert_eq!(ImportOptions::default(), ImportOptions {
            dry_run: false,
            strict_references: false
        });
    }
}
