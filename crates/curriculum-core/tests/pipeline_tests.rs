//! # Import/Export Pipeline Tests
//!
//! End-to-end properties of the engine, run against real archives.
//!
//! ## Groups
//! - Round trip: export then import rebuilds the same tree
//! - Idempotence: importing twice inserts nothing the second time
//! - Integrity: no child without an existing parent
//! - Archive checks: incomplete archives, table order
//! - Partial failure: invalid rows, missing parents, rolled-back kinds

use curriculum_core::{
    Catalog, CurriculumError, CurriculumTree, Fields, ImportOptions, ImportReport, Importer,
    Kind, MemoryStore, Record, RecordId, RowIssue, Store, Table, all_trees, export_all,
    export_tables, import_all, pack, schema,
};
use std::io::Write;

// =============================================================================
// FIXTURES
// =============================================================================

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn add<S: Store + ?Sized>(store: &mut S, kind: Kind, pairs: &[(&str, &str)]) -> String {
    store
        .persist(kind, &fields(pairs))
        .expect("persist")
        .to_string()
}

/// Two curricula, the first with a full eight-level branch.
fn populate<S: Store + ?Sized>(store: &mut S) {
    let math = add(
        store,
        Kind::Curriculum,
        &[("grade_levels", "5-6"), ("state", "Bavaria"), ("subject", "Math")],
    );
    add(
        store,
        Kind::Curriculum,
        &[("grade_levels", "7"), ("state", "Hesse"), ("subject", "Art")],
    );

    for (n, area_name) in [("1", "Numbers"), ("2", "Geometry")] {
        let area = add(
            store,
            Kind::LearningArea,
            &[
                ("curriculum_id", math.as_str()),
                ("number", n),
                ("name", area_name),
                ("teaching_hours", "28"),
            ],
        );
        let objective = add(
            store,
            Kind::Objective,
            &[("learning_area_id", area.as_str()), ("name", "Understand, apply")],
        );
        add(
            store,
            Kind::ObjectiveDescription,
            &[("objective_id", objective.as_str()), ("text", "Line one\nline \"two\"")],
        );
        let sub = add(
            store,
            Kind::SubObjective,
            &[("objective_id", objective.as_str()), ("name", "Practice")],
        );
        add(
            store,
            Kind::SubObjectiveDescription,
            &[("sub_objective_id", sub.as_str()), ("text", "Exercises")],
        );
        let content = add(
            store,
            Kind::Content,
            &[("sub_objective_id", sub.as_str()), ("name", "Worksheets ä ö ü")],
        );
        add(
            store,
            Kind::ContentDescription,
            &[("content_id", content.as_str()), ("text", "Weekly")],
        );
    }
}

fn sample_archive() -> Vec<u8> {
    let mut store = MemoryStore::new();
    populate(&mut store);
    export_all(&store).expect("export")
}

/// Tree shape with identifiers blanked out.
fn shape(store: &impl Store) -> Vec<CurriculumTree> {
    let mut trees = all_trees(store).expect("trees");
    for tree in &mut trees {
        tree.id = RecordId(0);
        for area in &mut tree.learning_areas {
            area.id = RecordId(0);
            for objective in &mut area.objectives {
                objective.id = RecordId(0);
                objective.descriptions.iter_mut().for_each(|d| d.id = RecordId(0));
                for sub in &mut objective.sub_objectives {
                    sub.id = RecordId(0);
                    sub.descriptions.iter_mut().for_each(|d| d.id = RecordId(0));
                    for content in &mut sub.contents {
                        content.id = RecordId(0);
                        content.descriptions.iter_mut().for_each(|d| d.id = RecordId(0));
                    }
                }
            }
        }
    }
    trees
}

fn table(kind: Kind, rows: &[&[&str]]) -> Table {
    let headers: Vec<String> = schema::fields_of(kind)
        .iter()
        .map(|f| f.name.to_string())
        .collect();
    let mut t = Table::new(kind, headers.clone());
    for (i, cells) in rows.iter().enumerate() {
        t.rows.push(curriculum_core::RawRow::new(
            i + 2,
            headers.iter().cloned().zip(cells.iter().map(|c| c.to_string())),
        ));
    }
    t
}

/// Archive with the given rows per kind; unlisted kinds get empty tables.
fn archive_of(rows: &[(Kind, &[&[&str]])]) -> Vec<u8> {
    let tables: Vec<Table> = Kind::ALL
        .iter()
        .map(|k| {
            let data = rows
                .iter()
                .find(|(kind, _)| kind == k)
                .map_or(&[][..], |(_, r)| *r);
            table(*k, data)
        })
        .collect();
    pack(&tables).expect("pack")
}

fn counts(report: &ImportReport, kind: Kind) -> (usize, usize, usize, usize) {
    let r = report.kind(kind).expect("kind in report");
    (
        r.inserted,
        r.skipped_duplicate,
        r.skipped_missing_dependency,
        r.validation_failed,
    )
}

fn assert_referential_integrity(store: &impl Store) {
    for kind in Kind::ALL {
        let (Some(parent), Some(column)) =
            (schema::parent_kind_of(kind), schema::parent_field_of(kind))
        else {
            continue;
        };
        for record in store.records(kind).expect("records") {
            let parent_id = record.reference(column).expect("reference");
            assert!(
                store.exists_by_id(parent, parent_id).expect("exists"),
                "{kind} {} points at missing {parent} {parent_id}",
                record.id
            );
        }
    }
}

// =============================================================================
// ROUND TRIP
// =============================================================================

mod round_trip {
    use super::*;

    #[test]
    fn import_into_empty_store_rebuilds_tree() {
        let mut source = MemoryStore::new();
        populate(&mut source);
        let bytes = export_all(&source).expect("export");

        let mut target = MemoryStore::new();
        let report = import_all(&mut target, &bytes).expect("import");

        assert!(report.is_clean(), "{}", report.summary());
        assert_eq!(shape(&target), shape(&source));
        for kind in Kind::ALL {
            assert_eq!(
                target.count(kind).expect("count"),
                source.count(kind).expect("count")
            );
        }
    }

    #[test]
    fn text_whitespace_survives_round_trip() {
        let mut source = MemoryStore::new();
        let root = add(
            &mut source,
            Kind::Curriculum,
            &[("grade_levels", "5"), ("state", "Bavaria"), ("subject", "Math")],
        );
        let area = add(
            &mut source,
            Kind::LearningArea,
            &[
                ("curriculum_id", root.as_str()),
                ("number", "1"),
                ("name", "  indented"),
                ("teaching_hours", "10"),
            ],
        );
        let objective = add(
            &mut source,
            Kind::Objective,
            &[("learning_area_id", area.as_str()), ("name", "Count")],
        );
        for text in ["Line one\nLine two\n", "  indented", "Line one\n"] {
            add(
                &mut source,
                Kind::ObjectiveDescription,
                &[("objective_id", objective.as_str()), ("text", text)],
            );
        }

        let mut target = MemoryStore::new();
        let report = import_all(&mut target, &export_all(&source).expect("export")).expect("import");

        assert!(report.is_clean(), "{}", report.summary());
        let texts = |store: &MemoryStore| -> Vec<String> {
            store
                .records(Kind::ObjectiveDescription)
                .expect("records")
                .iter()
                .map(|r| r.field("text").to_string())
                .collect()
        };
        assert_eq!(texts(&target), vec!["Line one\nLine two\n", "  indented", "Line one\n"]);
        assert_eq!(texts(&target), texts(&source));
        let areas = target.records(Kind::LearningArea).expect("records");
        assert_eq!(areas[0].field("name"), "  indented");
    }

    #[test]
    fn identifiers_are_reassigned() {
        // Target already holds unrelated data, so new ids differ from source ids.
        let mut target = MemoryStore::new();
        add(
            &mut target,
            Kind::Curriculum,
            &[("grade_levels", "1"), ("state", "Saxony"), ("subject", "Music")],
        );

        let report = import_all(&mut target, &sample_archive()).expect("import");
        assert_eq!(counts(&report, Kind::Curriculum), (2, 0, 0, 0));

        let roots = target.records(Kind::Curriculum).expect("records");
        let ids: Vec<RecordId> = roots.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(2), RecordId(3)]);
        assert_eq!(roots[1].field("subject"), "Math");
        assert_referential_integrity(&target);
    }

    #[test]
    fn persistent_catalog_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("import.db");
        let bytes = sample_archive();

        {
            let mut catalog = Catalog::open(&path).expect("open");
            let report = import_all(&mut catalog, &bytes).expect("import");
            assert!(report.is_clean(), "{}", report.summary());
        }

        let catalog = Catalog::open(&path).expect("reopen");
        let mut expected = MemoryStore::new();
        populate(&mut expected);
        assert_eq!(shape(&catalog), shape(&expected));
        assert_eq!(export_all(&catalog).expect("export"), bytes);
    }
}

// =============================================================================
// IDEMPOTENCE
// =============================================================================

mod idempotence {
    use super::*;

    #[test]
    fn second_import_inserts_nothing() {
        let bytes = sample_archive();
        let mut store = MemoryStore::new();
        let first = import_all(&mut store, &bytes).expect("first import");
        let before = export_tables(&store).expect("export");

        let second = import_all(&mut store, &bytes).expect("second import");

        assert_eq!(second.total_inserted(), 0);
        for kind in Kind::ALL {
            let expected = first.kind(kind).expect("kind").inserted;
            assert_eq!(counts(&second, kind), (0, expected, 0, 0), "{kind}");
        }
        assert_eq!(export_tables(&store).expect("export"), before);
    }

    #[test]
    fn partially_applied_archive_completes() {
        let bytes = sample_archive();
        let mut store = MemoryStore::new();
        // Only the roots were applied before.
        let mut roots_only = MemoryStore::new();
        populate(&mut roots_only);
        for root in roots_only.records(Kind::Curriculum).expect("records") {
            store.persist(Kind::Curriculum, &root.fields).expect("persist");
        }

        let report = import_all(&mut store, &bytes).expect("import");
        assert_eq!(counts(&report, Kind::Curriculum), (0, 2, 0, 0));
        assert_eq!(counts(&report, Kind::LearningArea), (2, 0, 0, 0));
        assert_eq!(store.count(Kind::Curriculum).expect("count"), 2);
        assert_eq!(shape(&store), shape(&roots_only));
    }
}

// =============================================================================
// ARCHIVE CHECKS
// =============================================================================

mod archive_checks {
    use super::*;

    fn tar_of(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, data.as_slice())
                .expect("append");
        }
        builder.into_inner().expect("finish")
    }

    fn entries_of(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(bytes);
        archive
            .entries()
            .expect("entries")
            .map(|entry| {
                let mut entry = entry.expect("entry");
                let name = entry.path().expect("path").display().to_string();
                let mut data = Vec::new();
                std::io::Read::read_to_end(&mut entry, &mut data).expect("read");
                (name, data)
            })
            .collect()
    }

    #[test]
    fn missing_table_aborts_before_any_write() {
        let entries: Vec<(String, Vec<u8>)> = entries_of(&sample_archive())
            .into_iter()
            .filter(|(name, _)| name != "5_sub_objective.csv")
            .collect();
        let mut store = MemoryStore::new();

        let err = import_all(&mut store, &tar_of(&entries)).expect_err("incomplete");
        assert!(matches!(
            err,
            CurriculumError::IncompleteArchive { ref missing } if missing == &["5_sub_objective.csv"]
        ));
        for kind in Kind::ALL {
            assert_eq!(store.count(kind).expect("count"), 0);
        }
    }

    #[test]
    fn table_order_inside_archive_is_irrelevant() {
        let mut entries = entries_of(&sample_archive());
        entries.reverse();

        let mut in_order = MemoryStore::new();
        import_all(&mut in_order, &sample_archive()).expect("import");
        let mut reversed = MemoryStore::new();
        let report = import_all(&mut reversed, &tar_of(&entries)).expect("import");

        assert!(report.is_clean(), "{}", report.summary());
        assert_eq!(shape(&reversed), shape(&in_order));
    }

    #[test]
    fn unsupported_manifest_version_is_rejected() {
        let mut entries = entries_of(&sample_archive());
        for (name, data) in &mut entries {
            if name == "MANIFEST.txt" {
                let text = String::from_utf8(data.clone()).expect("utf8");
                *data = text.replace("curriculum-archive v1", "curriculum-archive v9").into_bytes();
            }
        }
        let mut store = MemoryStore::new();
        assert!(matches!(
            import_all(&mut store, &tar_of(&entries)),
            Err(CurriculumError::ArchiveFormat(_))
        ));
    }

    #[test]
    fn tables_without_bom_or_manifest_are_accepted() {
        let mut entries: Vec<(String, Vec<u8>)> = entries_of(&sample_archive())
            .into_iter()
            .filter(|(name, _)| name != "MANIFEST.txt")
            .collect();
        for (_, data) in &mut entries {
            if data.starts_with(b"\xEF\xBB\xBF") {
                data.drain(..3);
            }
        }

        let mut store = MemoryStore::new();
        let report = import_all(&mut store, &tar_of(&entries)).expect("import");
        assert!(report.is_clean(), "{}", report.summary());
        assert_eq!(store.count(Kind::ContentDescription).expect("count"), 2);
    }

    #[test]
    fn garbage_bytes_are_not_an_archive() {
        let mut bytes = Vec::new();
        bytes.write_all(&[0x42; 2048]).expect("write");
        let mut store = MemoryStore::new();
        assert!(import_all(&mut store, &bytes).is_err());
        assert_eq!(store.count(Kind::Curriculum).expect("count"), 0);
    }
}

// =============================================================================
// PARTIAL FAILURE
// =============================================================================

mod partial_failure {
    use super::*;

    #[test]
    fn unresolved_child_is_skipped_and_siblings_commit() {
        // Three roots; new ids 1..=3 are issued for source ids 1, 3, 4.
        // Source id 2 never existed, so only the first child resolves.
        let bytes = archive_of(&[
            (
                Kind::Curriculum,
                &[
                    &["1", "5", "Bavaria", "Math"],
                    &["3", "6", "Bavaria", "Math"],
                    &["4", "7", "Bavaria", "Math"],
                ],
            ),
            (
                Kind::LearningArea,
                &[
                    &["10", "1", "1", "Numbers", "20"],
                    &["11", "2", "1", "Numbers", "20"],
                ],
            ),
        ]);
        let mut store = MemoryStore::new();
        let report = import_all(&mut store, &bytes).expect("import");

        assert_eq!(counts(&report, Kind::Curriculum), (3, 0, 0, 0));
        assert_eq!(counts(&report, Kind::LearningArea), (1, 0, 1, 0));
        let areas = report.kind(Kind::LearningArea).expect("areas");
        assert!(matches!(
            &areas.issues[0],
            RowIssue::MissingDependency(m)
                if m.source_id == RecordId(11) && m.parent_source_id == RecordId(2)
        ));
        assert_eq!(store.count(Kind::LearningArea).expect("count"), 1);
    }

    #[test]
    fn invalid_rows_are_counted_not_inserted() {
        let bytes = archive_of(&[(
            Kind::Curriculum,
            &[
                &["1", "5", "Bavaria", "Math"],
                &["2", "", "Bavaria", "Math"],
                &["id", "grade_levels", "state", "subject"],
                &["4", "6", "Bavaria", "SUBJECT"],
            ],
        )]);
        let mut store = MemoryStore::new();
        let report = import_all(&mut store, &bytes).expect("import");

        assert_eq!(counts(&report, Kind::Curriculum), (1, 0, 0, 3));
        assert_eq!(store.count(Kind::Curriculum).expect("count"), 1);
        let lines: Vec<usize> = report
            .kind(Kind::Curriculum)
            .expect("root")
            .issues
            .iter()
            .map(RowIssue::line)
            .collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn children_of_duplicates_attach_to_existing_record() {
        let mut store = MemoryStore::new();
        add(
            &mut store,
            Kind::Curriculum,
            &[("grade_levels", "5"), ("state", "Bavaria"), ("subject", "Math")],
        );
        let bytes = archive_of(&[
            (Kind::Curriculum, &[&["77", "5", "Bavaria", "Math"]]),
            (Kind::LearningArea, &[&["1", "77", "1", "Numbers", "20"]]),
        ]);

        let report = import_all(&mut store, &bytes).expect("import");
        assert_eq!(counts(&report, Kind::Curriculum), (0, 1, 0, 0));
        assert_eq!(counts(&report, Kind::LearningArea), (1, 0, 0, 0));
        let area = &store.records(Kind::LearningArea).expect("records")[0];
        assert_eq!(area.field("curriculum_id"), "1");
    }

    #[test]
    fn fallback_resolves_existing_ids_unless_strict() {
        let archive = || {
            archive_of(&[(Kind::LearningArea, &[&["1", "1", "1", "Numbers", "20"]])])
        };
        let seeded = || {
            let mut store = MemoryStore::new();
            add(
                &mut store,
                Kind::Curriculum,
                &[("grade_levels", "5"), ("state", "Bavaria"), ("subject", "Math")],
            );
            store
        };

        let mut lenient = seeded();
        let report = import_all(&mut lenient, &archive()).expect("import");
        assert_eq!(counts(&report, Kind::LearningArea), (1, 0, 0, 0));

        let mut strict = seeded();
        let report = Importer::new(ImportOptions::default().strict_references(true))
            .run(&mut strict, &archive())
            .expect("import");
        assert_eq!(counts(&report, Kind::LearningArea), (0, 0, 1, 0));
        assert_eq!(strict.count(Kind::LearningArea).expect("count"), 0);
    }

    #[test]
    fn identical_siblings_collapse_into_one_record() {
        let bytes = archive_of(&[
            (Kind::Curriculum, &[&["1", "5", "Bavaria", "Math"]]),
            (Kind::LearningArea, &[&["1", "1", "1", "Numbers", "20"]]),
            (Kind::Objective, &[&["1", "1", "Count"]]),
            (
                Kind::ObjectiveDescription,
                &[&["1", "1", "Same"], &["2", "1", "Same"]],
            ),
        ]);

        // The dry pass writes nothing, so it cannot see the first copy.
        let mut store = MemoryStore::new();
        let dry = Importer::new(ImportOptions::default().dry_run(true))
            .run(&mut store, &bytes)
            .expect("dry run");
        assert_eq!(counts(&dry, Kind::ObjectiveDescription), (2, 0, 0, 0));

        // The commit pass finds the first copy and skips the second.
        let report = import_all(&mut store, &bytes).expect("import");
        assert_eq!(counts(&report, Kind::ObjectiveDescription), (1, 1, 0, 0));
        let texts: Vec<Record> = store.records(Kind::ObjectiveDescription).expect("records");
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].field("text"), "Same");
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let bytes = sample_archive();
        let mut store = MemoryStore::new();
        let report = Importer::new(ImportOptions::default().dry_run(true))
            .run(&mut store, &bytes)
            .expect("dry run");

        assert!(report.dry_run);
        assert_eq!(counts(&report, Kind::ContentDescription), (2, 0, 0, 0));
        for kind in Kind::ALL {
            assert_eq!(store.count(kind).expect("count"), 0);
        }
    }
}

// =============================================================================
// ROLLBACK
// =============================================================================

/// Store that fails the n-th persist of one kind.
struct FaultyStore {
    inner: MemoryStore,
    fail_kind: Kind,
    fail_at: usize,
    persisted: usize,
    fault: fn() -> CurriculumError,
}

impl FaultyStore {
    fn new(fail_kind: Kind, fail_at: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_kind,
            fail_at,
            persisted: 0,
            fault: || CurriculumError::StorageFailure("disk full".to_string()),
        }
    }

    fn with_fault(mut self, fault: fn() -> CurriculumError) -> Self {
        self.fault = fault;
        self
    }
}

impl Store for FaultyStore {
    fn query_existing(
        &self,
        kind: Kind,
        filter: &Fields,
    ) -> Result<Option<Record>, CurriculumError> {
        self.inner.query_existing(kind, filter)
    }

    fn persist(&mut self, kind: Kind, fields: &Fields) -> Result<RecordId, CurriculumError> {
        if kind == self.fail_kind {
            self.persisted += 1;
            if self.persisted == self.fail_at {
                return Err((self.fault)());
            }
        }
        self.inner.persist(kind, fields)
    }

    fn exists_by_id(&self, kind: Kind, id: RecordId) -> Result<bool, CurriculumError> {
        self.inner.exists_by_id(kind, id)
    }

    fn get(&self, kind: Kind, id: RecordId) -> Result<Option<Record>, CurriculumError> {
        self.inner.get(kind, id)
    }

    fn records(&self, kind: Kind) -> Result<Vec<Record>, CurriculumError> {
        self.inner.records(kind)
    }

    fn count(&self, kind: Kind) -> Result<usize, CurriculumError> {
        self.inner.count(kind)
    }

    fn delete(&mut self, kind: Kind, id: RecordId) -> Result<usize, CurriculumError> {
        self.inner.delete(kind, id)
    }

    fn begin(&mut self) -> Result<(), CurriculumError> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), CurriculumError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), CurriculumError> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }
}

mod rollback {
    use super::*;

    #[test]
    fn failing_kind_is_rolled_back_and_pipeline_continues() {
        // The second objective fails after the first was written.
        let mut store = FaultyStore::new(Kind::Objective, 2);
        let report = import_all(&mut store, &sample_archive()).expect("import");

        let objectives = report.kind(Kind::Objective).expect("objectives");
        assert_eq!(objectives.inserted, 0);
        assert!(
            objectives
                .fatal
                .as_deref()
                .is_some_and(|m| m.contains("disk full"))
        );
        assert_eq!(store.count(Kind::Objective).expect("count"), 0);
        assert!(!store.in_transaction());

        // Ancestors are untouched, descendants are skipped, not orphaned.
        assert_eq!(counts(&report, Kind::LearningArea), (2, 0, 0, 0));
        assert_eq!(counts(&report, Kind::SubObjective), (0, 0, 2, 0));
        assert_eq!(counts(&report, Kind::ObjectiveDescription), (0, 0, 2, 0));
        assert_referential_integrity(&store);
        assert!(report.summary().contains("FAILED"));
    }

    #[test]
    fn non_fatal_error_rolls_back_and_ends_the_run() {
        let mut store = FaultyStore::new(Kind::Objective, 1)
            .with_fault(|| CurriculumError::InvalidInput("unvalidated row".to_string()));
        let err = import_all(&mut store, &sample_archive()).expect_err("run aborted");

        assert!(matches!(err, CurriculumError::InvalidInput(_)));
        assert!(!store.in_transaction());
        assert_eq!(store.count(Kind::LearningArea).expect("count"), 2);
        assert_eq!(store.count(Kind::Objective).expect("count"), 0);
        assert_eq!(store.count(Kind::SubObjective).expect("count"), 0);
    }

    #[test]
    fn rerun_after_failure_completes_the_tree() {
        let bytes = sample_archive();
        let mut store = FaultyStore::new(Kind::Content, 1);
        import_all(&mut store, &bytes).expect("first import");
        assert_eq!(store.count(Kind::Content).expect("count"), 0);

        // The fault only hits the first content persist.
        let report = import_all(&mut store, &bytes).expect("second import");
        assert_eq!(counts(&report, Kind::Content), (2, 0, 0, 0));
        assert_eq!(counts(&report, Kind::Curriculum), (0, 2, 0, 0));

        let mut expected = MemoryStore::new();
        populate(&mut expected);
        assert_eq!(shape(&store.inner), shape(&expected));
    }
}
