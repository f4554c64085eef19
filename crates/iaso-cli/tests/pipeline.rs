//! End-to-end pipeline tests against an in-memory platform.

use std::cell::RefCell;
use std::collections::BTreeMap;

use iaso_cli::pipeline::{ImportRequest, run_import};
use iaso_client::{
    ClientError, EditSession, InstanceMetadata, InstancePatch, InstanceStatus, Platform,
    RemoteForm,
};
use iaso_model::{
    CellValue, Choice, FormInfo, FormModel, FormVersion, ImportStrategy, Question, QuestionType,
    Row, RowSet, Summary,
};

#[derive(Default)]
struct FakePlatform {
    calls: RefCell<Vec<String>>,
    uploads: RefCell<Vec<(String, String)>>,
    locked_instances: Vec<i64>,
}

impl FakePlatform {
    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }
}

impl Platform for FakePlatform {
    fn form_info(&self, form_id: i64) -> Result<RemoteForm, ClientError> {
        Ok(RemoteForm {
            form_id,
            name: "fake".to_string(),
            latest_version_id: "1".to_string(),
        })
    }

    fn form_version(
        &self,
        _form_id: i64,
        version_id: Option<&str>,
    ) -> Result<FormVersion, ClientError> {
        Ok(FormVersion {
            version_id: version_id.unwrap_or("1").to_string(),
            questions: vec![],
            choices: vec![],
        })
    }

    fn create_instance(&self, _metadata: &InstanceMetadata) -> Result<(), ClientError> {
        self.record("create_instance");
        Ok(())
    }

    fn upload_document(&self, file_name: &str, document: &[u8]) -> Result<(), ClientError> {
        self.record("upload_document");
        self.uploads.borrow_mut().push((
            file_name.to_string(),
            String::from_utf8_lossy(document).into_owned(),
        ));
        Ok(())
    }

    fn instance_status(&self, instance_id: i64) -> Result<InstanceStatus, ClientError> {
        self.record("instance_status");
        Ok(InstanceStatus {
            is_locked: self.locked_instances.contains(&instance_id),
        })
    }

    fn patch_instance(
        &self,
        _instance_id: i64,
        _patch: &InstancePatch,
    ) -> Result<(), ClientError> {
        self.record("patch_instance");
        Ok(())
    }

    fn edit_session(&self, _instance_uuid: &str) -> Result<EditSession, ClientError> {
        self.record("edit_session");
        Ok(EditSession {
            edit_url: "https://enketo.example/edit/abc".to_string(),
            token: "tok".to_string(),
        })
    }

    fn submit_edit(
        &self,
        _session: &EditSession,
        file_name: &str,
        document: &[u8],
    ) -> Result<(), ClientError> {
        self.record("submit_edit");
        self.uploads.borrow_mut().push((
            file_name.to_string(),
            String::from_utf8_lossy(document).into_owned(),
        ));
        Ok(())
    }

    fn delete_instance(&self, _instance_id: i64) -> Result<(), ClientError> {
        self.record("delete_instance");
        Ok(())
    }
}

fn question(name: &str, qtype: QuestionType) -> Question {
    Question {
        name: name.to_string(),
        qtype,
        label: None,
        required: false,
        constraint: None,
        calculation: None,
    }
}

fn model(versions: Vec<FormVersion>, latest: &str) -> FormModel {
    FormModel {
        info: FormInfo {
            form_id: 7,
            name: "household_survey".to_string(),
            app_id: "myapp".to_string(),
            latest_version_id: latest.to_string(),
        },
        versions: versions
            .into_iter()
            .map(|version| (version.version_id.clone(), version))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn simple_model() -> FormModel {
    model(
        vec![FormVersion {
            version_id: "1".to_string(),
            questions: vec![question("name", QuestionType::Text)],
            choices: vec![],
        }],
        "1",
    )
}

fn row(cells: Vec<(&str, CellValue)>) -> Row {
    Row::new(
        cells
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

fn rowset(columns: Vec<&str>, rows: Vec<Row>) -> RowSet {
    RowSet {
        columns: columns.into_iter().map(str::to_string).collect(),
        rows,
    }
}

fn request<'a>(
    strategy: ImportStrategy,
    strict: bool,
    output_dir: &'a std::path::Path,
) -> ImportRequest<'a> {
    ImportRequest {
        strategy,
        strict_validation: strict,
        dry_run: false,
        output_dir,
        edit_user_id: Some("17"),
    }
}

fn xml_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn create_run_imports_valid_rows_and_ignores_incomplete_ones() {
    let platform = FakePlatform::default();
    let out = tempfile::tempdir().expect("tempdir");
    let rows = rowset(
        vec!["org_unit_id", "name"],
        vec![
            row(vec![
                ("org_unit_id", CellValue::Integer(42)),
                ("name", CellValue::Text("Alice".to_string())),
            ]),
            row(vec![
                ("org_unit_id", CellValue::Integer(43)),
                ("name", CellValue::Text("Bob".to_string())),
            ]),
            row(vec![
                ("org_unit_id", CellValue::Null),
                ("name", CellValue::Text("Carol".to_string())),
            ]),
        ],
    );

    let summary = run_import(
        &request(ImportStrategy::Create, false, out.path()),
        &simple_model(),
        &rows,
        &platform,
    )
    .expect("run");

    assert_eq!(
        summary,
        Summary {
            imported: 2,
            updated: 0,
            ignored: 1,
            deleted: 0,
        }
    );
    assert_eq!(summary.total(), 3);

    // Two documents under creates/, none for the ignored row.
    assert_eq!(xml_files(&out.path().join("creates")).len(), 2);

    // Each create ran the two-call sequence.
    assert_eq!(
        platform.calls(),
        vec![
            "create_instance",
            "upload_document",
            "create_instance",
            "upload_document"
        ]
    );

    // Uploaded documents carry the canonical instance id and the form id.
    for (_, document) in platform.uploads() {
        assert!(document.contains("<instanceID>uuid:"), "{document}");
        assert!(document.contains(r#"id="7""#));
        assert!(document.contains("<name>"));
    }

    // summary.json mirrors the counters.
    let written = std::fs::read_to_string(out.path().join("summary.json")).expect("summary.json");
    let parsed: Summary = serde_json::from_str(&written).expect("parse summary");
    assert_eq!(parsed, summary);
}

#[test]
fn versioned_run_validates_each_row_against_its_own_version() {
    let platform = FakePlatform::default();
    let out = tempfile::tempdir().expect("tempdir");

    let fruit_question = Question {
        name: "fruit".to_string(),
        qtype: QuestionType::SelectOne("fruits".to_string()),
        label: None,
        required: false,
        constraint: None,
        calculation: None,
    };
    let v1 = FormVersion {
        version_id: "1".to_string(),
        questions: vec![fruit_question.clone()],
        choices: vec![Choice {
            list_name: "fruits".to_string(),
            value: "apple".to_string(),
            label: None,
        }],
    };
    let v2 = FormVersion {
        version_id: "2".to_string(),
        questions: vec![fruit_question],
        choices: vec![
            Choice {
                list_name: "fruits".to_string(),
                value: "apple".to_string(),
                label: None,
            },
            Choice {
                list_name: "fruits".to_string(),
                value: "mango".to_string(),
                label: None,
            },
        ],
    };
    let model = model(vec![v1, v2], "2");

    let rows = rowset(
        vec!["org_unit_id", "form_version", "fruit"],
        vec![
            // mango is not a valid choice in version 1.
            row(vec![
                ("org_unit_id", CellValue::Integer(42)),
                ("form_version", CellValue::Text("1".to_string())),
                ("fruit", CellValue::Text("mango".to_string())),
            ]),
            // but it is in version 2.
            row(vec![
                ("org_unit_id", CellValue::Integer(43)),
                ("form_version", CellValue::Text("2".to_string())),
                ("fruit", CellValue::Text("mango".to_string())),
            ]),
        ],
    );

    let summary = run_import(
        &request(ImportStrategy::Create, true, out.path()),
        &model,
        &rows,
        &platform,
    )
    .expect("run");

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.ignored, 1);

    let uploads = platform.uploads();
    assert_eq!(uploads.len(), 1);
    // The surviving row rendered through its own version's template.
    assert!(uploads[0].1.contains(r#"version="2""#), "{}", uploads[0].1);
}

#[test]
fn unknown_version_rows_are_ignored_not_fatal() {
    let platform = FakePlatform::default();
    let out = tempfile::tempdir().expect("tempdir");
    let rows = rowset(
        vec!["org_unit_id", "form_version", "name"],
        vec![
            row(vec![
                ("org_unit_id", CellValue::Integer(42)),
                ("form_version", CellValue::Text("99".to_string())),
                ("name", CellValue::Text("Alice".to_string())),
            ]),
            row(vec![
                ("org_unit_id", CellValue::Integer(43)),
                ("form_version", CellValue::Text("1".to_string())),
                ("name", CellValue::Text("Bob".to_string())),
            ]),
        ],
    );

    let summary = run_import(
        &request(ImportStrategy::Create, false, out.path()),
        &simple_model(),
        &rows,
        &platform,
    )
    .expect("run");

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.ignored, 1);
}

#[test]
fn locked_instance_is_ignored_without_writes_or_output() {
    let platform = FakePlatform {
        locked_instances: vec![981],
        ..FakePlatform::default()
    };
    let out = tempfile::tempdir().expect("tempdir");
    let rows = rowset(
        vec!["id", "instanceID", "org_unit_id", "name"],
        vec![
            row(vec![
                ("id", CellValue::Integer(981)),
                ("instanceID", CellValue::Text("uuid:4b7c".to_string())),
                ("org_unit_id", CellValue::Integer(42)),
                ("name", CellValue::Text("Alice".to_string())),
            ]),
            row(vec![
                ("id", CellValue::Integer(982)),
                ("instanceID", CellValue::Text("5c8d".to_string())),
                ("org_unit_id", CellValue::Integer(42)),
                ("name", CellValue::Text("Bob".to_string())),
            ]),
        ],
    );

    let summary = run_import(
        &request(ImportStrategy::Update, false, out.path()),
        &simple_model(),
        &rows,
        &platform,
    )
    .expect("run");

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.ignored, 1);

    // The locked row stopped after the status read; the other row ran the
    // full patch + edit sequence.
    assert_eq!(
        platform.calls(),
        vec![
            "instance_status",
            "instance_status",
            "patch_instance",
            "edit_session",
            "submit_edit"
        ]
    );

    // Only the updated row produced a document.
    let files = xml_files(&out.path().join("updates"));
    assert_eq!(files.len(), 1);
    assert!(files[0].file_name().is_some_and(|name| name == "5c8d.xml"));
}

#[test]
fn delete_run_counts_deletions_and_produces_no_files() {
    let platform = FakePlatform::default();
    let out = tempfile::tempdir().expect("tempdir");
    let rows = rowset(
        vec!["id"],
        vec![
            row(vec![("id", CellValue::Integer(1))]),
            row(vec![("id", CellValue::Integer(2))]),
            row(vec![("id", CellValue::Null)]),
        ],
    );

    let summary = run_import(
        &request(ImportStrategy::Delete, false, out.path()),
        &simple_model(),
        &rows,
        &platform,
    )
    .expect("run");

    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.ignored, 1);
    assert_eq!(platform.calls(), vec!["delete_instance", "delete_instance"]);
    assert!(xml_files(&out.path().join("creates")).is_empty());
    assert!(xml_files(&out.path().join("updates")).is_empty());
}

#[test]
fn create_and_update_splits_rows_by_id() {
    let platform = FakePlatform::default();
    let out = tempfile::tempdir().expect("tempdir");
    let rows = rowset(
        vec!["id", "instanceID", "org_unit_id", "name"],
        vec![
            row(vec![
                ("id", CellValue::Null),
                ("instanceID", CellValue::Null),
                ("org_unit_id", CellValue::Integer(42)),
                ("name", CellValue::Text("Alice".to_string())),
            ]),
            row(vec![
                ("id", CellValue::Integer(981)),
                ("instanceID", CellValue::Text("4b7c".to_string())),
                ("org_unit_id", CellValue::Integer(42)),
                ("name", CellValue::Text("Bob".to_string())),
            ]),
        ],
    );

    let summary = run_import(
        &request(ImportStrategy::CreateAndUpdate, false, out.path()),
        &simple_model(),
        &rows,
        &platform,
    )
    .expect("run");

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(xml_files(&out.path().join("creates")).len(), 1);
    assert_eq!(xml_files(&out.path().join("updates")).len(), 1);

    // The updated document carries the re-submission marker and edit user.
    let uploads = platform.uploads();
    let updated = &uploads.last().expect("update upload").1;
    assert!(updated.contains(r#"iasoInstance="981""#), "{updated}");
    assert!(updated.contains("<editUserID>17</editUserID>"));
}

#[test]
fn dry_run_touches_neither_network_nor_disk() {
    let platform = FakePlatform::default();
    let out = tempfile::tempdir().expect("tempdir");
    let output_dir = out.path().join("never-created");
    let rows = rowset(
        vec!["org_unit_id", "name"],
        vec![
            row(vec![
                ("org_unit_id", CellValue::Integer(42)),
                ("name", CellValue::Text("Alice".to_string())),
            ]),
            row(vec![
                ("org_unit_id", CellValue::Null),
                ("name", CellValue::Text("Carol".to_string())),
            ]),
        ],
    );

    let request = ImportRequest {
        strategy: ImportStrategy::Create,
        strict_validation: false,
        dry_run: true,
        output_dir: &output_dir,
        edit_user_id: None,
    };
    let summary = run_import(&request, &simple_model(), &rows, &platform).expect("run");

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.ignored, 1);
    assert!(platform.calls().is_empty());
    assert!(!output_dir.exists());
}
