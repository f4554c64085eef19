//! Form model loading tests.

use std::collections::BTreeSet;

use iaso_client::{
    ClientError, EditSession, InstanceMetadata, InstancePatch, InstanceStatus, Platform,
    RemoteForm, load_form_model, sanitize_form_name, user_id_from_jwt,
};
use iaso_model::{FormVersion, ImportError};

struct FakePlatform {
    known_versions: Vec<String>,
    form_exists: bool,
}

impl Platform for FakePlatform {
    fn form_info(&self, form_id: i64) -> Result<RemoteForm, ClientError> {
        if !self.form_exists {
            return Err(ClientError::NotFound(format!("form {form_id}")));
        }
        Ok(RemoteForm {
            form_id,
            name: "Épi Survey (v2)!".to_string(),
            latest_version_id: "2024091201".to_string(),
        })
    }

    fn form_version(
        &self,
        _form_id: i64,
        version_id: Option<&str>,
    ) -> Result<FormVersion, ClientError> {
        let version_id = version_id.unwrap_or("2024091201");
        if !self.known_versions.iter().any(|known| known == version_id) {
            return Err(ClientError::NotFound(format!("form version {version_id}")));
        }
        Ok(FormVersion {
            version_id: version_id.to_string(),
            questions: vec![],
            choices: vec![],
        })
    }

    fn create_instance(&self, _metadata: &InstanceMetadata) -> Result<(), ClientError> {
        unreachable!("loader never creates instances")
    }

    fn upload_document(&self, _file_name: &str, _document: &[u8]) -> Result<(), ClientError> {
        unreachable!("loader never uploads")
    }

    fn instance_status(&self, _instance_id: i64) -> Result<InstanceStatus, ClientError> {
        unreachable!("loader never reads instances")
    }

    fn patch_instance(
        &self,
        _instance_id: i64,
        _patch: &InstancePatch,
    ) -> Result<(), ClientError> {
        unreachable!("loader never patches")
    }

    fn edit_session(&self, _instance_uuid: &str) -> Result<EditSession, ClientError> {
        unreachable!("loader never edits")
    }

    fn submit_edit(
        &self,
        _session: &EditSession,
        _file_name: &str,
        _document: &[u8],
    ) -> Result<(), ClientError> {
        unreachable!("loader never edits")
    }

    fn delete_instance(&self, _instance_id: i64) -> Result<(), ClientError> {
        unreachable!("loader never deletes")
    }
}

#[test]
fn loads_latest_plus_requested_versions() {
    let platform = FakePlatform {
        known_versions: vec!["2024091201".to_string(), "2023050801".to_string()],
        form_exists: true,
    };
    let requested: BTreeSet<String> = ["2023050801".to_string()].into();

    let model = load_form_model(&platform, 7, "myapp", &requested).expect("load");
    assert_eq!(model.info.form_id, 7);
    assert_eq!(model.info.app_id, "myapp");
    assert_eq!(model.versions.len(), 2);
    assert!(model.resolve(Some("2023050801")).is_some());
    assert!(model.resolve(None).is_some());
    assert_eq!(
        model.resolve(None).unwrap().version_id,
        "2024091201"
    );
}

#[test]
fn unknown_requested_version_is_skipped_not_fatal() {
    let platform = FakePlatform {
        known_versions: vec!["2024091201".to_string()],
        form_exists: true,
    };
    let requested: BTreeSet<String> = ["1999010101".to_string()].into();

    let model = load_form_model(&platform, 7, "myapp", &requested).expect("load");
    assert_eq!(model.versions.len(), 1);
    // Rows referencing the unknown version resolve to nothing and get ignored.
    assert!(model.resolve(Some("1999010101")).is_none());
}

#[test]
fn missing_form_is_fatal() {
    let platform = FakePlatform {
        known_versions: vec![],
        form_exists: false,
    };
    let error = load_form_model(&platform, 7, "myapp", &BTreeSet::new()).expect_err("not found");
    assert!(matches!(error, ImportError::FormNotFound(7)));
}

#[test]
fn form_names_are_sanitized_for_directories() {
    let platform = FakePlatform {
        known_versions: vec!["2024091201".to_string()],
        form_exists: true,
    };
    let model = load_form_model(&platform, 7, "myapp", &BTreeSet::new()).expect("load");
    assert_eq!(model.info.name, "épi_survey_v2");
}

#[test]
fn sanitize_strips_specials_and_lowercases() {
    assert_eq!(sanitize_form_name("My Form (v2)!"), "my_form_v2");
    assert_eq!(sanitize_form_name("  spaced   out  "), "spaced_out");
    assert_eq!(sanitize_form_name("keep-dash_and_underscore"), "keep-dash_and_underscore");
}

#[test]
fn jwt_user_id_decoding() {
    assert_eq!(
        user_id_from_jwt("x.eyJ1c2VyX2lkIjoxN30.y").as_deref(),
        Some("17")
    );
    assert_eq!(
        user_id_from_jwt("x.eyJzdWIiOiJ1LTE3In0.y").as_deref(),
        Some("u-17")
    );
    assert_eq!(user_id_from_jwt("not-a-jwt"), None);
}
