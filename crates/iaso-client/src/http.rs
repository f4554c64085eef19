//! Blocking HTTP implementation of [`Platform`].
//!
//! One network call per method, transport-default timeouts, no retries:
//! failed calls surface as errors for the caller to fold into per-row
//! outcomes.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use tracing::debug;

use iaso_model::FormVersion;

use crate::auth::Session;
use crate::error::ClientError;
use crate::platform::{
    EditSession, InstanceMetadata, InstancePatch, InstanceStatus, Platform, RemoteForm,
};
use crate::workbook::parse_form_version;

pub struct IasoClient {
    http: Client,
    base_url: String,
    token: String,
    app_id: Option<String>,
}

impl IasoClient {
    pub fn new(session: &Session) -> Self {
        Self {
            http: Client::new(),
            base_url: session.base_url.clone(),
            token: session.token.clone(),
            app_id: None,
        }
    }

    /// Attach the app id used by the instances endpoint.
    #[must_use]
    pub fn with_app_id(mut self, app_id: &str) -> Self {
        self.app_id = Some(app_id.to_string());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(&self.token)
    }

    /// Resolve a project's `app_id`.
    pub fn project_app_id(&self, project_id: i64) -> Result<String, ClientError> {
        let response = self
            .get(&format!("/api/projects/{project_id}"))
            .query(&[("fields", "app_id")])
            .send()?;
        let payload: Value = expect_success(response, "project fetch")?.json()?;
        match payload.get("app_id").and_then(Value::as_str) {
            Some(app_id) if !app_id.is_empty() => Ok(app_id.to_string()),
            _ => Err(ClientError::Payload(format!(
                "project {project_id} has no app_id"
            ))),
        }
    }

    /// Check the user may update submissions for the given app.
    pub fn user_may_import(&self, app_id: &str) -> Result<bool, ClientError> {
        let response = self.get("/api/profiles/me/").send()?;
        let payload: Value = expect_success(response, "profile fetch")?.json()?;

        let has_permission = ["permissions", "user_permissions"].iter().any(|key| {
            permission_set(payload.get(*key))
                .iter()
                .any(|permission| permission == "iaso_update_submission")
        });

        let account = payload.get("account");
        let has_account = match account {
            Some(Value::Object(map)) => map.get("name").and_then(Value::as_str) == Some(app_id),
            Some(Value::Array(entries)) => entries
                .iter()
                .any(|entry| entry.get("name").and_then(Value::as_str) == Some(app_id)),
            _ => false,
        };

        Ok(has_permission && has_account)
    }

    fn fetch_workbook(&self, url: &str, version_id: &str) -> Result<FormVersion, ClientError> {
        debug!(version_id, url, "fetching form definition workbook");
        // Workbook URLs point at object storage; no bearer token expected.
        let response = self.http.get(url).send()?;
        let bytes = expect_success(response, "workbook fetch")?.bytes()?;
        parse_form_version(&bytes, version_id)
    }

    fn latest_version_pointer(&self, form_id: i64) -> Result<(String, String), ClientError> {
        let response = self
            .get(&format!("/api/forms/{form_id}"))
            .query(&[("fields", "latest_form_version")])
            .send()?;
        if response.status().as_u16() == 404 {
            return Err(ClientError::NotFound(format!("form {form_id}")));
        }
        let payload: Value = expect_success(response, "form fetch")?.json()?;
        let latest = payload
            .get("latest_form_version")
            .ok_or_else(|| ClientError::Payload(format!("form {form_id} has no versions")))?;
        let version_id = text_field(latest, "version_id")
            .ok_or_else(|| ClientError::Payload("latest version has no version_id".to_string()))?;
        let xls_url = text_field(latest, "xls_file")
            .ok_or_else(|| ClientError::Payload("latest version has no xls_file".to_string()))?;
        Ok((version_id, xls_url))
    }
}

impl Platform for IasoClient {
    fn form_info(&self, form_id: i64) -> Result<RemoteForm, ClientError> {
        let response = self
            .get(&format!("/api/forms/{form_id}"))
            .query(&[("fields", "name,latest_form_version")])
            .send()?;
        if response.status().as_u16() == 404 {
            return Err(ClientError::NotFound(format!("form {form_id}")));
        }
        let payload: Value = expect_success(response, "form fetch")?.json()?;
        let name = text_field(&payload, "name")
            .ok_or_else(|| ClientError::Payload(format!("form {form_id} has no name")))?;
        let latest_version_id = payload
            .get("latest_form_version")
            .and_then(|latest| text_field(latest, "version_id"))
            .ok_or_else(|| ClientError::Payload(format!("form {form_id} has no versions")))?;
        Ok(RemoteForm {
            form_id,
            name,
            latest_version_id,
        })
    }

    fn form_version(
        &self,
        form_id: i64,
        version_id: Option<&str>,
    ) -> Result<FormVersion, ClientError> {
        match version_id {
            None => {
                let (latest_id, xls_url) = self.latest_version_pointer(form_id)?;
                self.fetch_workbook(&xls_url, &latest_id)
            }
            Some(version_id) => {
                let response = self
                    .get("/api/formversions/")
                    .query(&[
                        ("form_id", form_id.to_string().as_str()),
                        ("version_id", version_id),
                        ("fields", "xls_file"),
                    ])
                    .send()?;
                let payload: Value = expect_success(response, "form versions fetch")?.json()?;
                let xls_url = payload
                    .get("form_versions")
                    .and_then(Value::as_array)
                    .and_then(|versions| {
                        versions
                            .iter()
                            .find_map(|version| text_field(version, "xls_file"))
                    });
                match xls_url {
                    Some(url) => self.fetch_workbook(&url, version_id),
                    None => Err(ClientError::NotFound(format!("form version {version_id}"))),
                }
            }
        }
    }

    fn create_instance(&self, metadata: &InstanceMetadata) -> Result<(), ClientError> {
        let mut request = self
            .http
            .post(self.url("/api/instances"))
            .bearer_auth(&self.token)
            .json(&[metadata]);
        if let Some(app_id) = &self.app_id {
            request = request.query(&[("app_id", app_id.as_str())]);
        }
        expect_success(request.send()?, "instance create").map(|_| ())
    }

    fn upload_document(&self, file_name: &str, document: &[u8]) -> Result<(), ClientError> {
        let part = Part::bytes(document.to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/xml")?;
        let form = Form::new().part("xml_submission_file", part);
        let response = self
            .http
            .post(self.url("/sync/form_upload/"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()?;
        let response = expect_status(response, "submission upload", &[201])?;
        let payload: Value = response.json()?;
        match payload.get("result").and_then(Value::as_str) {
            Some("success") => Ok(()),
            other => Err(ClientError::Payload(format!(
                "upload result was {other:?}, expected \"success\""
            ))),
        }
    }

    fn instance_status(&self, instance_id: i64) -> Result<InstanceStatus, ClientError> {
        let response = self.get(&format!("/api/instances/{instance_id}")).send()?;
        let status: InstanceStatus =
            expect_success(response, "instance fetch")?.json()?;
        Ok(status)
    }

    fn patch_instance(&self, instance_id: i64, patch: &InstancePatch) -> Result<(), ClientError> {
        let response = self
            .http
            .patch(self.url(&format!("/api/instances/{instance_id}")))
            .bearer_auth(&self.token)
            .json(patch)
            .send()?;
        expect_success(response, "instance patch").map(|_| ())
    }

    fn edit_session(&self, instance_uuid: &str) -> Result<EditSession, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/api/enketo/edit/{instance_uuid}")))
            .bearer_auth(&self.token)
            .send()?;
        let payload: Value = expect_success(response, "edit token fetch")?.json()?;
        let edit_url = text_field(&payload, "edit_url")
            .or_else(|| text_field(&payload, "url"))
            .ok_or_else(|| ClientError::Payload("edit response has no edit_url".to_string()))?;
        let token = text_field(&payload, "token")
            .ok_or_else(|| ClientError::Payload("edit response has no token".to_string()))?;
        Ok(EditSession { edit_url, token })
    }

    fn submit_edit(
        &self,
        session: &EditSession,
        file_name: &str,
        document: &[u8],
    ) -> Result<(), ClientError> {
        let part = Part::bytes(document.to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/xml")?;
        let form = Form::new().part("xml_submission_file", part);
        let url = format!(
            "{}/submission/{}",
            session.edit_url.trim_end_matches('/'),
            session.token
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()?;
        expect_success(response, "edit submission").map(|_| ())
    }

    fn delete_instance(&self, instance_id: i64) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/api/instances/{instance_id}")))
            .bearer_auth(&self.token)
            .send()?;
        expect_status(response, "instance delete", &[200, 201, 204]).map(|_| ())
    }
}

fn expect_success(response: Response, context: &'static str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ClientError::Status {
        context,
        status: status.as_u16(),
        body,
    })
}

fn expect_status(
    response: Response,
    context: &'static str,
    accepted: &[u16],
) -> Result<Response, ClientError> {
    let status = response.status().as_u16();
    if accepted.contains(&status) {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ClientError::Status {
        context,
        status,
        body,
    })
}

/// Permission names from a payload field that may be a list or a map.
fn permission_set(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// String view of a field that may be serialized as string or number.
fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
