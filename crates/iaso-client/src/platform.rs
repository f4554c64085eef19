//! The platform seam.
//!
//! Everything the pipeline needs from the remote platform, as one trait.
//! The HTTP implementation lives in [`crate::http`]; tests drive the
//! pipeline against an in-memory fake.

use serde::{Deserialize, Serialize};

use iaso_model::FormVersion;

use crate::error::ClientError;

/// Form identity as returned by the forms endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteForm {
    pub form_id: i64,
    pub name: String,
    pub latest_version_id: String,
}

/// Instance metadata posted ahead of a create upload.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceMetadata {
    /// Instance UUID; doubles as the client-side identifier.
    pub id: String,
    #[serde(rename = "orgUnitId")]
    pub org_unit_id: i64,
    pub created_at: i64,
    #[serde(rename = "formId")]
    pub form_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: f64,
    pub accuracy: f64,
    pub file: String,
    pub name: String,
    pub period: i32,
}

/// Org-unit/location fields adjustable on an existing instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl InstancePatch {
    pub fn is_empty(&self) -> bool {
        self.org_unit_id.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.altitude.is_none()
            && self.accuracy.is_none()
    }
}

/// Remote-side state relevant before editing an instance.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InstanceStatus {
    #[serde(default)]
    pub is_locked: bool,
}

/// Short-lived edit credential returned by the enketo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EditSession {
    pub edit_url: String,
    pub token: String,
}

/// Blocking platform operations, one network call each.
pub trait Platform {
    /// Resolve a form's name and latest version id.
    fn form_info(&self, form_id: i64) -> Result<RemoteForm, ClientError>;

    /// Fetch and parse one form version's question and choice definitions.
    /// `None` fetches the latest version.
    fn form_version(
        &self,
        form_id: i64,
        version_id: Option<&str>,
    ) -> Result<FormVersion, ClientError>;

    /// Register instance metadata ahead of a create upload.
    fn create_instance(&self, metadata: &InstanceMetadata) -> Result<(), ClientError>;

    /// Upload a submission document (create path).
    fn upload_document(&self, file_name: &str, document: &[u8]) -> Result<(), ClientError>;

    /// Fetch the lock state of an existing instance.
    fn instance_status(&self, instance_id: i64) -> Result<InstanceStatus, ClientError>;

    /// Adjust org unit/location on an existing instance.
    fn patch_instance(&self, instance_id: i64, patch: &InstancePatch) -> Result<(), ClientError>;

    /// Obtain an edit token/URL for an existing instance.
    fn edit_session(&self, instance_uuid: &str) -> Result<EditSession, ClientError>;

    /// Replace an instance's document through an edit session.
    fn submit_edit(
        &self,
        session: &EditSession,
        file_name: &str,
        document: &[u8],
    ) -> Result<(), ClientError>;

    /// Delete an instance by its numeric id.
    fn delete_instance(&self, instance_id: i64) -> Result<(), ClientError>;
}
