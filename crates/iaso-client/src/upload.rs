//! Per-row upload protocols.
//!
//! Each function drives the full call sequence for one instance and folds
//! every platform error into an [`UploadOutcome`]; nothing here aborts the
//! batch or retries.

use tracing::{debug, warn};

use iaso_model::{RowFailure, UploadOutcome};

use crate::platform::{InstanceMetadata, InstancePatch, Platform};

/// Inputs for the create path.
pub struct CreateUpload<'a> {
    pub metadata: InstanceMetadata,
    pub file_name: &'a str,
    pub document: &'a [u8],
}

/// Create path: register instance metadata, then upload the document.
pub fn push_create(platform: &dyn Platform, upload: &CreateUpload<'_>) -> UploadOutcome {
    if let Err(error) = platform.create_instance(&upload.metadata) {
        warn!(instance = %upload.metadata.id, %error, "instance create failed");
        return UploadOutcome::Failed(error.into_row_failure());
    }
    if let Err(error) = platform.upload_document(upload.file_name, upload.document) {
        warn!(file_name = %upload.file_name, %error, "submission upload failed");
        return UploadOutcome::Failed(error.into_row_failure());
    }
    debug!(instance = %upload.metadata.id, "instance created");
    UploadOutcome::Succeeded
}

/// Inputs for the update path.
pub struct UpdateUpload<'a> {
    pub instance_id: i64,
    pub instance_uuid: &'a str,
    /// Org unit/location adjustments; skipped when empty.
    pub patch: InstancePatch,
    pub file_name: &'a str,
    pub document: &'a [u8],
}

/// Update path: check the lock flag, patch location, then replace the
/// document through an edit session.
///
/// A locked instance aborts before any write and the row is ignored, not
/// failed: the lock is a business rule, not a transient error.
pub fn push_update(platform: &dyn Platform, upload: &UpdateUpload<'_>) -> UploadOutcome {
    let status = match platform.instance_status(upload.instance_id) {
        Ok(status) => status,
        Err(error) => {
            warn!(instance_id = upload.instance_id, %error, "instance fetch failed");
            return UploadOutcome::Failed(error.into_row_failure());
        }
    };
    if status.is_locked {
        debug!(instance_id = upload.instance_id, "instance locked, skipping");
        return UploadOutcome::Ignored(RowFailure::LockedInstance);
    }

    if !upload.patch.is_empty()
        && let Err(error) = platform.patch_instance(upload.instance_id, &upload.patch)
    {
        warn!(instance_id = upload.instance_id, %error, "instance patch failed");
        return UploadOutcome::Failed(error.into_row_failure());
    }

    let session = match platform.edit_session(upload.instance_uuid) {
        Ok(session) => session,
        Err(error) => {
            warn!(instance_uuid = %upload.instance_uuid, %error, "edit token fetch failed");
            return UploadOutcome::Failed(error.into_row_failure());
        }
    };
    if let Err(error) = platform.submit_edit(&session, upload.file_name, upload.document) {
        warn!(instance_id = upload.instance_id, %error, "edit submission failed");
        return UploadOutcome::Failed(error.into_row_failure());
    }
    debug!(instance_id = upload.instance_id, "instance updated");
    UploadOutcome::Succeeded
}

/// Delete path: a single call, no document.
pub fn push_delete(platform: &dyn Platform, instance_id: i64) -> UploadOutcome {
    match platform.delete_instance(instance_id) {
        Ok(()) => {
            debug!(instance_id, "instance deleted");
            UploadOutcome::Succeeded
        }
        Err(error) => {
            warn!(instance_id, %error, "instance delete failed");
            UploadOutcome::Failed(error.into_row_failure())
        }
    }
}
