//! Form model loading.
//!
//! Fetches the target form's identity and the version definitions the run
//! needs: the latest version always, plus every version the input file
//! references. Versions are fetched once and cached in the model.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::{info, warn};

use iaso_model::{FormInfo, FormModel, ImportError};

use crate::error::ClientError;
use crate::platform::Platform;

/// Normalize a form name for directory and file use: drop special
/// characters, collapse spaces to underscores, lowercase.
pub fn sanitize_form_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || *ch == '-' || *ch == '_')
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Load the form model for one run.
///
/// `requested_versions` is the set of distinct `form_version` values in the
/// input. Versions the platform does not know are skipped with a warning;
/// rows referencing them are later ignored, not fatal to the run.
pub fn load_form_model(
    platform: &dyn Platform,
    form_id: i64,
    app_id: &str,
    requested_versions: &BTreeSet<String>,
) -> Result<FormModel, ImportError> {
    let remote = platform.form_info(form_id).map_err(|error| match error {
        ClientError::NotFound(_) => ImportError::FormNotFound(form_id),
        other => ImportError::Message(other.to_string()),
    })?;

    let info = FormInfo {
        form_id: remote.form_id,
        name: sanitize_form_name(&remote.name),
        app_id: app_id.to_string(),
        latest_version_id: remote.latest_version_id.clone(),
    };

    let mut versions = BTreeMap::new();
    let latest = platform
        .form_version(form_id, None)
        .map_err(|error| ImportError::Message(error.to_string()))?;
    versions.insert(latest.version_id.clone(), latest);

    for version_id in requested_versions {
        if versions.contains_key(version_id) {
            continue;
        }
        match platform.form_version(form_id, Some(version_id)) {
            Ok(version) => {
                versions.insert(version_id.clone(), version);
            }
            Err(ClientError::NotFound(_)) => {
                warn!(version_id = %version_id, "form version not found; its rows will be ignored");
            }
            Err(error) => return Err(ImportError::Message(error.to_string())),
        }
    }

    info!(
        form_id,
        form_name = %info.name,
        version_count = versions.len(),
        latest_version = %info.latest_version_id,
        "form model loaded"
    );
    Ok(FormModel { info, versions })
}
