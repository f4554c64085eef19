//! Per-version document skeletons.
//!
//! A skeleton fixes the element order of one form version, restricted to the
//! columns the input file actually carries. Building it walks the question
//! list once; rows then only fill values, so the skeleton is cached per
//! version for the lifetime of the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use iaso_model::FormVersion;

/// Ordered element layout for one form version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSkeleton {
    /// Root `id` attribute: the platform's form identifier.
    pub form_id: String,
    /// Root `version` attribute.
    pub version_id: String,
    /// Wrapping group element, when the form opens with a `begin group`.
    pub group: Option<String>,
    /// Question columns to emit, in the form's declared order.
    pub fields: Vec<String>,
}

/// Build the skeleton for one version against the input column set.
///
/// Columns the version does not know are dropped silently; question order is
/// the version's, not the file's.
pub fn build_skeleton(form_id: &str, version: &FormVersion, columns: &[String]) -> DocumentSkeleton {
    let fields = version
        .questions
        .iter()
        .filter(|question| question.qtype.is_value_bearing())
        .filter(|question| columns.iter().any(|column| *column == question.name))
        .map(|question| question.name.clone())
        .collect();

    DocumentSkeleton {
        form_id: form_id.to_string(),
        version_id: version.version_id.clone(),
        group: version.group_name().map(str::to_string),
        fields,
    }
}

/// Skeleton cache keyed by version identifier.
///
/// Owned by a single pipeline run and dropped with it; the cache is never a
/// process-wide singleton.
#[derive(Debug, Default)]
pub struct TemplateCache {
    skeletons: BTreeMap<String, Arc<DocumentSkeleton>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the skeleton for a version, building it on first use.
    pub fn get_or_build(
        &mut self,
        form_id: &str,
        version: &FormVersion,
        columns: &[String],
    ) -> Arc<DocumentSkeleton> {
        if let Some(skeleton) = self.skeletons.get(&version.version_id) {
            return Arc::clone(skeleton);
        }
        debug!(version_id = %version.version_id, "building document skeleton");
        let skeleton = Arc::new(build_skeleton(form_id, version, columns));
        self.skeletons
            .insert(version.version_id.clone(), Arc::clone(&skeleton));
        skeleton
    }

    pub fn len(&self) -> usize {
        self.skeletons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }
}
