//! The sequential import pipeline.
//!
//! Rows flow through routing, schema validation, constraint evaluation,
//! templating, enrichment and upload, one row at a time; every per-row
//! failure folds into the summary and the next row starts. The per-version
//! template and constraint caches live exactly as long as one run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use iaso_client::{
    CreateUpload, InstanceMetadata, InstancePatch, Platform, UpdateUpload, push_create,
    push_delete, push_update,
};
use iaso_model::{
    FormModel, FormVersion, ImportStrategy, Row, RowAction, RowFailure, RowSet, Summary,
    UploadOutcome, classify,
};
use iaso_validate::{
    ConstraintSet, apply_question_casts, check_structure, fill_calculated_columns,
    validate_row_schema,
};
use iaso_xml::{EnrichOptions, TemplateCache, canonical_instance_id, render_document};

/// Parameters of one import run.
pub struct ImportRequest<'a> {
    pub strategy: ImportStrategy,
    pub strict_validation: bool,
    pub dry_run: bool,
    pub output_dir: &'a Path,
    /// User id recorded on updated documents.
    pub edit_user_id: Option<&'a str>,
}

/// Run the import over all rows and return the final counters.
///
/// Fatal errors (unwritable output directory) only occur before the first
/// row; once the loop starts, the run always completes.
pub fn run_import(
    request: &ImportRequest<'_>,
    model: &FormModel,
    rows: &RowSet,
    platform: &dyn Platform,
) -> Result<Summary> {
    let latest = model
        .latest()
        .context("form model carries no version definitions")?;

    // Table-level preparation against the latest version: calculated
    // columns, structure report, type casts.
    let rows = fill_calculated_columns(rows, latest);
    let report = check_structure(&rows, latest, request.strategy);
    for warning in &report.warnings {
        warn!("{warning}");
    }
    for column in &report.missing_columns {
        error!(column = %column, "required column missing; affected rows will be ignored");
    }
    let rows = apply_question_casts(&rows, &report);

    let output = OutputWriter::new(request.output_dir, request.strategy, request.dry_run)?;

    info!(
        strategy = %request.strategy,
        record_count = rows.len(),
        strict = request.strict_validation,
        dry_run = request.dry_run,
        "pushing submissions"
    );

    let mut run = RunState {
        request,
        model,
        columns: rows.columns.clone(),
        templates: TemplateCache::new(),
        constraint_sets: BTreeMap::new(),
        output,
    };
    let mut summary = Summary::default();

    for (index, row) in rows.rows.iter().enumerate() {
        let row_number = index + 1;
        let action = classify(row, request.strategy);
        let outcome = run.process_row(platform, row, &action);
        record(&mut summary, &action, outcome, row_number);
    }

    info!(
        imported = summary.imported,
        updated = summary.updated,
        ignored = summary.ignored,
        deleted = summary.deleted,
        "push finished"
    );
    debug_assert_eq!(summary.total(), rows.len() as u64);

    run.output.write_summary(&summary)?;
    Ok(summary)
}

/// Everything that lives across rows: the request, the form model, and the
/// per-version caches.
struct RunState<'a> {
    request: &'a ImportRequest<'a>,
    model: &'a FormModel,
    columns: Vec<String>,
    templates: TemplateCache,
    constraint_sets: BTreeMap<String, ConstraintSet>,
    output: OutputWriter,
}

struct PreparedDocument {
    /// Bare UUID, without the `uuid:` prefix.
    uuid: String,
    xml: String,
}

impl RunState<'_> {
    fn process_row(
        &mut self,
        platform: &dyn Platform,
        row: &Row,
        action: &RowAction,
    ) -> UploadOutcome {
        match action {
            RowAction::Ignored(reason) => UploadOutcome::Ignored(reason.clone()),
            RowAction::Delete { id } => {
                if self.request.dry_run {
                    return UploadOutcome::Succeeded;
                }
                push_delete(platform, *id)
            }
            RowAction::Create | RowAction::Update { .. } => {
                match self.prepare_document(row, action) {
                    Ok(document) => self.push_document(platform, row, action, &document),
                    Err(reason) => UploadOutcome::Ignored(reason),
                }
            }
        }
    }

    /// Validate the row and render its document. Any failure here ignores
    /// the row before a single network call is made.
    fn prepare_document(
        &mut self,
        row: &Row,
        action: &RowAction,
    ) -> std::result::Result<PreparedDocument, RowFailure> {
        let requested_version = row.form_version();
        let Some(version) = self.model.resolve(requested_version.as_deref()) else {
            return Err(RowFailure::VersionNotFound(
                requested_version.unwrap_or_default(),
            ));
        };

        validate_row_schema(row, action, version, self.request.strict_validation)?;
        check_constraints(
            &mut self.constraint_sets,
            version,
            row,
            self.request.strict_validation,
        )?;

        let skeleton = self.templates.get_or_build(
            &self.model.info.form_id.to_string(),
            version,
            &self.columns,
        );

        let (uuid, edit_user_id, iaso_instance_id) = match action {
            RowAction::Update { id, instance_uuid } => {
                let canonical = canonical_instance_id(instance_uuid);
                let bare = canonical.trim_start_matches("uuid:").to_string();
                (bare, self.request.edit_user_id, Some(*id))
            }
            _ => (Uuid::new_v4().to_string(), None, None),
        };
        let options = EnrichOptions {
            instance_uuid: &uuid,
            edit_user_id,
            iaso_instance_id,
        };

        let xml = render_document(&skeleton, row, options)
            .map_err(|error| RowFailure::Transport(format!("document rendering failed: {error}")))?;
        Ok(PreparedDocument { uuid, xml })
    }

    fn push_document(
        &self,
        platform: &dyn Platform,
        row: &Row,
        action: &RowAction,
        document: &PreparedDocument,
    ) -> UploadOutcome {
        let file_name = format!("{}.xml", document.uuid);

        if self.request.dry_run {
            return UploadOutcome::Succeeded;
        }

        let outcome = match action {
            RowAction::Create => {
                let file_path = self.output.planned_path(action, &file_name);
                let metadata = InstanceMetadata {
                    id: document.uuid.clone(),
                    org_unit_id: row.org_unit_id().unwrap_or_default(),
                    created_at: Utc::now().timestamp(),
                    form_id: self.model.info.form_id,
                    latitude: row.latitude(),
                    longitude: row.longitude(),
                    altitude: row.altitude().unwrap_or(0.0),
                    accuracy: row.accuracy().unwrap_or(0.0),
                    file: file_path.display().to_string(),
                    name: file_name.clone(),
                    period: Utc::now().year(),
                };
                push_create(
                    platform,
                    &CreateUpload {
                        metadata,
                        file_name: &file_name,
                        document: document.xml.as_bytes(),
                    },
                )
            }
            RowAction::Update { id, .. } => push_update(
                platform,
                &UpdateUpload {
                    instance_id: *id,
                    instance_uuid: &document.uuid,
                    patch: patch_from_row(row),
                    file_name: &file_name,
                    document: document.xml.as_bytes(),
                },
            ),
            _ => unreachable!("only create/update reach push_document"),
        };

        if outcome == UploadOutcome::Succeeded
            && let Err(error) = self.output.persist(action, &file_name, &document.xml)
        {
            error!(file_name = %file_name, %error, "failed to persist generated document");
        }
        outcome
    }
}

fn check_constraints(
    constraint_sets: &mut BTreeMap<String, ConstraintSet>,
    version: &FormVersion,
    row: &Row,
    strict: bool,
) -> std::result::Result<(), RowFailure> {
    let set = constraint_sets
        .entry(version.version_id.clone())
        .or_insert_with(|| ConstraintSet::compile(version));
    let failing = set.failing_fields(row);
    if failing.is_empty() {
        return Ok(());
    }
    if strict {
        return Err(RowFailure::ConstraintViolation(failing));
    }
    debug!(fields = ?failing, "constraint violations tolerated (strict validation off)");
    Ok(())
}

fn patch_from_row(row: &Row) -> InstancePatch {
    InstancePatch {
        org_unit_id: row.org_unit_id(),
        latitude: row.latitude(),
        longitude: row.longitude(),
        altitude: row.altitude(),
        accuracy: row.accuracy(),
    }
}

fn record(summary: &mut Summary, action: &RowAction, outcome: UploadOutcome, row_number: usize) {
    match outcome {
        UploadOutcome::Succeeded => match action {
            RowAction::Create => summary.imported += 1,
            RowAction::Update { .. } => summary.updated += 1,
            RowAction::Delete { .. } => summary.deleted += 1,
            RowAction::Ignored(_) => summary.ignored += 1,
        },
        UploadOutcome::Ignored(reason) => {
            warn!(row = row_number, %reason, "row ignored");
            summary.ignored += 1;
        }
        UploadOutcome::Failed(reason) => {
            error!(row = row_number, %reason, "row failed");
            summary.ignored += 1;
        }
    }
}

/// Strategy-named output folders plus the run summary file.
struct OutputWriter {
    base: PathBuf,
    dry_run: bool,
}

impl OutputWriter {
    fn new(base: &Path, strategy: ImportStrategy, dry_run: bool) -> Result<Self> {
        let writer = Self {
            base: base.to_path_buf(),
            dry_run,
        };
        if dry_run {
            return Ok(writer);
        }
        fs::create_dir_all(base).with_context(|| format!("create {}", base.display()))?;
        let subdirs: &[&str] = match strategy {
            ImportStrategy::Create => &["creates"],
            ImportStrategy::Update => &["updates"],
            ImportStrategy::CreateAndUpdate => &["creates", "updates"],
            ImportStrategy::Delete => &[],
        };
        for subdir in subdirs {
            let path = writer.base.join(subdir);
            fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;
        }
        Ok(writer)
    }

    fn planned_path(&self, action: &RowAction, file_name: &str) -> PathBuf {
        self.base.join(Self::subdir(action)).join(file_name)
    }

    fn subdir(action: &RowAction) -> &'static str {
        match action {
            RowAction::Update { .. } => "updates",
            _ => "creates",
        }
    }

    fn persist(&self, action: &RowAction, file_name: &str, xml: &str) -> std::io::Result<()> {
        if self.dry_run {
            return Ok(());
        }
        fs::write(self.planned_path(action, file_name), xml)
    }

    fn write_summary(&self, summary: &Summary) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let path = self.base.join("summary.json");
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
