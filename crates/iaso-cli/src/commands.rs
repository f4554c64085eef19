//! Command orchestration: wire authentication, metadata loading and the row
//! pipeline together for one `import` invocation.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use iaso_client::{Credentials, IasoClient, Platform, authenticate, load_form_model};
use iaso_ingest::read_submissions_file;
use iaso_model::{ImportError, ImportStrategy, RowSet};

use crate::cli::ImportArgs;
use crate::pipeline::{ImportRequest, run_import};
use crate::types::ImportResult;

pub fn run_import_command(args: &ImportArgs) -> Result<ImportResult> {
    let strategy: ImportStrategy = args.strategy.into();

    let http = reqwest::blocking::Client::new();
    let credentials = Credentials {
        server_url: args.server_url.clone(),
        username: args.username.clone(),
        password: args.password.clone(),
    };
    let session = authenticate(&http, &credentials)?;

    let client = IasoClient::new(&session);
    let app_id = client
        .project_app_id(args.project)
        .context("resolve project app id")?;
    if !client.user_may_import(&app_id).context("check user permissions")? {
        return Err(ImportError::PermissionDenied(format!(
            "user may not update submissions for app {app_id}"
        ))
        .into());
    }
    let client = client.with_app_id(&app_id);

    let rows = read_submissions_file(&args.input_file)
        .with_context(|| format!("read {}", args.input_file.display()))?;

    let requested_versions = distinct_versions(&rows);
    let model = load_form_model(&client, args.form_id, &app_id, &requested_versions)?;

    let output_dir = args.output_dir.clone().unwrap_or_else(|| {
        PathBuf::from("iaso-pipelines")
            .join("import-submissions")
            .join(&model.info.name)
    });

    info!(
        form_id = args.form_id,
        form_name = %model.info.name,
        strategy = %strategy,
        record_count = rows.len(),
        "starting submissions import"
    );

    let request = ImportRequest {
        strategy,
        strict_validation: args.strict,
        dry_run: args.dry_run,
        output_dir: &output_dir,
        edit_user_id: session.user_id.as_deref(),
    };
    let summary = run_import(&request, &model, &rows, &client as &dyn Platform)?;

    Ok(ImportResult {
        form_name: model.info.name.clone(),
        output_dir,
        summary,
        dry_run: args.dry_run,
    })
}

/// Distinct non-null `form_version` values in the input.
fn distinct_versions(rows: &RowSet) -> BTreeSet<String> {
    rows.rows
        .iter()
        .filter_map(|row| row.form_version())
        .collect()
}
