use std::path::PathBuf;

use iaso_model::Summary;

/// Outcome of one `import` invocation, for the final printout.
#[derive(Debug)]
pub struct ImportResult {
    pub form_name: String,
    pub output_dir: PathBuf,
    pub summary: Summary,
    pub dry_run: bool,
}
