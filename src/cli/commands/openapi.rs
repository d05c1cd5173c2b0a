use anyhow::Result;
use std::path::Path;
use utoipa::OpenApi;

use crate::schemas::ApiDoc;

/// Renders the OpenAPI document as YAML to `output` or stdout.
pub fn print_openapi(output: Option<&Path>) -> Result<()> {
    let yaml = serde_yaml::to_string(&ApiDoc::openapi())?;
    match output {
        Some(path) => std::fs::write(path, yaml)?,
        None => print!("{}", yaml),
    }
    Ok(())
}
