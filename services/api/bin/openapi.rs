//! Writes the OpenAPI document of the NPC API.
//!
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use npc_api::router::ApiDoc;
use std::path::{Path, PathBuf};
use utoipa::OpenApi;

fn write_document(api_doc: utoipa::openapi::OpenApi, path: &Path) -> anyhow::Result<()> {
    std::fs::write(path, api_doc.to_pretty_json()?)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));
    write_document(ApiDoc::openapi(), &output)?;
    println!("Wrote {}", output.display());
    Ok(())
}
