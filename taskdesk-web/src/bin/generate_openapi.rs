//! Generate the OpenAPI specification file
//!
//! Writes `taskdesk-web/docs/openapi.json`, or the path given as the first
//! argument.

use std::fs;
use std::path::PathBuf;
use taskdesk_web::openapi::openapi_json;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("taskdesk-web/docs/openapi.json"));

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    fs::write(&path, openapi_json()?)?;
    println!("Generated: {}", path.display());
    Ok(())
}
