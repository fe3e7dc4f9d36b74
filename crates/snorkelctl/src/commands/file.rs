//! Dump and load commands.

use anyhow::{Context, Result};
use serde::Serialize;
use snorkels::Store;

use crate::OutputFormat;

#[derive(Serialize)]
struct FileOutput<'a> {
    path: &'a str,
    entries: usize,
}

pub fn dump(store: &Store, path: &str, format: OutputFormat) -> Result<()> {
    let entries = store
        .dump(path)
        .with_context(|| format!("failed to dump to {}", path))?;
    print(&FileOutput { path, entries }, "Dumped", format)
}

pub fn load(store: &Store, path: &str, format: OutputFormat) -> Result<()> {
    let entries = store
        .load(path)
        .with_context(|| format!("failed to load from {}", path))?;
    print(&FileOutput { path, entries }, "Loaded", format)
}

fn print(output: &FileOutput<'_>, verb: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{} {} entr(ies) ({})", verb, output.entries, output.path),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(output)?),
    }
    Ok(())
}
