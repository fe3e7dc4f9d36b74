//! Stats command implementation.

use anyhow::Result;
use snorkels::Store;

use crate::OutputFormat;

pub fn run(store: &Store, format: OutputFormat) -> Result<()> {
    let stats = store.stats();

    match format {
        OutputFormat::Text => {
            println!("{:<20} {}", "STORE", stats.name);
            println!("{:<20} {}", "KEYS", stats.keys);
            println!("{:<20} {} ({} KiB)", "BYTES", stats.bytes, stats.kib());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
