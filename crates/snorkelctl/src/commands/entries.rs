//! Single-entry and whole-store commands.

use std::fs;
use std::io::{self, Read, Write};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use snorkels::Store;

use crate::OutputFormat;

#[derive(Serialize)]
struct SetOutput<'a> {
    key: &'a str,
    value_size: usize,
}

#[derive(Serialize)]
struct GetOutput<'a> {
    key: &'a str,
    value: String,
    value_size: usize,
}

#[derive(Serialize)]
struct DeleteOutput<'a> {
    key: &'a str,
    deleted: bool,
}

#[derive(Serialize)]
struct KeysOutput {
    keys: Vec<String>,
    total: usize,
}

#[derive(Serialize)]
struct ClearOutput {
    cleared: usize,
}

pub fn set(
    store: &Store,
    key: &str,
    value: Option<String>,
    file: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let value_bytes = match (value, file) {
        (Some(v), None) => v.into_bytes(),
        (None, Some(f)) => fs::read(&f).with_context(|| format!("failed to read file: {}", f))?,
        (Some(_), Some(_)) => {
            return Err(anyhow!("cannot specify both value and --file"));
        }
        (None, None) => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("failed to read from stdin")?;
            buffer
        }
    };

    let value_size = value_bytes.len();
    store.set(key, value_bytes)?;

    let output = SetOutput { key, value_size };
    match format {
        OutputFormat::Text => println!("Stored {} byte(s) under '{}'", output.value_size, output.key),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}

pub fn get(store: &Store, key: &str, format: OutputFormat) -> Result<()> {
    let value = store.get(key)?;

    match format {
        OutputFormat::Text => {
            // Raw bytes, so binary values survive redirection
            let mut stdout = io::stdout().lock();
            stdout.write_all(&value)?;
            stdout.flush()?;
        }
        OutputFormat::Json => {
            let output = GetOutput {
                key,
                value_size: value.len(),
                value: String::from_utf8_lossy(&value).into_owned(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

pub fn delete(store: &Store, key: &str, format: OutputFormat) -> Result<()> {
    store.delete(key)?;

    let output = DeleteOutput { key, deleted: true };
    match format {
        OutputFormat::Text => println!("Deleted '{}'", output.key),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}

pub fn keys(store: &Store, format: OutputFormat) -> Result<()> {
    let mut keys: Vec<String> = store
        .keys()
        .iter()
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .collect();
    keys.sort();

    let output = KeysOutput {
        total: keys.len(),
        keys,
    };
    match format {
        OutputFormat::Text => {
            if output.keys.is_empty() {
                println!("No keys found.");
            } else {
                for key in &output.keys {
                    println!("{}", key);
                }
                println!();
                println!("Total: {} key(s)", output.total);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}

pub fn clear(store: &Store, format: OutputFormat) -> Result<()> {
    let cleared = store.len();
    store.clear()?;

    let output = ClearOutput { cleared };
    match format {
        OutputFormat::Text => println!("Cleared {} key(s)", output.cleared),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}
