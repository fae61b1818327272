use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::data::loader::{extension, load_table};

/// Parse `key: value` lines. Returns the map and the lines that were not
/// exactly one key and one value.
pub fn text_to_json(text: &str) -> (Map<String, Value>, Vec<String>) {
    let mut map = Map::new();
    let mut skipped = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        let parts: Vec<&str> = line.split(':').collect();
        match parts.as_slice() {
            [key, value] => {
                map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
            }
            _ => skipped.push(line.to_string()),
        }
    }
    (map, skipped)
}

/// First column as keys, second as values. CSV, TSV and XLSX only.
pub fn table_to_json(path: &Path) -> Result<Map<String, Value>> {
    match extension(path).as_str() {
        "csv" | "tsv" | "xlsx" => {}
        _ => bail!("Unsupported file format. Use CSV, TSV, or XLSX."),
    }
    let table = load_table(path).with_context(|| format!("reading {}", path.display()))?;
    if table.columns.len() < 2 {
        bail!(
            "{} needs at least two columns, found {}",
            path.display(),
            table.columns.len()
        );
    }

    let mut map = Map::new();
    for row in &table.rows {
        map.insert(row[0].to_string(), row[1].to_json());
    }
    Ok(map)
}

/// Write `value` as JSON indented with four spaces.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    writer.flush()?;
    Ok(())
}
