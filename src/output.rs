//! Display dictionaries and output rendering
//!
//! Catalog records expose a stable mapping from field name to value so
//! the serializer can select arbitrary field subsets (or everything,
//! with the `all`/`*` wildcard) without type-specific knowledge. Nested
//! structures flatten into dotted keys (`fs.type`, `stats.nb_obj`).

use crate::layout::{DegroupedLayout, LayoutRecord};
use crate::resource::{DeviceInfo, MediaInfo};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Display Dictionaries
// =============================================================================

/// A flat, name-ordered view of one record's display fields
pub type DisplayRow = BTreeMap<String, Value>;

/// Records exposed to the output pipeline
pub trait DisplayDict {
    /// The record's display fields. Byte-count fields keep their raw
    /// numeric value; scaling is the renderer's concern.
    fn display_dict(&self) -> DisplayRow;
}

impl DisplayDict for DeviceInfo {
    fn display_dict(&self) -> DisplayRow {
        let mut row = DisplayRow::new();
        row.insert("family".into(), json!(self.family.to_string()));
        row.insert("label".into(), json!(self.path));
        row.insert("model".into(), json!(self.model));
        row.insert("host".into(), json!(self.host));
        row.insert("serial".into(), json!(self.serial));
        row.insert("adm_status".into(), json!(self.adm_status.to_string()));
        row.insert("lock_status".into(), json!(self.lock.owner));
        row.insert("lock_ts".into(), json!(self.lock.timestamp));
        row
    }
}

impl DisplayDict for MediaInfo {
    fn display_dict(&self) -> DisplayRow {
        let mut row = DisplayRow::new();
        row.insert("family".into(), json!(self.id.family.to_string()));
        row.insert("label".into(), json!(self.id.name));
        row.insert("model".into(), json!(self.model));
        row.insert("adm_status".into(), json!(self.adm_status.to_string()));
        row.insert("tags".into(), json!(self.tags.join(",")));
        row.insert("lock_status".into(), json!(self.lock.owner));
        row.insert("lock_ts".into(), json!(self.lock.timestamp));
        // Nested structures flatten into dotted keys.
        row.insert("fs.type".into(), json!(self.fs_type.to_string()));
        row.insert("fs.status".into(), json!(self.fs_status.to_string()));
        row.insert("fs.label".into(), json!(self.fs_label));
        row.insert("stats.nb_obj".into(), json!(self.stats.nb_obj));
        row.insert("stats.logc_spc_used".into(), json!(self.stats.logc_spc_used));
        row.insert("stats.phys_spc_used".into(), json!(self.stats.phys_spc_used));
        row.insert("stats.phys_spc_free".into(), json!(self.stats.phys_spc_free));
        row.insert("stats.nb_load".into(), json!(self.stats.nb_load));
        row.insert("stats.nb_errors".into(), json!(self.stats.nb_errors));
        row.insert("stats.last_load".into(), json!(self.stats.last_load));
        row
    }
}

impl DisplayDict for LayoutRecord {
    fn display_dict(&self) -> DisplayRow {
        let media: Vec<&str> = self
            .extents
            .iter()
            .map(|e| e.medium.name.as_str())
            .collect();
        let size: u64 = self.extents.iter().map(|e| e.size).sum();

        let mut row = DisplayRow::new();
        row.insert("object".into(), json!(self.object));
        row.insert("layout".into(), json!(self.layout_type));
        row.insert("ext_count".into(), json!(self.extent_count()));
        row.insert("media_name".into(), json!(media.join(",")));
        row.insert("size".into(), json!(size));
        row
    }
}

impl DisplayDict for DegroupedLayout<'_> {
    fn display_dict(&self) -> DisplayRow {
        let mut row = DisplayRow::new();
        row.insert("object".into(), json!(self.record.object));
        row.insert("layout".into(), json!(self.record.layout_type));
        row.insert("ext_count".into(), json!(1));
        row.insert("media_name".into(), json!(self.extent.medium.name));
        row.insert("address".into(), json!(self.extent.address));
        row.insert("ext_index".into(), json!(self.extent.layout_index));
        row.insert("size".into(), json!(self.extent.size));
        row
    }
}

/// Project rows onto the named fields. `all` or `*` among the names
/// means no projection; unknown names are dropped silently.
pub fn project(rows: Vec<DisplayRow>, attrs: &[String]) -> Vec<DisplayRow> {
    if attrs.is_empty() || attrs.iter().any(|a| a == "all" || a == "*") {
        return rows;
    }
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .filter(|(key, _)| attrs.iter().any(|a| a == key))
                .collect()
        })
        .collect()
}

// =============================================================================
// Byte Scaling
// =============================================================================

const UNIT_PREFIXES: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];

/// Scale a number into a human-readable string with unit prefixes
pub fn num2human(n: f64, unit: &str, base: f64, decimals: usize) -> String {
    let mut value = n;
    let mut prefix = UNIT_PREFIXES[0];
    for p in UNIT_PREFIXES {
        prefix = p;
        if value < base {
            break;
        }
        value /= base;
    }
    format!("{:.*}{}{}", decimals, value, prefix, unit)
}

/// Scale a byte count (base 1024)
pub fn bytes2human(n: u64) -> String {
    num2human(n as f64, "B", 1024.0, 1)
}

/// Fields holding byte counts, scaled in human output
const BYTE_FIELDS: [&str; 4] = [
    "size",
    "stats.logc_spc_used",
    "stats.phys_spc_used",
    "stats.phys_spc_free",
];

// =============================================================================
// Rendering
// =============================================================================

/// Output rendering formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(crate::error::Error::Configuration(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn human_cell(key: &str, value: &Value) -> String {
    if BYTE_FIELDS.contains(&key) {
        if let Some(n) = value.as_u64() {
            return bytes2human(n);
        }
    }
    cell(value)
}

fn render_human(rows: &[DisplayRow]) -> String {
    let keys: Vec<&String> = rows[0].keys().collect();
    let mut table: Vec<Vec<String>> = vec![keys.iter().map(|k| k.to_string()).collect()];
    for row in rows {
        table.push(
            keys.iter()
                .map(|k| row.get(*k).map(|v| human_cell(k, v)).unwrap_or_default())
                .collect(),
        );
    }

    let widths: Vec<usize> = (0..keys.len())
        .map(|col| table.iter().map(|r| r[col].len()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for (i, row) in table.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_csv(rows: &[DisplayRow]) -> String {
    let keys: Vec<&String> = rows[0].keys().collect();
    let mut out = String::new();
    out.push_str(
        &keys
            .iter()
            .map(|k| csv_escape(k))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        let line: Vec<String> = keys
            .iter()
            .map(|k| csv_escape(&row.get(*k).map(|v| cell(v)).unwrap_or_default()))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Render display rows in the requested format. Empty input renders as
/// an empty string in every format.
pub fn render(rows: &[DisplayRow], format: OutputFormat) -> crate::error::Result<String> {
    if rows.is_empty() {
        return Ok(String::new());
    }
    match format {
        OutputFormat::Human => Ok(render_human(rows)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(rows)?),
        OutputFormat::Csv => Ok(render_csv(rows)),
    }
}
