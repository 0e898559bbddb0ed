use serde::Serialize;
use serde_json::{Map, Value};

use crate::csv::parse_csv;

/// Clean a raw CSV header into a SurrealDB-safe key: lowercase `a-z0-9_`,
/// separators folded to underscores, unit superscripts flattened.
///
/// `NC Code (7-stellig)` -> `nc_code_7_stellig`
pub fn clean_key(text: &str) -> String {
    let cleaned = text
        .replace(" / ", "_")
        .replace('/', "_")
        .replace(", ", "_")
        .replace('.', "")
        .replace('-', "_")
        .replace('(', "_")
        .replace(')', "")
        .replace('\n', "_")
        .replace('\r', "")
        .replace(' ', "_")
        .replace('³', "3")
        .replace('²', "2")
        .to_lowercase();

    // Collapse runs of underscores and strip them from the ends.
    let mut out = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for ch in cleaned.chars() {
        if ch == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(ch);
            prev_underscore = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Category assignment by column position in the grid export.
pub fn category_for_column(index: usize) -> &'static str {
    match index {
        0..=5 => "general",
        6..=27 => "elektro",
        28..=58 => "gase",
        59..=77 => "wasser",
        78..=86 => "lueftung",
        87 => "daten",
        88..=93 => "bau",
        94..=95 => "info",
        _ => "unknown",
    }
}

/// Parse one CSV cell: empty -> None, all-digit -> integer, decimal (comma or
/// dot separator) -> float, anything else -> string.
pub fn parse_cell(raw: &str) -> Option<Value> {
    let val = raw.trim();
    if val.is_empty() {
        return None;
    }
    if val.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = val.parse::<i64>() {
            return Some(Value::from(n));
        }
    }
    let normalized = val.replace(',', ".");
    if let Ok(f) = normalized.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Some(Value::Number(n));
        }
    }
    Some(Value::String(val.to_string()))
}

/// One header column: raw name, cleaned key, and assigned category.
#[derive(Debug, Clone, Serialize)]
pub struct CsvHeader {
    pub index: usize,
    pub raw: String,
    pub key: String,
    pub category: &'static str,
}

pub fn describe_headers(header: &[String]) -> Vec<CsvHeader> {
    header
        .iter()
        .enumerate()
        .map(|(index, raw)| CsvHeader {
            index,
            raw: raw.replace(['\n', '\r'], " ").trim().to_string(),
            key: clean_key(raw),
            category: category_for_column(index),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertOutput {
    pub surql: String,
    pub records: usize,
    pub skipped_rows: usize,
}

/// Convert a grid CSV export into a SURQL import script: one
/// `CREATE <table>:<id> CONTENT {...};` per row, wrapped in a transaction.
///
/// The record id comes from column 0 (the seven-digit NC code); rows without
/// one are skipped and counted. `general` columns become top-level record
/// attributes, every other category lands under `categories.<name>.<key>`.
pub fn convert_csv_to_surql(input: &str, table: &str) -> Result<ConvertOutput, String> {
    let mut rows = parse_csv(input)?.into_iter();
    let Some(header) = rows.next() else {
        return Err("csv input has no header row".to_string());
    };
    let headers = describe_headers(&header);

    let mut statements = vec!["BEGIN TRANSACTION;".to_string()];
    let mut records = 0usize;
    let mut skipped_rows = 0usize;

    for row in rows {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let id = row.first().map(|cell| cell.trim()).unwrap_or("");
        if id.is_empty() {
            skipped_rows += 1;
            continue;
        }

        let mut categories = Map::new();
        let mut general = Map::new();
        for (i, cell) in row.iter().enumerate() {
            let Some(h) = headers.get(i) else {
                break;
            };
            let Some(value) = parse_cell(cell) else {
                continue;
            };
            if h.category == "general" {
                general.insert(h.key.clone(), value);
            } else {
                let slot = categories
                    .entry(h.category.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Some(params) = slot.as_object_mut() {
                    params.insert(h.key.clone(), value);
                }
            }
        }

        let mut record = Map::new();
        record.insert("categories".to_string(), Value::Object(categories));
        record.insert("meta".to_string(), Value::Object(Map::new()));
        for (key, value) in general {
            record.insert(key, value);
        }

        let json = serde_json::to_string(&Value::Object(record))
            .map_err(|err| format!("json encode record {}: {}", id, err))?;
        statements.push(format!("CREATE {}:{} CONTENT {};", table, id, json));
        records += 1;
    }

    statements.push("COMMIT TRANSACTION;".to_string());
    Ok(ConvertOutput {
        surql: statements.join("\n"),
        records,
        skipped_rows,
    })
}
