use std::path::Path;

use serde::Serialize;

use raumplan_core::convert::{convert_csv_to_surql, describe_headers, CsvHeader};
use raumplan_core::csv::parse_csv;
use raumplan_surrealdb::DEFAULT_RESET_TABLES;

#[derive(Debug, Clone, Serialize)]
pub struct ConvertReport {
    pub input: String,
    pub out: String,
    pub records: usize,
    pub skipped_rows: usize,
    pub bytes: usize,
}

/// Convert a CSV grid export on disk into a SURQL import file.
pub fn convert_file(input: &Path, out: &Path, table: &str) -> Result<ConvertReport, String> {
    let csv = std::fs::read_to_string(input)
        .map_err(|err| format!("read csv {}: {}", input.display(), err))?;
    let converted = convert_csv_to_surql(&csv, table)?;
    let mut surql = converted.surql;
    surql.push('\n');
    std::fs::write(out, &surql)
        .map_err(|err| format!("write surql {}: {}", out.display(), err))?;
    Ok(ConvertReport {
        input: input.display().to_string(),
        out: out.display().to_string(),
        records: converted.records,
        skipped_rows: converted.skipped_rows,
        bytes: surql.len(),
    })
}

/// Read a CSV file and describe its header row (index, raw name, cleaned key,
/// assigned category).
pub fn read_headers(input: &Path) -> Result<Vec<CsvHeader>, String> {
    let csv = std::fs::read_to_string(input)
        .map_err(|err| format!("read csv {}: {}", input.display(), err))?;
    let rows = parse_csv(&csv)?;
    let Some(header) = rows.first() else {
        return Err(format!("{}: csv input has no header row", input.display()));
    };
    Ok(describe_headers(header))
}

/// Resolve which tables an import should drop first: `--no-reset` wins,
/// explicit `--reset-table` flags override the defaults.
pub fn resolve_reset_tables(no_reset: bool, requested: &[String]) -> Vec<String> {
    if no_reset {
        return Vec::new();
    }
    if requested.is_empty() {
        DEFAULT_RESET_TABLES.iter().map(|t| t.to_string()).collect()
    } else {
        requested.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_tables_resolution() {
        assert!(resolve_reset_tables(true, &["raumtypen".to_string()]).is_empty());
        assert_eq!(
            resolve_reset_tables(false, &[]),
            DEFAULT_RESET_TABLES
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            resolve_reset_tables(false, &["nur_diese".to_string()]),
            vec!["nur_diese".to_string()]
        );
    }
}
