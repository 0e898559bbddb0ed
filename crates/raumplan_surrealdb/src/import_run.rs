use std::path::Path;

use serde::Serialize;

use crate::{validate_table_ident, SurrealCliStore};

/// Tables recreated by a full import: the room-type table, its relation
/// tables, and the dimension tables the relations point at.
pub const DEFAULT_RESET_TABLES: &[&str] = &[
    "raumtypen",
    "hat_teilprojekt",
    "hat_nutzer_ebene_1",
    "hat_nutzer_ebene_2",
    "hat_funktions_bereich",
    "nutzer_ebene_1",
    "nutzer_ebene_2",
    "funktions_bereich",
    "teilprojekt",
];

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub file: String,
    pub bytes: usize,
    pub tables_reset: Vec<String>,
    pub started_at: String,
    pub finished_at: String,
}

pub(crate) fn reset_tables_sql(tables: &[String]) -> Result<String, String> {
    let mut statements = Vec::with_capacity(tables.len());
    for table in tables {
        statements.push(format!("REMOVE TABLE {};", validate_table_ident(table)?));
    }
    Ok(statements.join("\n"))
}

/// Execute a SURQL import file against the store, dropping the reset tables
/// first so the import starts from a clean slate. Pass an empty `reset_tables`
/// slice to import on top of existing data.
pub fn run_import(
    store: &SurrealCliStore,
    path: &Path,
    reset_tables: &[String],
) -> Result<ImportSummary, String> {
    let started_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let surql = std::fs::read_to_string(path)
        .map_err(|err| format!("read import file {}: {}", path.display(), err))?;
    if surql.trim().is_empty() {
        return Err(format!("import file {} is empty", path.display()));
    }

    if !reset_tables.is_empty() {
        let sql = reset_tables_sql(reset_tables)?;
        store
            .run_sql_allow_missing(&sql)
            .map_err(|err| format!("reset tables: {}", err))?;
    }

    store
        .run_sql(&surql)
        .map_err(|err| format!("import {}: {}", path.display(), err))?;

    Ok(ImportSummary {
        file: path.display().to_string(),
        bytes: surql.len(),
        tables_reset: reset_tables.to_vec(),
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_sql_covers_all_default_tables() {
        let tables: Vec<String> = DEFAULT_RESET_TABLES.iter().map(|t| t.to_string()).collect();
        let sql = reset_tables_sql(&tables).unwrap();
        for table in DEFAULT_RESET_TABLES {
            assert!(sql.contains(&format!("REMOVE TABLE {};", table)));
        }
        assert_eq!(sql.lines().count(), DEFAULT_RESET_TABLES.len());
    }

    #[test]
    fn reset_sql_rejects_unsafe_table_names() {
        let tables = vec!["raumtypen; REMOVE TABLE x".to_string()];
        assert!(reset_tables_sql(&tables).is_err());
    }
}
