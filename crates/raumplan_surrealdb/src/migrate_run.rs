use serde::Serialize;
use serde_json::{Map, Value};

use raumplan_core::normalize_categories;

use crate::{decode_record, sha256_hex_str, SurrealCliStore};

/// How to handle per-record write failures during a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum FailureHandling {
    /// Abort on the first failed write (strict mode)
    FailFast,
    /// Log warning, continue with the remaining records (default)
    WarnAndContinue,
    /// No error, no warning (silent)
    SilentIgnore,
}

impl std::fmt::Display for FailureHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureHandling::FailFast => write!(f, "fail-fast"),
            FailureHandling::WarnAndContinue => write!(f, "warn-and-continue"),
            FailureHandling::SilentIgnore => write!(f, "silent-ignore"),
        }
    }
}

/// One pending MERGE write: the record and its rebuilt `categories` map.
#[derive(Debug, Clone)]
pub struct PlannedUpdate {
    pub record_id: String,
    pub categories: Map<String, Value>,
}

/// The in-memory result of planning a migration over a fetched record set.
/// Planning is pure: nothing has been written yet.
#[derive(Debug, Clone, Default)]
pub struct MigratePlan {
    pub updates: Vec<PlannedUpdate>,
    pub records_total: usize,
    pub records_without_categories: usize,
    pub records_malformed: usize,
    pub params_rewritten: usize,
    pub params_skipped: usize,
    pub warnings: Vec<String>,
}

/// Walk every fetched row and decide which records need their `categories`
/// rewritten into the canonical `{value, label, type}` parameter shape.
///
/// Records without a `categories` attribute are skipped silently (not
/// applicable, per the data model). Records whose `categories` is not an
/// object, and parameters with unsupported value shapes, are left untouched
/// and reported as warnings. A record already in canonical shape plans no
/// update, which makes the whole migration idempotent.
pub fn plan_migration(rows: &[Value]) -> MigratePlan {
    let mut plan = MigratePlan::default();
    plan.records_total = rows.len();

    for row in rows {
        let record = match decode_record(row) {
            Ok(record) => record,
            Err(err) => {
                plan.records_malformed += 1;
                plan.warnings.push(err);
                continue;
            }
        };
        let Some(categories) = record.categories else {
            plan.records_without_categories += 1;
            continue;
        };

        let outcome = normalize_categories(&categories);
        plan.params_rewritten += outcome.params_rewritten;
        plan.params_skipped += outcome.skipped.len();
        for skip in &outcome.skipped {
            if skip.param.is_empty() {
                plan.warnings
                    .push(format!("record {} category {}: {}", record.id, skip.category, skip.reason));
            } else {
                plan.warnings.push(format!(
                    "record {} category {} parameter {}: {}",
                    record.id, skip.category, skip.param, skip.reason
                ));
            }
        }

        if outcome.changed {
            plan.updates.push(PlannedUpdate {
                record_id: record.id,
                categories: outcome.categories,
            });
        }
    }

    plan
}

/// Summary of one migration run, reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct MigrateSummary {
    pub run_id: String,
    pub table: String,
    pub started_at: String,
    pub finished_at: String,
    pub dry_run: bool,
    pub records_total: usize,
    pub records_planned: usize,
    pub records_modified: usize,
    pub records_without_categories: usize,
    pub records_malformed: usize,
    pub params_rewritten: usize,
    pub params_skipped: usize,
    pub write_failures: usize,
}

/// Run the category-schema migration end to end: fetch all records of
/// `table`, plan the rewrites in memory, then merge-write each modified
/// record back. Unmodified records are never written.
///
/// A fetch failure aborts before anything is written. Write failures follow
/// `failure_handling`; failed records are counted, never re-counted as
/// modified. With `dry_run` the plan is computed and reported but no write is
/// issued.
pub fn run_migration(
    store: &SurrealCliStore,
    table: &str,
    failure_handling: FailureHandling,
    dry_run: bool,
) -> Result<MigrateSummary, String> {
    let started_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let run_id = migration_run_id(&store.config().endpoint, table, &started_at);

    let rows = store
        .select_table_rows(table)
        .map_err(|err| format!("fetch {}: {}", table, err))?;
    let plan = plan_migration(&rows);

    if failure_handling != FailureHandling::SilentIgnore {
        for warning in &plan.warnings {
            eprintln!("Warning: {}", warning);
        }
    }

    let mut records_modified = 0usize;
    let mut write_failures = 0usize;
    if !dry_run {
        for update in &plan.updates {
            match store.merge_categories(&update.record_id, &update.categories) {
                Ok(()) => records_modified += 1,
                Err(err) => {
                    write_failures += 1;
                    match failure_handling {
                        FailureHandling::FailFast => {
                            return Err(format!("merge {}: {}", update.record_id, err));
                        }
                        FailureHandling::WarnAndContinue => {
                            eprintln!("Warning: merge {} failed: {}", update.record_id, err);
                        }
                        FailureHandling::SilentIgnore => {}
                    }
                }
            }
        }
    }

    Ok(MigrateSummary {
        run_id,
        table: table.to_string(),
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        dry_run,
        records_total: plan.records_total,
        records_planned: plan.updates.len(),
        records_modified,
        records_without_categories: plan.records_without_categories,
        records_malformed: plan.records_malformed,
        params_rewritten: plan.params_rewritten,
        params_skipped: plan.params_skipped,
        write_failures,
    })
}

fn migration_run_id(endpoint: &str, table: &str, started_at: &str) -> String {
    sha256_hex_str(&format!("{}|{}|{}", endpoint, table, started_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_rewrites_legacy_scalars_only() {
        let rows = vec![
            json!({
                "id": "raumtypen:1",
                "categories": { "elektro": { "steckdosen": 4 } }
            }),
            json!({
                "id": "raumtypen:2",
                "categories": {
                    "bau": { "material": { "value": "Holz", "label": "Material", "type": "text" } }
                }
            }),
        ];
        let plan = plan_migration(&rows);
        assert_eq!(plan.records_total, 2);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].record_id, "raumtypen:1");
        assert_eq!(plan.params_rewritten, 1);
        assert_eq!(
            Value::Object(plan.updates[0].categories.clone()),
            json!({ "elektro": { "steckdosen": { "value": 4, "label": "Steckdosen", "type": "number" } } })
        );
    }

    #[test]
    fn records_without_categories_are_skipped() {
        let rows = vec![
            json!({ "id": "raumtypen:1", "name": "Labor" }),
            json!({ "id": "raumtypen:2", "categories": null }),
        ];
        let plan = plan_migration(&rows);
        assert_eq!(plan.updates.len(), 0);
        assert_eq!(plan.records_without_categories, 2);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn empty_categories_map_plans_no_update() {
        let rows = vec![json!({ "id": "raumtypen:1", "categories": {} })];
        let plan = plan_migration(&rows);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.records_without_categories, 0);
    }

    #[test]
    fn malformed_categories_shape_is_a_warning_not_an_update() {
        let rows = vec![json!({ "id": "raumtypen:1", "categories": [1, 2] })];
        let plan = plan_migration(&rows);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.records_malformed, 1);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("raumtypen:1"));
    }

    #[test]
    fn unsupported_param_shapes_are_warned_and_kept() {
        let rows = vec![json!({
            "id": "raumtypen:1",
            "categories": { "bau": { "leer": null, "hoehe": 3 } }
        })];
        let plan = plan_migration(&rows);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.params_skipped, 1);
        assert_eq!(plan.params_rewritten, 1);
        assert!(plan.warnings[0].contains("parameter leer"));
        // The unsupported value survives verbatim next to the rewritten one.
        assert_eq!(
            plan.updates[0].categories["bau"]["leer"],
            Value::Null
        );
    }

    #[test]
    fn planning_twice_is_idempotent() {
        let rows = vec![json!({
            "id": "raumtypen:1",
            "categories": { "wasser": { "zulauf": true, "bemerkung": "kalt" } }
        })];
        let first = plan_migration(&rows);
        assert_eq!(first.updates.len(), 1);

        let migrated = vec![json!({
            "id": "raumtypen:1",
            "categories": Value::Object(first.updates[0].categories.clone())
        })];
        let second = plan_migration(&migrated);
        assert!(second.updates.is_empty());
        assert_eq!(second.params_rewritten, 0);
    }

    #[test]
    fn run_id_is_deterministic_per_inputs() {
        let a = migration_run_id("ws://localhost:8000", "raumtypen", "2026-08-25T12:00:00Z");
        let b = migration_run_id("ws://localhost:8000", "raumtypen", "2026-08-25T12:00:00Z");
        let c = migration_run_id("ws://localhost:8000", "raumtypen", "2026-08-25T12:00:01Z");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
