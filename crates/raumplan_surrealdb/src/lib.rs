use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::{Map, Value};

pub mod import_run;
pub mod migrate_run;

pub use import_run::{run_import, ImportSummary, DEFAULT_RESET_TABLES};
pub use migrate_run::{plan_migration, run_migration, FailureHandling, MigratePlan, MigrateSummary};

#[derive(Debug, Clone)]
pub struct SurrealCliConfig {
    pub endpoint: String,
    pub namespace: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub auth_level: Option<String>,
    pub surreal_bin: String,
}

impl Default for SurrealCliConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000".to_string(),
            namespace: None,
            database: None,
            username: None,
            password: None,
            token: None,
            auth_level: None,
            surreal_bin: "surreal".to_string(),
        }
    }
}

/// A connected-by-configuration handle to a SurrealDB instance, speaking
/// through the `surreal sql --json` CLI subprocess.
#[derive(Debug, Clone)]
pub struct SurrealCliStore {
    config: SurrealCliConfig,
}

struct SqlRunOutput {
    values: Vec<Value>,
    stdout: String,
    stderr: String,
}

impl SurrealCliStore {
    pub fn new(config: SurrealCliConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SurrealCliConfig {
        &self.config
    }

    pub fn is_ready(&self) -> Result<bool, String> {
        let output = Command::new(&self.config.surreal_bin)
            .arg("is-ready")
            .arg("--endpoint")
            .arg(&self.config.endpoint)
            .output()
            .map_err(|err| format!("spawn surreal is-ready: {}", err))?;
        if !output.status.success() {
            return Ok(false);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim() == "OK")
    }

    fn run_sql_output(&self, sql: &str) -> Result<SqlRunOutput, String> {
        let mut cmd = Command::new(&self.config.surreal_bin);
        cmd.arg("sql")
            .arg("--hide-welcome")
            .arg("--endpoint")
            .arg(&self.config.endpoint)
            .arg("--json");

        if let Some(level) = &self.config.auth_level {
            cmd.arg("--auth-level").arg(level);
        }
        if let Some(ns) = &self.config.namespace {
            cmd.arg("--namespace").arg(ns);
        }
        if let Some(db) = &self.config.database {
            cmd.arg("--database").arg(db);
        }
        if let Some(user) = &self.config.username {
            cmd.arg("--username").arg(user);
        }
        if let Some(pass) = &self.config.password {
            cmd.arg("--password").arg(pass);
        }
        if let Some(token) = &self.config.token {
            cmd.arg("--token").arg(token);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("spawn surreal sql: {}", err))?;

        child
            .stdin
            .as_mut()
            .ok_or_else(|| "failed to open surreal sql stdin".to_string())?
            .write_all(sql.as_bytes())
            .map_err(|err| format!("write surreal sql stdin: {}", err))?;

        let output = child
            .wait_with_output()
            .map_err(|err| format!("wait surreal sql: {}", err))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            return Err(format!(
                "surreal sql failed (exit={}):\nstdout:\n{}\nstderr:\n{}",
                output.status, stdout, stderr
            ));
        }

        // `surreal sql --json` may exit 0 even when statements fail; failures
        // surface as `null` entries or arrays of error strings instead.
        let values = parse_json_stream(&stdout).map_err(|err| {
            format!(
                "surreal sql returned non-json output: {}\nstdout:\n{}\nstderr:\n{}",
                err, stdout, stderr
            )
        })?;
        Ok(SqlRunOutput {
            values,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    pub fn run_sql(&self, sql: &str) -> Result<(), String> {
        let output = self.run_sql_output(sql)?;
        check_surreal_json_stream(&output.values).map_err(|msg| {
            format!("{}\nstdout:\n{}\nstderr:\n{}", msg, output.stdout, output.stderr)
        })?;
        Ok(())
    }

    /// Like `run_sql`, but tolerates "does not exist" errors. Used for table
    /// resets, which must be idempotent against a fresh database.
    pub fn run_sql_allow_missing(&self, sql: &str) -> Result<(), String> {
        let output = self.run_sql_output(sql)?;
        check_surreal_json_stream_allow_missing(&output.values).map_err(|msg| {
            format!("{}\nstdout:\n{}\nstderr:\n{}", msg, output.stdout, output.stderr)
        })?;
        Ok(())
    }

    fn select_rows_from_single_select(&self, sql: &str) -> Result<Vec<Value>, String> {
        let output = self.run_sql_output(sql)?;
        check_surreal_json_stream(&output.values).map_err(|msg| {
            format!("{}\nstdout:\n{}\nstderr:\n{}", msg, output.stdout, output.stderr)
        })?;
        let Some(first) = output.values.first() else {
            return Ok(Vec::new());
        };
        // Surreal JSON format for SELECT: [[{...}, ...]]
        let Some(top_arr) = first.as_array() else {
            return Ok(Vec::new());
        };
        let Some(inner) = top_arr.first().and_then(|v| v.as_array()) else {
            return Ok(Vec::new());
        };
        Ok(inner.clone())
    }

    /// Fetch every record of `table` in one round-trip.
    pub fn select_table_rows(&self, table: &str) -> Result<Vec<Value>, String> {
        let table = validate_table_ident(table)?;
        let sql = format!("SELECT * FROM {} LIMIT 100000;", table);
        self.select_rows_from_single_select(&sql)
    }

    /// Partial update: rewrite only the `categories` attribute of one record,
    /// leaving everything else untouched.
    pub fn merge_categories(&self, record_id: &str, categories: &Map<String, Value>) -> Result<(), String> {
        let sql = merge_categories_sql(record_id, categories)?;
        self.run_sql(&sql)
    }
}

/// One row of the target table, decoded at the store boundary.
#[derive(Debug, Clone)]
pub struct TableRecord {
    pub id: String,
    /// `None` when the record has no `categories` attribute (or it is null);
    /// such records are out of scope for the normalizer.
    pub categories: Option<Map<String, Value>>,
}

pub fn decode_record(row: &Value) -> Result<TableRecord, String> {
    let obj = row
        .as_object()
        .ok_or_else(|| format!("row is not an object ({})", value_kind(row)))?;
    let id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "row has no string id".to_string())?
        .to_string();
    let categories = match obj.get("categories") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => {
            return Err(format!(
                "record {}: categories is {}, expected an object",
                id,
                value_kind(other)
            ))
        }
    };
    Ok(TableRecord { id, categories })
}

pub(crate) fn merge_categories_sql(record_id: &str, categories: &Map<String, Value>) -> Result<String, String> {
    let record_id = validate_record_id(record_id)?;
    let json = serde_json::to_string(&Value::Object(categories.clone()))
        .map_err(|err| format!("json encode categories for {}: {}", record_id, err))?;
    Ok(format!(
        "UPDATE {} MERGE {{ categories: {} }} RETURN NONE;",
        record_id, json
    ))
}

/// Record ids come back from SELECT and are interpolated into statements, so
/// reject anything that could smuggle extra statements in.
pub(crate) fn validate_record_id(record_id: &str) -> Result<&str, String> {
    if record_id.is_empty() || !record_id.contains(':') {
        return Err(format!("invalid record id: {:?}", record_id));
    }
    if record_id
        .chars()
        .any(|c| c == ';' || c == '\'' || c == '"' || c == '{' || c == '}' || c.is_whitespace())
    {
        return Err(format!("record id contains unsafe characters: {:?}", record_id));
    }
    Ok(record_id)
}

pub(crate) fn validate_table_ident(table: &str) -> Result<&str, String> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid table name: {:?}", table));
    }
    Ok(table)
}

fn parse_json_stream(input: &str) -> Result<Vec<Value>, serde_json::Error> {
    let mut out = Vec::new();
    let deser = serde_json::Deserializer::from_str(input);
    for item in deser.into_iter::<Value>() {
        out.push(item?);
    }
    Ok(out)
}

fn check_surreal_json_stream(values: &[Value]) -> Result<(), String> {
    if values.is_empty() {
        return Err("surreal sql returned empty json stream".to_string());
    }
    for v in values {
        // The CLI returns `null` (or `[null]`) for statements which return no
        // rows (REMOVE, UPDATE ... RETURN NONE). Treat null as success.
        if let Some(arr) = v.as_array() {
            if array_looks_like_error(arr) {
                return Err("surreal sql reported error result".to_string());
            }
        }
    }
    Ok(())
}

fn check_surreal_json_stream_allow_missing(values: &[Value]) -> Result<(), String> {
    if values.is_empty() {
        return Err("surreal sql returned empty json stream".to_string());
    }
    for v in values {
        let Some(arr) = v.as_array() else {
            continue;
        };
        if !array_looks_like_error(arr) {
            continue;
        }
        let all_missing = arr.iter().all(|x| {
            x.as_str()
                .is_some_and(|s| s.to_lowercase().contains("does not exist") || s.to_lowercase().contains("not found"))
        });
        if all_missing {
            continue;
        }
        return Err("surreal sql reported error result".to_string());
    }
    Ok(())
}

fn array_looks_like_error(arr: &[Value]) -> bool {
    // The CLI has been observed to return an array of strings for errors.
    if arr.is_empty() {
        return false;
    }
    arr.iter().any(|v| {
        v.as_str().is_some_and(|s| {
            s.contains("Parse error")
                || s.contains("IAM error")
                || s.contains("The database encountered")
                || s.contains("does not exist")
                || s.contains("error:")
        })
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn sha256_hex_str(s: &str) -> String {
    use sha2::Digest;
    let digest = sha2::Sha256::digest(s.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
