use std::path::PathBuf;

use clap::{Parser, Subcommand};

use raumplan_cli::{convert_file, read_headers, resolve_reset_tables};
use raumplan_surrealdb::{run_import, run_migration, FailureHandling, SurrealCliConfig, SurrealCliStore};

#[derive(Parser)]
#[command(name = "raumplan", version, about = "Raumprogramm data tooling for SurrealDB")]
struct Cli {
    /// SurrealDB endpoint (passed to `surreal sql --endpoint`)
    #[arg(long, default_value = "ws://localhost:8000", value_name = "URL")]
    endpoint: String,

    /// SurrealDB namespace (passed to `surreal sql --namespace`)
    #[arg(long, value_name = "NS")]
    namespace: Option<String>,

    /// SurrealDB database (passed to `surreal sql --database`)
    #[arg(long, value_name = "DB")]
    database: Option<String>,

    /// SurrealDB username (passed to `surreal sql --username`)
    #[arg(long)]
    username: Option<String>,

    /// SurrealDB password (passed to `surreal sql --password`)
    #[arg(long)]
    password: Option<String>,

    /// SurrealDB token (passed to `surreal sql --token`)
    #[arg(long)]
    token: Option<String>,

    /// SurrealDB auth level (passed to `surreal sql --auth-level`)
    #[arg(long)]
    auth_level: Option<String>,

    /// SurrealDB CLI binary name/path (default: surreal)
    #[arg(long, default_value = "surreal")]
    surreal_bin: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the `categories` attribute of every record into the
    /// canonical {value, label, type} parameter shape
    Migrate(MigrateArgs),
    /// Reset the affected tables and execute a SURQL import file
    Import(ImportArgs),
    /// Convert a CSV grid export into a SURQL import file
    Convert(ConvertArgs),
    /// Inspect a CSV file's header row (index, key, category)
    Headers(HeadersArgs),
}

#[derive(Parser)]
struct MigrateArgs {
    /// Table holding the room-type records
    #[arg(long, default_value = "raumtypen")]
    table: String,

    /// Write-failure handling: fail-fast|warn-and-continue|silent-ignore
    #[arg(long, value_enum, default_value_t = FailureHandling::WarnAndContinue)]
    failure_mode: FailureHandling,

    /// Plan the migration and report counts without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ImportArgs {
    /// SURQL import file
    #[arg(long, value_name = "PATH", required = true)]
    file: PathBuf,

    /// Table to drop before the import (repeatable; default: the room-type,
    /// relation and dimension tables)
    #[arg(long = "reset-table", value_name = "TABLE")]
    reset_table: Vec<String>,

    /// Import on top of existing data without dropping any table
    #[arg(long, conflicts_with = "reset_table")]
    no_reset: bool,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ConvertArgs {
    /// Input CSV file
    #[arg(long, value_name = "PATH", required = true)]
    input: PathBuf,

    /// Output SURQL file
    #[arg(long, value_name = "PATH", required = true)]
    out: PathBuf,

    /// Target table for the CREATE statements
    #[arg(long, default_value = "raumtypen")]
    table: String,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct HeadersArgs {
    /// Input CSV file
    #[arg(long, value_name = "PATH", required = true)]
    input: PathBuf,

    /// Output JSON instead of key=value lines
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let config = SurrealCliConfig {
        endpoint: cli.endpoint.clone(),
        namespace: cli.namespace.clone(),
        database: cli.database.clone(),
        username: cli.username.clone(),
        password: cli.password.clone(),
        token: cli.token.clone(),
        auth_level: cli.auth_level.clone(),
        surreal_bin: cli.surreal_bin.clone(),
    };

    let result = match cli.command {
        Commands::Migrate(args) => run_migrate(args, config),
        Commands::Import(args) => run_import_cmd(args, config),
        Commands::Convert(args) => run_convert(args),
        Commands::Headers(args) => run_headers(args),
    };

    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run_migrate(args: MigrateArgs, config: SurrealCliConfig) -> Result<(), String> {
    let store = SurrealCliStore::new(config);
    let summary = run_migration(&store, &args.table, args.failure_mode, args.dry_run)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
        return Ok(());
    }

    println!("run_id={}", summary.run_id);
    println!("table={}", summary.table);
    println!("dry_run={}", summary.dry_run);
    println!("records_total={}", summary.records_total);
    println!("records_planned={}", summary.records_planned);
    println!("records_modified={}", summary.records_modified);
    println!("records_without_categories={}", summary.records_without_categories);
    println!("records_malformed={}", summary.records_malformed);
    println!("params_rewritten={}", summary.params_rewritten);
    println!("params_skipped={}", summary.params_skipped);
    println!("write_failures={}", summary.write_failures);
    Ok(())
}

fn run_import_cmd(args: ImportArgs, config: SurrealCliConfig) -> Result<(), String> {
    let store = SurrealCliStore::new(config);
    let reset_tables = resolve_reset_tables(args.no_reset, &args.reset_table);
    let summary = run_import(&store, &args.file, &reset_tables)?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
        return Ok(());
    }

    println!("file={}", summary.file);
    println!("bytes={}", summary.bytes);
    println!("tables_reset={}", summary.tables_reset.join(","));
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<(), String> {
    let report = convert_file(&args.input, &args.out, &args.table)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
        return Ok(());
    }

    println!("input={}", report.input);
    println!("out={}", report.out);
    println!("records={}", report.records);
    println!("skipped_rows={}", report.skipped_rows);
    println!("bytes={}", report.bytes);
    Ok(())
}

fn run_headers(args: HeadersArgs) -> Result<(), String> {
    let headers = read_headers(&args.input)?;

    if args.json {
        let json = serde_json::to_string_pretty(&headers)
            .map_err(|err| format!("json encode: {}", err))?;
        println!("{}", json);
        return Ok(());
    }

    println!("columns={}", headers.len());
    for h in &headers {
        println!("{}: raw={:?} key={} category={}", h.index, h.raw, h.key, h.category);
    }
    Ok(())
}
