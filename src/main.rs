// Equipment Ledger CLI - imports, transitions and reports from the shell.

use anyhow::{bail, Context as _, Result};
use std::env;
use std::path::Path;

use equipment_ledger::{
    assign_unit, import_equipment_file, import_persons_file, open_database, person_report,
    recent_movements, return_unit, setup_database, stock_summary, value_summary, Config,
    ImportSource, UnitFilter, UnitStatus,
};

fn main() -> Result<()> {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    let mut conn = open_database(&config.database_path)?;
    setup_database(&conn)?;

    match command.as_str() {
        "init" => {
            println!("database ready at {}", config.database_path.display());
        }
        "import-persons" => {
            let path = required_arg(&args, 2, "path to a delimited file")?;
            let stats = import_persons_file(&mut conn, Path::new(&path))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "import-equipment" => {
            let path = required_arg(&args, 2, "path to a workbook or delimited file")?;
            let source = if args.iter().any(|a| a == "--delimited") {
                ImportSource::Delimited
            } else {
                ImportSource::Spreadsheet
            };
            let stats = import_equipment_file(&mut conn, Path::new(&path), source)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "assign" => {
            let unit_id = parse_id(&required_arg(&args, 2, "unit id")?)?;
            let person_id = parse_id(&required_arg(&args, 3, "person id")?)?;
            let note = args.get(4).map(String::as_str);
            let unit = assign_unit(&mut conn, unit_id, person_id, note)?;
            println!("{}", serde_json::to_string_pretty(&unit)?);
        }
        "return" => {
            let unit_id = parse_id(&required_arg(&args, 2, "unit id")?)?;
            let note = args.get(3).map(String::as_str);
            let unit = return_unit(&mut conn, unit_id, note)?;
            println!("{}", serde_json::to_string_pretty(&unit)?);
        }
        "units" => {
            let status = match args.get(2) {
                Some(raw) => Some(
                    UnitStatus::from_db(raw)
                        .with_context(|| format!("unknown status {raw:?}"))?,
                ),
                None => None,
            };
            let units = equipment_ledger::entities::unit::list(
                &conn,
                &UnitFilter {
                    status,
                    holder_id: None,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&units)?);
        }
        "summary" => {
            let summary = stock_summary(&conn)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "value-summary" => {
            let entries = value_summary(&conn)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "person-report" => {
            let person_id = parse_id(&required_arg(&args, 2, "person id")?)?;
            let report = person_report(&conn, person_id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "movements" => {
            let limit = match args.get(2) {
                Some(raw) => raw.parse::<u32>().context("limit must be a number")?,
                None => 100,
            };
            let movements = recent_movements(&conn, limit)?;
            println!("{}", serde_json::to_string_pretty(&movements)?);
        }
        other => {
            print_usage();
            bail!("unknown command {other:?}");
        }
    }

    Ok(())
}

fn required_arg(args: &[String], index: usize, what: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .with_context(|| format!("missing argument: {what}"))
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("{raw:?} is not a numeric id"))
}

fn print_usage() {
    println!("equipment-ledger {}", equipment_ledger::VERSION);
    println!();
    println!("Usage:");
    println!("  equipment-ledger init");
    println!("  equipment-ledger import-persons <file>");
    println!("  equipment-ledger import-equipment <file> [--delimited]");
    println!("  equipment-ledger assign <unit-id> <person-id> [note]");
    println!("  equipment-ledger return <unit-id> [note]");
    println!("  equipment-ledger units [status]");
    println!("  equipment-ledger summary");
    println!("  equipment-ledger value-summary");
    println!("  equipment-ledger person-report <person-id>");
    println!("  equipment-ledger movements [limit]");
    println!();
    println!("Environment: EQUIPMENT_DB (database path), EQUIPMENT_LOG (log filter)");
}
