use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::warn;

use crate::adapter::{
    CompositeDataContext, CsvConfiguration, CsvDataContext, DataContext, DataContextExt,
    SqliteDataContext,
};
use crate::data::{DataSet, Value};
use crate::error::{MetaQueryError, Result};
use crate::resource::FileResource;

#[derive(Parser, Debug)]
#[command(name = "metaquery")]
#[command(author, version, about = "Query CSV files and SQLite databases with one SQL dialect")]
pub struct Cli {
    /// Path to a CSV file, a SQLite database or a folder of CSV files
    #[arg(required = true)]
    pub path: PathBuf,

    /// Execute a SQL query directly; without it queries are read from stdin, one per line
    #[arg(short, long)]
    pub query: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// CSV delimiter (only for CSV files)
    #[arg(short, long, default_value = ",")]
    pub delimiter: char,

    /// CSV files have no header line
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    fn csv_configuration(&self) -> CsvConfiguration {
        CsvConfiguration::new()
            .with_delimiter(self.delimiter)
            .with_column_name_line(if self.no_header { 0 } else { 1 })
    }
}

/// Opens the data context for the command line's path.
pub fn load_context(cli: &Cli) -> Result<Box<dyn DataContext>> {
    let path = &cli.path;
    if path.is_file() {
        return load_file(path, cli);
    }
    if !path.is_dir() {
        return Err(MetaQueryError::InvalidState(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(path)
        .map_err(|e| MetaQueryError::resource(path.display().to_string(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_csv(p))
        .collect();
    entries.sort();

    let mut delegates = Vec::new();
    for file_path in entries {
        match load_file(&file_path, cli).and_then(|dc| dc.default_schema().map(|_| dc)) {
            Ok(dc) => delegates.push(dc),
            Err(e) => warn!(path = %file_path.display(), error = %e, "Failed to load file"),
        }
    }
    if delegates.is_empty() {
        return Err(MetaQueryError::InvalidState(format!(
            "No valid data files found in {}",
            path.display()
        )));
    }
    Ok(Box::new(CompositeDataContext::new(delegates)?))
}

fn is_csv(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("csv") | Some("tsv") | Some("txt")
    )
}

fn load_file(path: &Path, cli: &Cli) -> Result<Box<dyn DataContext>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("db") | Some("sqlite") | Some("sqlite3") => Ok(Box::new(SqliteDataContext::open(path)?)),
        _ if is_csv(path) => Ok(Box::new(CsvDataContext::new(
            Arc::new(FileResource::new(path)),
            cli.csv_configuration(),
        ))),
        _ => Err(MetaQueryError::unsupported(format!(
            "Unsupported file format: {}",
            path.display()
        ))),
    }
}

/// Runs one query and prints its result.
pub fn run_query(context: &dyn DataContext, sql: &str, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    let result = context.execute_sql(sql)?;
    write_result(out, result, format)
}

/// Reads queries from `input`, one per line, until end of input. A failing
/// query is reported and the loop goes on.
pub fn run_interactive(
    context: &dyn DataContext,
    input: &mut dyn BufRead,
    format: OutputFormat,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    write_tables(context, out)?;
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let sql = line.trim().trim_end_matches(';');
        if sql.is_empty() {
            continue;
        }
        if let Err(e) = run_query(context, sql, format, out) {
            writeln!(err, "Error: {}", e)?;
        }
    }
}

fn write_tables(context: &dyn DataContext, out: &mut dyn Write) -> Result<()> {
    for name in context.schema_names()? {
        if let Some(schema) = context.schema_by_name(&name)? {
            for table in schema.tables() {
                writeln!(out, "{} ({})", table.qualified_label(), table.column_names().join(", "))?;
            }
        }
    }
    Ok(())
}

pub fn write_result(out: &mut dyn Write, result: DataSet, format: OutputFormat) -> Result<()> {
    let labels: Vec<String> = result.select_items().iter().map(|i| i.label()).collect();
    let rows = result.to_values()?;
    match format {
        OutputFormat::Table => write_table(out, &labels, &rows),
        OutputFormat::Csv => write_csv(out, &labels, &rows),
        OutputFormat::Json => write_json(out, &labels, &rows),
    }
}

fn write_table(out: &mut dyn Write, labels: &[String], rows: &[Vec<Value>]) -> Result<()> {
    if rows.is_empty() {
        writeln!(out, "(0 rows)")?;
        return Ok(());
    }

    let widths: Vec<usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let max_value_width = rows
                .iter()
                .map(|row| row.get(i).map(|v| v.to_string().len()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            label.len().max(max_value_width)
        })
        .collect();

    let header: Vec<String> = labels
        .iter()
        .zip(&widths)
        .map(|(label, width)| format!("{:width$}", label, width = *width))
        .collect();
    writeln!(out, "{}", header.join(" | "))?;

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    writeln!(out, "{}", sep.join("-+-"))?;

    for row in rows {
        let values: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, width)| format!("{:width$}", v.to_string(), width = *width))
            .collect();
        writeln!(out, "{}", values.join(" | "))?;
    }

    writeln!(out, "({} rows)", rows.len())?;
    Ok(())
}

fn csv_field(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn write_csv(out: &mut dyn Write, labels: &[String], rows: &[Vec<Value>]) -> Result<()> {
    let header: Vec<String> = labels.iter().map(|l| csv_field(l)).collect();
    writeln!(out, "{}", header.join(","))?;
    for row in rows {
        let values: Vec<String> = row
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => csv_field(&other.to_string()),
            })
            .collect();
        writeln!(out, "{}", values.join(","))?;
    }
    Ok(())
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Binary(bytes) => serde_json::Value::from(bytes.clone()),
        other => serde_json::Value::String(other.to_string()),
    }
}

fn write_json(out: &mut dyn Write, labels: &[String], rows: &[Vec<Value>]) -> Result<()> {
    let objects: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = labels
                .iter()
                .cloned()
                .zip(row.iter().map(json_value))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();
    writeln!(out, "{}", serde_json::Value::Array(objects))?;
    Ok(())
}
