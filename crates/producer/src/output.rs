//! Persisting generated request records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::Result;
use crate::request::RequestRecord;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `id,jsonrpc,method,params` with params as a JSON array string
    #[default]
    Csv,
    /// One JSON request object per line
    Jsonl,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    id: u64,
    jsonrpc: &'a str,
    method: &'a str,
    params: String,
}

/// `<method>-<count>-<YYYYmmddHHMM>.<ext>`
pub fn output_file_name(
    method: &str,
    count: usize,
    at: DateTime<Local>,
    format: OutputFormat,
) -> String {
    format!(
        "{method}-{count}-{}.{}",
        at.format(TIMESTAMP_FORMAT),
        format.extension()
    )
}

/// Write `records` to a fresh file in `dir` and return its path.
pub fn write_records(
    dir: &Path,
    method: &str,
    records: &[RequestRecord],
    format: OutputFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(output_file_name(method, records.len(), Local::now(), format));
    let file = File::create(&path)?;

    match format {
        OutputFormat::Csv => write_csv(file, records)?,
        OutputFormat::Jsonl => write_jsonl(file, records)?,
    }

    info!(path = %path.display(), records = records.len(), "request records written");
    Ok(path)
}

pub fn write_csv<W: Write>(writer: W, records: &[RequestRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(CsvRow {
            id: record.id,
            jsonrpc: &record.jsonrpc,
            method: &record.method,
            params: record.params_json(),
        })?;
    }
    // An empty run still gets a header line.
    if records.is_empty() {
        csv.write_record(["id", "jsonrpc", "method", "params"])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_jsonl<W: Write>(writer: W, records: &[RequestRecord]) -> Result<()> {
    let mut out = BufWriter::new(writer);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
