use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CSV_HEADER: [&str; 5] = ["id", "winner_name", "car_type", "lap_time", "date"];

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("failed to access results file `{}`: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed record on line {line} of `{}`: {source}", path.display())]
    Json {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to write export: {0}")]
    Export(#[source] io::Error),
}

/// One finished race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub id: u64,
    pub winner_name: String,
    pub car_type: String,
    /// `MM:SS:CC`.
    pub lap_time: String,
    pub date: DateTime<Utc>,
}

/// Append-only JSON-lines file of race records.
#[derive(Debug, Clone)]
pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. A missing file is an empty log.
    pub fn load(&self) -> Result<Vec<RaceRecord>, ResultsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ResultsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|source| ResultsError::Json {
                    path: self.path.clone(),
                    line: index + 1,
                    source,
                })
            })
            .collect()
    }

    pub fn append(
        &self,
        winner_name: &str,
        car_type: &str,
        lap_time: &str,
    ) -> Result<RaceRecord, ResultsError> {
        self.append_at(winner_name, car_type, lap_time, Utc::now())
    }

    pub fn append_at(
        &self,
        winner_name: &str,
        car_type: &str,
        lap_time: &str,
        date: DateTime<Utc>,
    ) -> Result<RaceRecord, ResultsError> {
        let next_id = self
            .load()?
            .iter()
            .map(|record| record.id)
            .max()
            .unwrap_or(0)
            + 1;
        let record = RaceRecord {
            id: next_id,
            winner_name: winner_name.to_string(),
            car_type: car_type.to_string(),
            lap_time: lap_time.to_string(),
            date,
        };

        let io_error = |source| ResultsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let line = serde_json::to_string(&record).map_err(|source| ResultsError::Json {
            path: self.path.clone(),
            line: 0,
            source,
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        writeln!(file, "{line}").map_err(io_error)?;

        Ok(record)
    }

    /// Newest first; ties on date fall back to the higher id.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<RaceRecord>, ResultsError> {
        let mut records = self.load()?;
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

pub fn write_csv(records: &[RaceRecord], mut writer: impl Write) -> Result<(), ResultsError> {
    writeln!(writer, "{}", CSV_HEADER.join(",")).map_err(ResultsError::Export)?;
    for record in records {
        let fields = [
            record.id.to_string(),
            record.winner_name.clone(),
            record.car_type.clone(),
            record.lap_time.clone(),
            format_date(&record.date),
        ];
        let row: Vec<String> = fields.iter().map(|field| csv_field(field)).collect();
        writeln!(writer, "{}", row.join(",")).map_err(ResultsError::Export)?;
    }
    writer.flush().map_err(ResultsError::Export)
}

/// Column-aligned table with a header rule, or a notice when empty.
pub fn format_table(records: &[RaceRecord]) -> String {
    if records.is_empty() {
        return "No results to show.".to_string();
    }

    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|record| {
            [
                record.id.to_string(),
                record.winner_name.clone(),
                record.car_type.clone(),
                record.lap_time.clone(),
                format_date(&record.date),
            ]
        })
        .collect();

    let mut widths = CSV_HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let header = render(CSV_HEADER.to_vec());
    let mut lines = vec![header.clone(), "-".repeat(header.chars().count())];
    for row in &rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
