use crate::units::{Measurement, Unit};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Column order of the volume table entry, as walked by the agent.
const COLUMNS: [&str; 6] = [
    "index",
    "description",
    "filesystem",
    "total size",
    "free size",
    "status",
];
const DESCRIPTION: usize = 1;
const TOTAL_SIZE: usize = 3;
const FREE_SIZE: usize = 4;
const STATUS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeStatus {
    Ready,
    Abnormal,
    Invalid,
    Unmounted,
    Synchronizing,
    Other(String),
}

/// A size column. Only Ready volumes have their sizes parsed; the device makes
/// no promise about the text it reports for the others.
#[derive(Debug, Clone, PartialEq)]
pub enum Size {
    Measured(Measurement),
    Unreported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeRecord {
    pub description: String,
    pub total_size: Size,
    pub free_size: Size,
    pub status: VolumeStatus,
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("SNMP line: bad format of: {0}")]
    Malformed(String),
    #[error("SNMP line: expected a STRING value: {0}")]
    UnexpectedType(String),
    #[error("SNMP line: expected {column} column: {line}")]
    ColumnMismatch { column: &'static str, line: String },
    #[error("{column} column: expected {expected} lines, only {available} available")]
    Truncated {
        column: &'static str,
        expected: usize,
        available: usize,
    },
    #[error("bad size value: {0}")]
    BadSize(String),
}

impl VolumeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Ready" => VolumeStatus::Ready,
            "Abnormal" => VolumeStatus::Abnormal,
            "Invalid" => VolumeStatus::Invalid,
            "Unmounted" => VolumeStatus::Unmounted,
            "Synchronizing" => VolumeStatus::Synchronizing,
            other => VolumeStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VolumeStatus::Ready => "Ready",
            VolumeStatus::Abnormal => "Abnormal",
            VolumeStatus::Invalid => "Invalid",
            VolumeStatus::Unmounted => "Unmounted",
            VolumeStatus::Synchronizing => "Synchronizing",
            VolumeStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VolumeRecord {
    pub fn is_ready(&self) -> bool {
        self.status == VolumeStatus::Ready
    }
}

/// Split one walk line into its OID and the `TYPE: value` remainder.
fn split_line(line: &str) -> Result<(&str, &str), DecodeError> {
    line.split_once(" = ")
        .map(|(oid, rest)| (oid.trim(), rest.trim()))
        .ok_or_else(|| DecodeError::Malformed(line.to_string()))
}

fn trim_dot(oid: &str) -> &str {
    oid.trim_start_matches('.')
}

/// True when `oid` is a row of the column identified by `column_oid`.
fn in_column(oid: &str, column_oid: &str) -> bool {
    trim_dot(oid)
        .strip_prefix(trim_dot(column_oid))
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Length of the leading run of lines that belong to the index column.
pub fn table_entries(lines: &[&str], index_oid: &str) -> usize {
    lines
        .iter()
        .take_while(|line| {
            let oid = line.split('=').next().unwrap_or_default().trim();
            in_column(oid, index_oid)
        })
        .count()
}

/// String payload of a `STRING:` line, without the surrounding quotes.
pub fn extract_string(line: &str) -> Result<String, DecodeError> {
    let (_, typed) = split_line(line)?;
    let value = typed
        .strip_prefix("STRING:")
        .ok_or_else(|| DecodeError::UnexpectedType(line.to_string()))?;
    Ok(value.trim().trim_matches('"').to_string())
}

/// Parse `"10.77 TB"` into a measurement. The number must be finite and
/// not negative.
pub fn parse_measurement(raw: &str) -> Result<Measurement, DecodeError> {
    let (value, unit) = raw
        .trim()
        .split_once(' ')
        .ok_or_else(|| DecodeError::BadSize(raw.to_string()))?;
    let value: f64 = value
        .parse()
        .map_err(|_| DecodeError::BadSize(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DecodeError::BadSize(raw.to_string()));
    }
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(DecodeError::BadSize(raw.to_string()));
    }
    Ok(Measurement::new(value, Unit::parse(unit)))
}

/// The `col`-th block of `rows` lines, checked to belong to that column.
fn column_block<'a>(
    lines: &'a [&'a str],
    rows: usize,
    entry_oid: &str,
    col: usize,
) -> Result<&'a [&'a str], DecodeError> {
    let start = col * rows;
    let available = lines.len().saturating_sub(start).min(rows);
    if available < rows {
        return Err(DecodeError::Truncated {
            column: COLUMNS[col],
            expected: rows,
            available,
        });
    }

    let block = &lines[start..start + rows];
    let column_oid = format!("{entry_oid}.{}", col + 1);
    for line in block {
        let (oid, _) = split_line(line)?;
        if !in_column(oid, &column_oid) {
            return Err(DecodeError::ColumnMismatch {
                column: COLUMNS[col],
                line: line.to_string(),
            });
        }
    }
    Ok(block)
}

/// Decode a walk of the volume table into one record per row.
///
/// The walk has no per-row tags: the row count is the length of the leading
/// index run, after which the lines fall into six blocks of that length, one
/// per column, in column order.
pub fn decode_volume_table(text: &str, index_oid: &str) -> Result<Vec<VolumeRecord>, DecodeError> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let rows = table_entries(&lines, index_oid);
    debug!(rows, lines = lines.len(), "volume table rows");
    if rows == 0 {
        return Ok(Vec::new());
    }

    let entry_oid = trim_dot(index_oid)
        .rsplit_once('.')
        .map(|(entry, _)| entry)
        .ok_or_else(|| DecodeError::Malformed(index_oid.to_string()))?;

    let descr = column_block(&lines, rows, entry_oid, DESCRIPTION)?;
    let total = column_block(&lines, rows, entry_oid, TOTAL_SIZE)?;
    let free = column_block(&lines, rows, entry_oid, FREE_SIZE)?;
    let states = column_block(&lines, rows, entry_oid, STATUS)?;

    let mut records = Vec::with_capacity(rows);
    for (((descr, total), free), state) in descr.iter().zip(total).zip(free).zip(states) {
        let description = extract_string(descr)?;
        let raw_total = extract_string(total)?;
        let raw_free = extract_string(free)?;
        let status = VolumeStatus::parse(&extract_string(state)?);

        let (total_size, free_size) = if status == VolumeStatus::Ready {
            (
                Size::Measured(parse_measurement(&raw_total)?),
                Size::Measured(parse_measurement(&raw_free)?),
            )
        } else {
            (Size::Unreported(raw_total), Size::Unreported(raw_free))
        };

        records.push(VolumeRecord {
            description,
            total_size,
            free_size,
            status,
        });
    }

    Ok(records)
}
