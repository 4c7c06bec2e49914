//! CSV sensor-log ingestion.
//!
//! Field logs arrive with vendor-flavored headers ("Time (s)",
//! "Acceleration x (m/s^2)", sometimes the Unicode superscript spelling) and
//! occasionally latin-1 bytes. Headers are trimmed, lowercased, and resolved
//! against a static alias table once per file, before any estimation starts.
//! Files ending in `.gz` are decompressed transparently.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, Trim};
use flate2::read::GzDecoder;
use thiserror::Error;

use crate::types::{InertialSample, PositionSample};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path} is missing required columns after normalization: {missing:?}")]
    MissingColumns { path: String, missing: Vec<String> },

    #[error("{path}: row {row}: bad numeric value in column '{column}'")]
    InvalidValue {
        path: String,
        row: usize,
        column: String,
    },
}

const TIME_ALIASES: &[&str] = &["time", "time (s)", "timestamp"];
const AX_ALIASES: &[&str] = &["ax", "acceleration x (m/s^2)", "acceleration x (m/s²)"];
const AY_ALIASES: &[&str] = &["ay", "acceleration y (m/s^2)", "acceleration y (m/s²)"];
const AZ_ALIASES: &[&str] = &["az", "acceleration z (m/s^2)", "acceleration z (m/s²)"];
const LAT_ALIASES: &[&str] = &["lat", "latitude (deg)", "latitude"];
const LON_ALIASES: &[&str] = &["lon", "longitude (deg)", "longitude"];

/// Loads the inertial log: time plus three acceleration axes.
pub fn read_inertial<P: AsRef<Path>>(path: P) -> Result<Vec<InertialSample>, IngestError> {
    let columns = [
        ("time", TIME_ALIASES),
        ("ax", AX_ALIASES),
        ("ay", AY_ALIASES),
        ("az", AZ_ALIASES),
    ];
    read_rows(path.as_ref(), &columns, |v| InertialSample {
        timestamp: v[0],
        ax: v[1],
        ay: v[2],
        az: v[3],
    })
}

/// Loads the positional log: time, latitude, longitude.
pub fn read_position<P: AsRef<Path>>(path: P) -> Result<Vec<PositionSample>, IngestError> {
    let columns = [
        ("time", TIME_ALIASES),
        ("lat", LAT_ALIASES),
        ("lon", LON_ALIASES),
    ];
    read_rows(path.as_ref(), &columns, |v| PositionSample {
        timestamp: v[0],
        lat: v[1],
        lon: v[2],
    })
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>, std::io::Error> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn normalize_header(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_lowercase()
}

fn resolve(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.iter().any(|a| h == a))
}

fn read_rows<T, const N: usize>(
    path: &Path,
    columns: &[(&str, &[&str]); N],
    build: impl Fn([f64; N]) -> T,
) -> Result<Vec<T>, IngestError> {
    let display = path.display().to_string();
    let reader = open_reader(path).map_err(|source| IngestError::Io {
        path: display.clone(),
        source,
    })?;
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .byte_headers()
        .map_err(|source| IngestError::Csv {
            path: display.clone(),
            source,
        })?
        .iter()
        .map(normalize_header)
        .collect();

    let mut indices = [0usize; N];
    let mut missing = Vec::new();
    for (slot, (name, aliases)) in indices.iter_mut().zip(columns.iter()) {
        match resolve(&headers, aliases) {
            Some(idx) => *slot = idx,
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns {
            path: display,
            missing,
        });
    }

    let mut out = Vec::new();
    let mut record = ByteRecord::new();
    let mut row = 1usize;
    loop {
        let more = csv_reader
            .read_byte_record(&mut record)
            .map_err(|source| IngestError::Csv {
                path: display.clone(),
                source,
            })?;
        if !more {
            break;
        }
        row += 1;
        let mut values = [0.0f64; N];
        for ((slot, &idx), (name, _)) in values.iter_mut().zip(indices.iter()).zip(columns.iter()) {
            let field = record.get(idx).unwrap_or(b"");
            *slot = String::from_utf8_lossy(field)
                .trim()
                .parse()
                .map_err(|_| IngestError::InvalidValue {
                    path: display.clone(),
                    row,
                    column: name.to_string(),
                })?;
        }
        out.push(build(values));
    }
    Ok(out)
}
