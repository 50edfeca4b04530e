//! Reshapes the upstream payload into one CSV row per manufacturing food subsector.
//!
//! Rows carry every non-hourly `Values` field, the row-wise `sum` of the `Hour*` fields and
//! the run date. The file lands at `{scratch_dir}/{date}.csv`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::TransformFailure;
use crate::model::{DateKey, ItemValues, RawApiResponse};

pub const TARGET_ACTIVITY: &str = "INDUSTRIAS MANUFACTURERAS";
pub const SUBACTIVITY_PREFIX: &str = "ELABORACIÓN DE PRODUCTOS";
pub const EXCLUDED_SUBACTIVITY: &str = "ELABORACIÓN DE PRODUCTOS DE TABACO";
pub const HOURLY_PREFIX: &str = "Hour";
pub const SUM_COLUMN: &str = "sum";
pub const DATE_COLUMN: &str = "date";

/// Scratch file written for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    pub path: PathBuf,
    pub rows: usize,
}

impl ScratchFile {
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// One output row before it is laid out as a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRecord {
    /// Non-hourly fields in payload order.
    pub fields: Vec<(String, Value)>,
    pub sum: f64,
    pub date: DateKey,
}

#[derive(Debug, Clone)]
pub struct TransformEngine {
    scratch_dir: PathBuf,
}

impl TransformEngine {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_path(&self, date: &DateKey) -> PathBuf {
        self.scratch_dir.join(date.file_name())
    }

    /// Runs the whole transform. Failures are logged here and handed back to the caller,
    /// who decides whether the run continues.
    pub fn transform(
        &self,
        payload: &RawApiResponse,
        date: &DateKey,
    ) -> Result<ScratchFile, TransformFailure> {
        match self.write_scratch(payload, date) {
            Ok(scratch) => {
                info!(
                    date = %date,
                    items = payload.items.len(),
                    rows = scratch.rows,
                    path = %scratch.path.display(),
                    "scratch file written"
                );
                Ok(scratch)
            }
            Err(failure) => {
                warn!(
                    date = %date,
                    failure = failure.kind(),
                    "could not write the scratch file: {failure}"
                );
                Err(failure)
            }
        }
    }

    fn write_scratch(
        &self,
        payload: &RawApiResponse,
        date: &DateKey,
    ) -> Result<ScratchFile, TransformFailure> {
        let items = validate_items(payload)?;
        let selected: Vec<ItemValues<'_>> = items
            .into_iter()
            .filter(is_target_subsector)
            .collect();

        let records = flatten_records(&selected, date)?;
        let mut frame = records_to_frame(&records)?;

        let path = self.scratch_path(date);
        write_csv(&mut frame, &path)?;

        Ok(ScratchFile {
            path,
            rows: records.len(),
        })
    }
}

/// Checks every item up front so shape errors surface before any filtering.
///
/// This is stricter than an `Activity`-first filter: an item outside the target
/// activity with a missing or non-string `Subactivity` still fails the whole payload.
pub fn validate_items(payload: &RawApiResponse) -> Result<Vec<ItemValues<'_>>, TransformFailure> {
    payload
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| item.values(index))
        .collect()
}

pub fn is_target_subsector(values: &ItemValues<'_>) -> bool {
    values.activity == TARGET_ACTIVITY
        && values.subactivity.starts_with(SUBACTIVITY_PREFIX)
        && values.subactivity != EXCLUDED_SUBACTIVITY
}

pub fn is_hourly_field(name: &str) -> bool {
    name.starts_with(HOURLY_PREFIX)
}

pub fn flatten_records(
    items: &[ItemValues<'_>],
    date: &DateKey,
) -> Result<Vec<FlattenedRecord>, TransformFailure> {
    items
        .iter()
        .enumerate()
        .map(|(row, item)| flatten_record(row, item.fields, date))
        .collect()
}

fn flatten_record(
    row: usize,
    values: &Map<String, Value>,
    date: &DateKey,
) -> Result<FlattenedRecord, TransformFailure> {
    let mut fields = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (name, value) in values {
        if is_hourly_field(name) {
            if let Some(hour) = hourly_value(row, name, value)? {
                sum += hour;
            }
        } else if name != SUM_COLUMN && name != DATE_COLUMN {
            fields.push((name.clone(), value.clone()));
        }
    }

    Ok(FlattenedRecord {
        fields,
        sum,
        date: *date,
    })
}

/// `null` (and NaN) count as missing; anything that is not a number or numeric text fails.
fn hourly_value(row: usize, field: &str, value: &Value) -> Result<Option<f64>, TransformFailure> {
    let non_numeric = || TransformFailure::NonNumericHour {
        row,
        field: field.to_string(),
    };

    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_f64().ok_or_else(non_numeric)?,
        Value::String(text) => text.trim().parse::<f64>().map_err(|_| non_numeric())?,
        _ => return Err(non_numeric()),
    };

    Ok((!parsed.is_nan()).then_some(parsed))
}

/// Lays records out as columns: the union of field names in first-seen order, then
/// `sum` and `date`.
pub fn records_to_frame(records: &[FlattenedRecord]) -> Result<DataFrame, TransformFailure> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for (name, _) in &record.fields {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(names.len() + 2);
    for name in &names {
        let cells: Vec<Option<String>> = records
            .iter()
            .map(|record| {
                record
                    .fields
                    .iter()
                    .find(|(field, _)| field == name)
                    .and_then(|(_, value)| cell_text(value))
            })
            .collect();
        columns.push(Series::new((*name).into(), cells).into());
    }

    let sums: Vec<f64> = records.iter().map(|record| record.sum).collect();
    columns.push(Series::new(SUM_COLUMN.into(), sums).into());

    let dates: Vec<String> = records.iter().map(|record| record.date.to_string()).collect();
    columns.push(Series::new(DATE_COLUMN.into(), dates).into());

    Ok(DataFrame::new(columns)?)
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn write_csv(frame: &mut DataFrame, path: &Path) -> Result<(), TransformFailure> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)?;
    Ok(())
}
