// crates/xm-core/src/model.rs

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{DateKeyError, TransformFailure};
use crate::transform::ScratchFile;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The calendar day a run processes. Only canonical `YYYY-MM-DD` text is accepted, so the
/// parsed value prints back exactly as it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn parse(raw: &str) -> Result<Self, DateKeyError> {
        let day = NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| DateKeyError::Invalid(raw.to_string()))?;
        if day.format(DATE_FORMAT).to_string() != raw {
            return Err(DateKeyError::Invalid(raw.to_string()));
        }
        Ok(Self(day))
    }

    /// Name shared by the scratch file and the uploaded object.
    pub fn file_name(&self) -> String {
        format!("{self}.csv")
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Decoded upstream payload. `status_code` is filled from the HTTP response.
///
/// `Items` is required: a body without it (an error envelope, `{}`) is a decode
/// failure rather than an empty day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawApiResponse {
    #[serde(skip)]
    pub status_code: u16,
    #[serde(rename = "Items")]
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    #[serde(rename = "HourlyEntities", default)]
    pub hourly_entities: Vec<HourlyEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyEntity {
    #[serde(rename = "Values", default)]
    pub values: Option<Map<String, Value>>,
}

/// Checked view of `HourlyEntities[0].Values` for one item.
#[derive(Debug, Clone, Copy)]
pub struct ItemValues<'a> {
    pub activity: &'a str,
    pub subactivity: &'a str,
    pub fields: &'a Map<String, Value>,
}

impl RawItem {
    pub fn values(&self, index: usize) -> Result<ItemValues<'_>, TransformFailure> {
        let entity = self
            .hourly_entities
            .first()
            .ok_or(TransformFailure::MissingHourlyEntity { index })?;
        let fields = entity
            .values
            .as_ref()
            .ok_or(TransformFailure::MissingValues { index })?;

        let text = move |field: &'static str| {
            fields
                .get(field)
                .and_then(Value::as_str)
                .ok_or(TransformFailure::MissingField { index, field })
        };

        Ok(ItemValues {
            activity: text("Activity")?,
            subactivity: text("Subactivity")?,
            fields,
        })
    }
}

/// Outcome of one run, returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub file_name: Option<String>,
    pub local_path: Option<String>,
    pub remote_path: String,
    pub success: bool,
}

impl ResultSummary {
    pub fn new(bucket: &str, date: &DateKey, scratch: Option<&ScratchFile>, success: bool) -> Self {
        Self {
            file_name: scratch.and_then(ScratchFile::file_name),
            local_path: scratch.map(|file| file.path.display().to_string()),
            remote_path: format!("{bucket}/{date}"),
            success,
        }
    }
}
