use std::{collections::BTreeMap, fmt, fmt::Write};

use chrono::{DateTime, Utc};

/// Time series field value.
#[derive(Copy, Clone, Debug, PartialEq, derive_more::Display, derive_more::From)]
pub enum FieldValue {
    #[display("{_0}i")]
    Integer(i64),

    #[display("{_0}")]
    Float(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum PointError {
    #[error("measurement name is empty")]
    EmptyMeasurement,

    #[error("point has no fields")]
    NoFields,

    #[error("field `{0}` is not a finite number")]
    NonFiniteField(String),

    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

/// A single time series row: measurement name, tag set, field set, and a timestamp in whole seconds.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub time: DateTime<Utc>,
}

impl Point {
    /// Build a point at the given Unix second.
    ///
    /// Non-finite floats are rejected since the line protocol cannot represent them.
    pub fn try_new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
        timestamp: i64,
    ) -> Result<Self, PointError> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if fields.is_empty() {
            return Err(PointError::NoFields);
        }
        if let Some((key, _)) = fields
            .iter()
            .find(|(_, value)| matches!(value, FieldValue::Float(value) if !value.is_finite()))
        {
            return Err(PointError::NonFiniteField(key.clone()));
        }
        let time = DateTime::from_timestamp(timestamp, 0)
            .ok_or(PointError::TimestampOutOfRange(timestamp))?;
        Ok(Self { measurement, tags, fields, time })
    }

    pub fn timestamp(&self) -> i64 {
        self.time.timestamp()
    }
}

/// Line protocol with second precision.
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.measurement, &[',', ' '])?;

        // Empty tag values are not representable, the server would reject the whole line.
        for (key, value) in self.tags.iter().filter(|(_, value)| !value.is_empty()) {
            f.write_char(',')?;
            write_escaped(f, key, &[',', '=', ' '])?;
            f.write_char('=')?;
            write_escaped(f, value, &[',', '=', ' '])?;
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            f.write_char(if i == 0 { ' ' } else { ',' })?;
            write_escaped(f, key, &[',', '=', ' '])?;
            write!(f, "={value}")?;
        }

        write!(f, " {}", self.timestamp())
    }
}

fn write_escaped(f: &mut impl Write, text: &str, special: &[char]) -> fmt::Result {
    for c in text.chars() {
        if special.contains(&c) {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    Ok(())
}
