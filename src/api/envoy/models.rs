use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use serde_with::{DefaultOnNull, serde_as};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to deserialize the document")]
    Json(#[from] serde_json::Error),

    #[error("expected {expected} production entries, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("production entry #{index} has an unexpected shape")]
    WrongShape {
        index: usize,

        #[source]
        source: serde_json::Error,
    },
}

/// `production.json?details=1` as served by the gateway.
#[must_use]
pub struct ProductionReport {
    pub inverters: InverterSummary,
    pub production: AggregateReading,
    pub consumption: Vec<AggregateReading>,
    pub storage: Value,
}

impl ProductionReport {
    /// Decode the report.
    ///
    /// The `production` section is a fixed two-element array of different shapes:
    /// the inverter summary, then the metered production reading.
    pub fn from_json(body: &str) -> Result<Self, DecodeError> {
        #[serde_as]
        #[derive(Deserialize)]
        struct Raw {
            #[serde_as(as = "DefaultOnNull")]
            production: Vec<Value>,

            #[serde_as(as = "DefaultOnNull")]
            consumption: Vec<AggregateReading>,

            #[serde(default)]
            storage: Value,
        }

        let raw: Raw = serde_json::from_str(body)?;
        let [inverters, production] = <[Value; 2]>::try_from(raw.production)
            .map_err(|production| DecodeError::WrongLength { expected: 2, actual: production.len() })?;
        Ok(Self {
            inverters: decode_entry(0, inverters)?,
            production: decode_entry(1, production)?,
            consumption: raw.consumption,
            storage: raw.storage,
        })
    }
}

fn decode_entry<T: DeserializeOwned + Default>(index: usize, value: Value) -> Result<T, DecodeError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|source| DecodeError::WrongShape { index, source })
}

#[must_use]
#[serde_as]
#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InverterSummary {
    #[serde_as(as = "DefaultOnNull")]
    pub active_count: i64,
}

/// Production or consumption roll-up for one measurement type.
///
/// Missing and `null` values decode as zeroes, the gateway omits some of them depending on the firmware.
#[must_use]
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateReading {
    /// For example, `production`, `total-consumption`, or `net-consumption`.
    #[serde_as(as = "DefaultOnNull")]
    pub measurement_type: String,

    #[serde_as(as = "DefaultOnNull")]
    pub active_count: i64,

    /// Unix timestamp in seconds.
    #[serde_as(as = "DefaultOnNull")]
    pub reading_time: i64,

    #[serde_as(as = "DefaultOnNull")]
    pub w_now: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub wh_today: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub wh_last_seven_days: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub wh_lifetime: f64,

    #[serde_as(as = "DefaultOnNull")]
    pub rms_current: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub rms_voltage: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub react_pwr: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub apprnt_pwr: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub pwr_factor: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub vah_lifetime: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub varh_lead_lifetime: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub varh_lag_lifetime: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub vah_today: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub varh_lead_today: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub varh_lag_today: f64,
}

/// `/api/v1/production/inverters` entry.
#[must_use]
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InverterReading {
    #[serde_as(as = "DefaultOnNull")]
    pub serial_number: String,

    /// Unix timestamp in seconds.
    #[serde_as(as = "DefaultOnNull")]
    pub last_report_date: i64,

    #[serde_as(as = "DefaultOnNull")]
    pub last_report_watts: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub max_report_watts: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub dev_type: i64,
}

impl InverterReading {
    pub fn from_json_array(body: &str) -> Result<Vec<Self>, DecodeError> {
        Ok(serde_json::from_str(body)?)
    }
}
