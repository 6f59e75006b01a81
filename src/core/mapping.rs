use std::collections::BTreeMap;

use crate::{
    api::envoy::{AggregateReading, InverterReading},
    core::point::{FieldValue, Point, PointError},
};

/// Location tag for inverters: nothing maps serial numbers to locations yet.
pub const UNKNOWN_LOCATION: &str = "unknown";

pub fn aggregate_point(measurement: &str, reading: &AggregateReading) -> Result<Point, PointError> {
    Point::try_new(
        measurement,
        BTreeMap::from([("type".to_string(), reading.measurement_type.clone())]),
        BTreeMap::from([
            ("active_count".to_string(), FieldValue::Integer(reading.active_count)),
            ("power_now_watts".to_string(), FieldValue::Float(reading.w_now)),
            ("today_watthours".to_string(), FieldValue::Float(reading.wh_today)),
            ("7days_watthours".to_string(), FieldValue::Float(reading.wh_last_seven_days)),
            ("lifetime_watthours".to_string(), FieldValue::Float(reading.wh_lifetime)),
        ]),
        reading.reading_time,
    )
}

pub fn inverter_point(
    measurement: &str,
    reading: &InverterReading,
    location: &str,
) -> Result<Point, PointError> {
    Point::try_new(
        measurement,
        BTreeMap::from([
            ("serial".to_string(), reading.serial_number.clone()),
            ("location".to_string(), location.to_string()),
        ]),
        BTreeMap::from([
            ("last_report_watts".to_string(), FieldValue::Float(reading.last_report_watts)),
            ("max_report_watts".to_string(), FieldValue::Float(reading.max_report_watts)),
        ]),
        reading.last_report_date,
    )
}
