use crate::{
    api::envoy::{InverterReading, ProductionReport},
    cli::MeasurementArgs,
    core::{
        mapping::{UNKNOWN_LOCATION, aggregate_point, inverter_point},
        point::Point,
    },
    prelude::*,
};

/// Source of the raw gateway documents.
pub trait Gateway {
    /// `production.json?details=1` body.
    fn get_production_json(&self) -> Result<String>;

    /// `/api/v1/production/inverters` body.
    fn get_inverters_json(&self) -> Result<String>;
}

/// Time series database accepting one batch per call.
pub trait PointSink {
    fn write(&self, points: &[Point]) -> Result;
}

/// Logs the line protocol instead of writing it anywhere.
pub struct DryRun;

impl PointSink for DryRun {
    fn write(&self, points: &[Point]) -> Result {
        for point in points {
            info!(line = %point, "dry run");
        }
        Ok(())
    }
}

/// Fetch, decode, map, and write both sources, stopping at the first failure.
///
/// The two batches are independent: a failed inverter write does not undo the aggregate one.
pub fn run(gateway: &impl Gateway, sink: &impl PointSink, measurements: &MeasurementArgs) -> Result {
    let points = collect_aggregate_points(gateway, &measurements.readings)?;
    write_batch(sink, &points).context("failed to write the production and consumption batch")?;

    let points = collect_inverter_points(gateway, &measurements.inverter_readings)?;
    write_batch(sink, &points).context("failed to write the inverter batch")?;

    Ok(())
}

#[instrument(skip_all)]
fn collect_aggregate_points(gateway: &impl Gateway, measurement: &str) -> Result<Vec<Point>> {
    let body = gateway.get_production_json().context("failed to fetch the production report")?;
    let report =
        ProductionReport::from_json(&body).context("failed to decode the production report")?;

    info!(
        active_count = report.inverters.active_count,
        n_storage = report.storage.as_array().map_or(0, Vec::len),
        "inverters"
    );
    info!(
        reading_time = report.production.reading_time,
        watts = report.production.w_now,
        "production"
    );
    for reading in &report.consumption {
        info!(
            reading_time = reading.reading_time,
            watts = reading.w_now,
            rms_voltage = reading.rms_voltage,
            "{}",
            reading.measurement_type
        );
    }

    std::iter::once(&report.production)
        .chain(&report.consumption)
        .map(|reading| {
            aggregate_point(measurement, reading).with_context(|| {
                format!("failed to build the `{}` point", reading.measurement_type)
            })
        })
        .collect()
}

#[instrument(skip_all)]
fn collect_inverter_points(gateway: &impl Gateway, measurement: &str) -> Result<Vec<Point>> {
    let body = gateway.get_inverters_json().context("failed to fetch the inverter readings")?;
    let readings =
        InverterReading::from_json_array(&body).context("failed to decode the inverter readings")?;

    readings
        .iter()
        .map(|reading| {
            info!(
                date = reading.last_report_date,
                location = UNKNOWN_LOCATION,
                serial = %reading.serial_number,
                max_watts = reading.max_report_watts,
                last_watts = reading.last_report_watts,
                "inverter"
            );
            inverter_point(measurement, reading, UNKNOWN_LOCATION).with_context(|| {
                format!("failed to build the inverter `{}` point", reading.serial_number)
            })
        })
        .collect()
}

fn write_batch(sink: &impl PointSink, points: &[Point]) -> Result {
    if points.is_empty() {
        warn!("nothing to write");
        return Ok(());
    }
    sink.write(points)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::core::point::FieldValue;

    struct FakeGateway {
        production: &'static str,
        inverters: &'static str,
    }

    impl Gateway for FakeGateway {
        fn get_production_json(&self) -> Result<String> {
            Ok(self.production.to_string())
        }

        fn get_inverters_json(&self) -> Result<String> {
            Ok(self.inverters.to_string())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        batches: RefCell<Vec<Vec<Point>>>,
        fail: bool,
    }

    impl PointSink for RecordingSink {
        fn write(&self, points: &[Point]) -> Result {
            ensure!(!self.fail, "database is down");
            self.batches.borrow_mut().push(points.to_vec());
            Ok(())
        }
    }

    fn measurements() -> MeasurementArgs {
        MeasurementArgs {
            readings: "readings".to_string(),
            inverter_readings: "inverter_readings".to_string(),
        }
    }

    // language=JSON
    const PRODUCTION: &str = r#"{
        "production": [
            {"activeCount": 2},
            {
                "readingTime": 1000,
                "measurementType": "production",
                "wNow": 250.5,
                "whToday": 1200,
                "whLastSevenDays": 8000,
                "whLifetime": 500000
            }
        ],
        "consumption": [
            {
                "readingTime": 1000,
                "measurementType": "net-consumption",
                "wNow": -50.2,
                "whToday": 300,
                "whLastSevenDays": 2000,
                "whLifetime": 10000
            }
        ]
    }"#;

    // language=JSON
    const INVERTERS: &str = r#"[
        {"serialNumber": "A1", "lastReportDate": 990, "devType": 1, "lastReportWatts": 120, "maxReportWatts": 250},
        {"serialNumber": "A2", "lastReportDate": 995, "devType": 1, "lastReportWatts": 118, "maxReportWatts": 249},
        {"serialNumber": "A3", "lastReportDate": 998, "devType": 1, "lastReportWatts": 0, "maxReportWatts": 251}
    ]"#;

    #[test]
    fn test_run_ok() -> Result {
        let sink = RecordingSink::default();
        run(&FakeGateway { production: PRODUCTION, inverters: INVERTERS }, &sink, &measurements())?;

        let batches = sink.batches.into_inner();
        assert_eq!(batches.len(), 2);

        let aggregate = &batches[0];
        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate[0].measurement, "readings");
        assert_eq!(aggregate[0].tags["type"], "production");
        assert_eq!(aggregate[0].fields["power_now_watts"], FieldValue::Float(250.5));
        assert_eq!(aggregate[1].tags["type"], "net-consumption");
        assert_eq!(aggregate[1].fields["power_now_watts"], FieldValue::Float(-50.2));
        for point in aggregate {
            assert_eq!(point.timestamp(), 1000);
            assert_eq!(point.fields.len(), 5);
        }

        let inverters = &batches[1];
        assert_eq!(inverters.len(), 3);
        for (point, (serial, timestamp)) in inverters.iter().zip([("A1", 990), ("A2", 995), ("A3", 998)]) {
            assert_eq!(point.measurement, "inverter_readings");
            assert_eq!(point.tags["serial"], serial);
            assert_eq!(point.tags["location"], UNKNOWN_LOCATION);
            assert_eq!(point.timestamp(), timestamp);
        }
        Ok(())
    }

    #[test]
    fn test_malformed_production_aborts_before_any_write() {
        let sink = RecordingSink::default();
        let result = run(
            &FakeGateway { production: "<html>502 Bad Gateway</html>", inverters: INVERTERS },
            &sink,
            &measurements(),
        );
        let error = result.expect_err("the run must fail");
        assert!(format!("{error:#}").contains("failed to decode the production report"));
        assert!(sink.batches.borrow().is_empty());
    }

    #[test]
    fn test_malformed_inverters_keeps_aggregate_batch() {
        let sink = RecordingSink::default();
        let result = run(
            &FakeGateway { production: PRODUCTION, inverters: "Unauthorized" },
            &sink,
            &measurements(),
        );
        let error = result.expect_err("the run must fail");
        assert!(format!("{error:#}").contains("failed to decode the inverter readings"));
        assert_eq!(sink.batches.borrow().len(), 1);
    }

    #[test]
    fn test_write_failure_stops_the_run() {
        let sink = RecordingSink { fail: true, ..RecordingSink::default() };
        let error = run(
            &FakeGateway { production: PRODUCTION, inverters: INVERTERS },
            &sink,
            &measurements(),
        )
        .expect_err("the run must fail");
        assert!(format!("{error:#}").contains("failed to write the production and consumption batch"));
    }

    #[test]
    fn test_empty_inverters_skips_write() -> Result {
        let sink = RecordingSink::default();
        run(&FakeGateway { production: PRODUCTION, inverters: "[]" }, &sink, &measurements())?;
        assert_eq!(sink.batches.into_inner().len(), 1);
        Ok(())
    }
}
