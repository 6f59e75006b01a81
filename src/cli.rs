use clap::Parser;

use crate::prelude::*;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[clap(flatten)]
    pub envoy: EnvoyArgs,

    #[clap(flatten)]
    pub influxdb: InfluxDbArgs,

    #[clap(flatten)]
    pub measurements: MeasurementArgs,

    /// Fetch and map the readings, but log the points instead of writing them to InfluxDB.
    #[clap(long, env = "DRY_RUN")]
    pub dry_run: bool,
}

impl Args {
    /// Log the effective configuration, secrets excluded.
    pub fn trace(&self) {
        info!(
            envoy_host = %self.envoy.host,
            envoy_username = %self.envoy.username,
            influxdb_url = %self.influxdb.url,
            influxdb_database = %self.influxdb.database,
            influxdb_username = %self.influxdb.username,
            measurement = %self.measurements.readings,
            inverter_measurement = %self.measurements.inverter_readings,
            dry_run = self.dry_run,
            "configuration"
        );
    }
}

#[derive(Parser)]
pub struct EnvoyArgs {
    /// IP address or hostname of the Envoy gateway.
    #[clap(long = "envoy-host", default_value = "envoy.local", env = "ENVOY_HOST_PTR")]
    pub host: String,

    #[clap(id = "envoy_username", long = "envoy-username", default_value = "envoy", env = "ENVOY_USER_NAME")]
    pub username: String,

    /// Envoy password: the last 6 digits of the gateway serial number.
    #[clap(
        id = "envoy_password",
        long = "envoy-password",
        default_value = "12345",
        env = "ENVOY_PASSWORD",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,
}

#[derive(Parser)]
pub struct InfluxDbArgs {
    /// InfluxDB HTTP API base URL.
    #[clap(long = "influxdb-url", default_value = "http://localhost:8086", env = "INFLUX_ADDR_PTR")]
    pub url: String,

    /// Database to put the readings in.
    #[clap(long = "influxdb-database", default_value = "db0", env = "DB_NAME_PTR")]
    pub database: String,

    #[clap(id = "influxdb_username", long = "influxdb-username", default_value = "admin", env = "DB_USER_PTR")]
    pub username: String,

    #[clap(
        id = "influxdb_password",
        long = "influxdb-password",
        default_value = "admin",
        env = "DB_PW_PTR",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,
}

#[derive(Parser)]
pub struct MeasurementArgs {
    /// Measurement name for the production and consumption readings.
    #[clap(long = "measurement", default_value = "readings", env = "MEASUREMENT_NAME_PTR")]
    pub readings: String,

    /// Measurement name for the per-inverter readings.
    #[clap(
        long = "inverter-measurement",
        default_value = "inverter_readings",
        env = "MEASUREMENT_INVERTER_NAME_PTR"
    )]
    pub inverter_readings: String,
}
