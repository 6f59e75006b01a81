pub mod digest;
pub mod envoy;
pub mod influxdb;
