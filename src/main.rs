mod api;
mod cli;
mod core;
mod pipeline;
mod prelude;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use clap::{Parser, crate_version};

use crate::{
    api::{envoy, influxdb::InfluxDb},
    cli::Args,
    pipeline::DryRun,
    prelude::*,
};

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    match run(&Args::parse()) {
        Ok(()) => {
            info!("done!");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result {
    args.trace();
    let envoy = envoy::Api::new(&args.envoy);
    if args.dry_run {
        pipeline::run(&envoy, &DryRun, &args.measurements)
    } else {
        pipeline::run(&envoy, &InfluxDb(&args.influxdb), &args.measurements)
    }
}
