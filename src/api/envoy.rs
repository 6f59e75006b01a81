mod models;

use std::time::Duration;

use ureq::Agent;

pub use self::models::{AggregateReading, InverterReading, ProductionReport};
use crate::{
    api::digest::{self, Credentials},
    cli::EnvoyArgs,
    pipeline::Gateway,
    prelude::*,
};

/// Enphase Envoy gateway local API.
pub struct Api<'a> {
    agent: Agent,
    host: &'a str,
    credentials: Credentials<'a>,
}

impl<'a> Api<'a> {
    pub fn new(args: &'a EnvoyArgs) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(4)))
            .http_status_as_error(false)
            .build()
            .into();
        let credentials = Credentials { username: &args.username, password: &args.password };
        Self { agent, host: &args.host, credentials }
    }

    fn production_url(&self) -> String {
        format!("http://{}/production.json?details=1", self.host)
    }

    fn inverters_url(&self) -> String {
        format!("http://{}/api/v1/production/inverters", self.host)
    }
}

impl Gateway for Api<'_> {
    #[instrument(skip_all, fields(host = self.host))]
    fn get_production_json(&self) -> Result<String> {
        info!("fetching the production report…");
        let url = self.production_url();
        let mut response =
            self.agent.get(&url).call().with_context(|| format!("failed to request `{url}`"))?;
        ensure!(response.status().is_success(), "`{url}` failed with {}", response.status());
        response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("failed to read the `{url}` response"))
    }

    #[instrument(skip_all, fields(host = self.host))]
    fn get_inverters_json(&self) -> Result<String> {
        info!("fetching the inverter readings…");
        let url = self.inverters_url();
        let mut response = digest::get(&self.agent, &url, self.credentials)
            .with_context(|| format!("digest authentication against `{url}` failed"))?;
        ensure!(response.status().is_success(), "`{url}` failed with {}", response.status());
        response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("failed to read the `{url}` response"))
    }
}
