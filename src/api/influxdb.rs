use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use itertools::Itertools;
use ureq::Agent;

use crate::{cli::InfluxDbArgs, core::point::Point, pipeline::PointSink, prelude::*};

/// InfluxDB 1.x HTTP write API client.
///
/// Holds no open connection by itself: it lives for a single batch.
pub struct Client<'a> {
    agent: Agent,
    args: &'a InfluxDbArgs,
}

impl<'a> Client<'a> {
    #[instrument(skip_all, fields(url = %args.url, database = %args.database))]
    pub fn connect(args: &'a InfluxDbArgs) -> Self {
        debug!("connecting…");
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(10)))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent, args }
    }

    /// HTTP basic credentials, none for an empty username.
    fn basic_authorization(&self) -> Option<String> {
        if self.args.username.is_empty() {
            return None;
        }
        let credentials = format!("{}:{}", self.args.username, self.args.password);
        Some(format!("Basic {}", BASE64_STANDARD.encode(credentials)))
    }

    fn write_url(&self) -> String {
        format!("{}/write", self.args.url.trim_end_matches('/'))
    }

    /// Submit the points as one line protocol batch with second precision.
    ///
    /// Any non-2xx status fails with the server's error message attached.
    #[instrument(skip_all, fields(n_points = points.len()))]
    pub fn write(&self, points: &[Point]) -> Result {
        let body = encode_batch(points);
        let url = self.write_url();
        let mut request = self
            .agent
            .post(&url)
            .query("db", &self.args.database)
            .query("precision", "s")
            .header(CONTENT_TYPE, "text/plain; charset=utf-8");
        if let Some(authorization) = self.basic_authorization() {
            request = request.header(AUTHORIZATION, authorization);
        }
        let mut response =
            request.send(body.as_bytes()).with_context(|| format!("failed to call `{url}`"))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.body_mut().read_to_string().unwrap_or_default();
            bail!("`{url}` failed with {status}: {}", message.trim());
        }
        info!(n_points = points.len(), "written");
        Ok(())
    }
}

pub fn encode_batch(points: &[Point]) -> String {
    points.iter().join("\n")
}

/// Writes each batch through a fresh client, dropped as soon as the batch is written.
pub struct InfluxDb<'a>(pub &'a InfluxDbArgs);

impl PointSink for InfluxDb<'_> {
    fn write(&self, points: &[Point]) -> Result {
        Client::connect(self.0).write(points)
    }
}
