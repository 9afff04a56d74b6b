//! Collector querying the instance health endpoint on each scrape.

use prometheus_client::{
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::gauge::ConstGauge,
};
use reqwest::{header, Client, Method, Request};

use std::{borrow::Cow, fmt, ptr, time::Instant};

use crate::{
    config::{ConfigError, TargetConfig},
    descriptors::{self, MetricDescriptor, Sample, HEALTH, SCRAPE_DURATION, SCRAPE_URL_UP},
    report::{HealthCheckEntry, HealthCheckReport},
};

/// Collector converting the instance health report of a single Atlassian application into metrics.
///
/// The collector holds no state between calls: each [`Self::collect()`] call queries the upstream
/// endpoint anew. Upstream failures never make collection fail; they are reported via
/// the `atlassian_instance_health_scrape_url_up` metric and logs.
#[derive(Debug, Clone)]
pub struct HealthCollector {
    client: Client,
    target: TargetConfig,
}

impl HealthCollector {
    /// Creates a collector with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized (e.g., TLS backend is unavailable).
    pub fn new(target: TargetConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self::with_client(client, target))
    }

    /// Creates a collector using the provided HTTP client. The request timeout from `target`
    /// is applied on top of client settings.
    pub fn with_client(client: Client, target: TargetConfig) -> Self {
        Self { client, target }
    }

    /// Returns the monitored target.
    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Returns descriptors of all metrics this collector can emit.
    pub fn describe(&self) -> [&'static MetricDescriptor; 3] {
        descriptors::describe()
    }

    fn build_request(&self) -> reqwest::Result<Request> {
        self.client
            .request(Method::GET, self.target.url().clone())
            .header(header::AUTHORIZATION, format!("Basic {}", self.target.token()))
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.target.timeout())
            .build()
    }

    /// Queries the upstream endpoint and converts its response into samples.
    ///
    /// Samples are returned in the following order:
    ///
    /// 1. `scrape_url_up` (always present)
    /// 2. one health sample per reported check, in the order of the report
    /// 3. `scrape_duration_seconds`
    ///
    /// If the request cannot be created or sent, only the `scrape_url_up` sample (with value 0)
    /// is returned.
    pub async fn collect(&self) -> Vec<Sample> {
        let started_at = Instant::now();
        let fqdn = self.target.fqdn();
        let url = self.target.url();

        let request = match self.build_request() {
            Ok(request) => request,
            Err(err) => {
                tracing::error!(%err, %url, "Failed creating request to instance health endpoint");
                return vec![up_sample(None, fqdn)];
            }
        };

        tracing::debug!(%url, "Requesting instance health");
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, %url, "Error requesting instance health endpoint");
                return vec![up_sample(None, fqdn)];
            }
        };

        let status = response.status();
        tracing::debug!(%status, %url, "Received instance health response");
        let mut samples = vec![up_sample(Some(status.as_u16()), fqdn)];

        // Consuming the body returns the connection to the pool.
        let body = response.bytes().await.unwrap_or_else(|err| {
            tracing::error!(%err, %status, %url, "Failed reading instance health response");
            Default::default()
        });

        let mut report = HealthCheckReport::from_slice(&body).unwrap_or_else(|err| {
            tracing::error!(
                %err,
                %status,
                body = %String::from_utf8_lossy(&body),
                "Failed decoding instance health report"
            );
            HealthCheckReport::default()
        });
        if let Some(max_entries) = self.target.max_entries() {
            let dropped = report.truncate(max_entries);
            if dropped > 0 {
                tracing::warn!(
                    max_entries,
                    dropped,
                    "Instance health report has more checks than allowed; dropped {dropped} last checks"
                );
            }
        }

        samples.reserve(report.len() + 1);
        samples.extend(
            report
                .statuses
                .iter()
                .map(|entry| health_sample(entry, fqdn)),
        );

        let latency = started_at.elapsed();
        samples.push(SCRAPE_DURATION.sample(latency.as_secs_f64(), [fqdn]));
        tracing::debug!(
            latency_sec = latency.as_secs_f64(),
            check_count = report.len(),
            "Collected instance health for `{fqdn}` in {latency:?}"
        );
        samples
    }
}

fn up_sample(status_code: Option<u16>, fqdn: &str) -> Sample {
    let (value, status_code) = match status_code {
        Some(code) => (1.0, code.to_string()),
        None => (0.0, String::new()),
    };
    SCRAPE_URL_UP.sample(value, [status_code, fqdn.to_owned()])
}

fn health_sample(entry: &HealthCheckEntry, fqdn: &str) -> Sample {
    let value = if entry.is_healthy { 1.0 } else { 0.0 };
    let id = entry.id.to_string();
    HEALTH.sample(
        value,
        [
            id.as_str(),
            entry.complete_key.as_str(),
            entry.name.as_str(),
            entry.description.as_str(),
            entry.failure_reason.as_str(),
            entry.application.as_str(),
            entry.severity.as_str(),
            entry.documentation.as_str(),
            entry.tag.as_str(),
            fqdn,
        ],
    )
}

/// Encodes samples using the `prometheus-client` encoder. Consecutive samples of the same metric
/// are encoded as a single metric family.
pub(crate) fn encode_samples(
    samples: &[Sample],
    encoder: &mut DescriptorEncoder<'_>,
) -> fmt::Result {
    for group in samples.chunk_by(|prev, next| ptr::eq(prev.descriptor(), next.descriptor())) {
        let descriptor = group[0].descriptor();
        let mut metric_encoder = encoder.encode_descriptor(
            descriptor.name,
            descriptor.help,
            descriptor.unit.as_ref(),
            descriptor.metric_type,
        )?;
        for sample in group {
            let labels: Vec<(&str, String)> = sample
                .labels()
                .map(|(name, value)| (name, escape_label_value(value).into_owned()))
                .collect();
            let family_encoder = metric_encoder.encode_family(&labels)?;
            ConstGauge::new(sample.value()).encode(family_encoder)?;
        }
    }
    Ok(())
}

/// Escapes a label value according to the text exposition format.
fn escape_label_value(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '"', '\n']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str(r"\\"),
            '"' => escaped.push_str(r#"\""#),
            '\n' => escaped.push_str(r"\n"),
            _ => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}
