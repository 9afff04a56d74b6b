//! Metric descriptors and the samples built from them.

use prometheus_client::{metrics::MetricType, registry::Unit};

use std::{borrow::Cow, fmt, ptr};

use crate::validation::{assert_label_names, assert_metric_name};

/// Name of the exporter. Also used as the name of the health metric and as a prefix
/// for the auxiliary metrics.
pub const EXPORTER_NAME: &str = "atlassian_instance_health";

/// Descriptor for a single metric produced by the exporter.
///
/// Descriptors are immutable and are declared as `static`s; the label schema of a metric
/// never depends on the upstream payload.
#[derive(Debug)]
pub struct MetricDescriptor {
    /// Name of the metric **excluding** the unit suffix.
    pub name: &'static str,
    /// Help for the metric exported to Prometheus.
    pub help: &'static str,
    /// Type of the metric.
    pub metric_type: MetricType,
    /// Measurement unit of the metric, if any.
    pub unit: Option<Unit>,
    /// Label names in the order they are reported.
    pub labels: &'static [&'static str],
}

impl MetricDescriptor {
    /// Creates a gauge descriptor.
    ///
    /// # Panics
    ///
    /// Panics (at compile time if used in a `static`) if the metric name or any of the label names
    /// is invalid, or if label names are repeated.
    #[track_caller]
    pub const fn gauge(
        name: &'static str,
        help: &'static str,
        unit: Option<Unit>,
        labels: &'static [&'static str],
    ) -> Self {
        assert_metric_name(name);
        assert_label_names(labels);
        Self {
            name,
            help,
            metric_type: MetricType::Gauge,
            unit,
            labels,
        }
    }

    /// Returns the full metric name as it appears in the exposition, i.e. with the unit suffix.
    pub fn full_name(&self) -> Cow<'static, str> {
        if let Some(unit) = &self.unit {
            Cow::Owned(format!("{}_{}", self.name, unit.as_str()))
        } else {
            Cow::Borrowed(self.name)
        }
    }

    /// Creates a sample of this metric.
    ///
    /// # Panics
    ///
    /// Panics if the number of `label_values` differs from the number of label names
    /// declared by this descriptor.
    #[track_caller]
    pub fn sample<I>(&'static self, value: f64, label_values: I) -> Sample
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();
        assert_eq!(
            label_values.len(),
            self.labels.len(),
            "Mismatched number of label values for metric `{}`",
            self.name
        );
        Sample {
            descriptor: self,
            value,
            label_values,
        }
    }
}

/// Health of a single instance check: 1 if healthy, 0 otherwise.
pub static HEALTH: MetricDescriptor = MetricDescriptor::gauge(
    EXPORTER_NAME,
    "metric used to monitor the Atlassian Troubleshooting and Support Tools Plugin endpoint \
     (https://<url>/rest/troubleshooting/1.0/check/)",
    None,
    &[
        "id",
        "completekey",
        "name",
        "description",
        "failurereason",
        "application",
        "severity",
        "documentation",
        "tag",
        "fqdn",
    ],
);

/// Time spent on a single collection, including the upstream call.
pub static SCRAPE_DURATION: MetricDescriptor = MetricDescriptor::gauge(
    "atlassian_instance_health_scrape_duration",
    "Used to keep track of how long the exporter took to collect metrics",
    Some(Unit::Seconds),
    &["fqdn"],
);

/// Whether the upstream endpoint responded at all (regardless of the status code).
pub static SCRAPE_URL_UP: MetricDescriptor = MetricDescriptor::gauge(
    "atlassian_instance_health_scrape_url_up",
    "metric used to check if the rest endpoint is accessible \
     (https://<url>/rest/troubleshooting/1.0/check/)",
    None,
    &["httpcode", "fqdn"],
);

/// Returns descriptors of all metrics the exporter can produce.
pub fn describe() -> [&'static MetricDescriptor; 3] {
    [&HEALTH, &SCRAPE_DURATION, &SCRAPE_URL_UP]
}

/// Single sample emitted by a collector: metric identity, value and label values.
#[derive(Clone)]
pub struct Sample {
    descriptor: &'static MetricDescriptor,
    value: f64,
    label_values: Vec<String>,
}

impl fmt::Debug for Sample {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Sample")
            .field("name", &self.descriptor.name)
            .field("value", &self.value)
            .field("labels", &self.labels().collect::<Vec<_>>())
            .finish()
    }
}

impl Sample {
    /// Returns the descriptor of the sampled metric.
    pub fn descriptor(&self) -> &'static MetricDescriptor {
        self.descriptor
    }

    /// Checks whether this sample belongs to the metric with the specified descriptor.
    pub fn is(&self, descriptor: &MetricDescriptor) -> bool {
        ptr::eq(self.descriptor, descriptor)
    }

    /// Returns the sampled value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Iterates over `(name, value)` label pairs in the declared order.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.descriptor
            .labels
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }

    /// Returns the value of the label with the specified name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels()
            .find_map(|(label, value)| (label == name).then_some(value))
    }
}
