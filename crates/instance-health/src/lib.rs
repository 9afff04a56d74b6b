//! Prometheus collector for the instance health endpoint of Atlassian applications (Jira, Confluence).
//!
//! # Overview
//!
//! - The [Troubleshooting and Support Tools plugin][plugin] exposes a list of health checks
//!   at `/rest/troubleshooting/1.0/check/`. The [`HealthCollector`] queries this endpoint
//!   on each scrape and converts every reported check into a gauge.
//! - Metric identities are fixed at compile time; see [`descriptors`]. Each collection produces
//!   the `atlassian_instance_health_scrape_url_up` sample, one `atlassian_instance_health` sample
//!   per check and the `atlassian_instance_health_scrape_duration_seconds` sample.
//! - The collector is wrapped into a [`Registry`], which allows to [encode](Registry::encode())
//!   metrics in the OpenMetrics or Prometheus text [`Format`].
//!
//! Upstream failures never result in a scrape error: an unreachable endpoint is reported
//! as `atlassian_instance_health_scrape_url_up` equal to 0, and a malformed response
//! results in no health samples.
//!
//! [plugin]: https://confluence.atlassian.com/support/instance-health-790796828.html
//!
//! # Examples
//!
//! ```no_run
//! use instance_health::{Format, HealthCollector, Registry, Scheme, TargetConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = tokio::runtime::Runtime::new()?;
//! let target = TargetConfig::new(Scheme::Https, "jira.example.com", "dXNlcjpwYXNzd29yZA==")?;
//! let collector = HealthCollector::new(target)?;
//! let registry = Registry::new(collector, runtime.handle().clone());
//!
//! let mut buffer = String::new();
//! registry.encode(&mut buffer, Format::Prometheus)?;
//! println!("{buffer}");
//! # Ok(())
//! # }
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

mod collector;
mod config;
pub mod descriptors;
mod format;
mod registry;
mod report;
mod validation;

pub use crate::{
    collector::HealthCollector,
    config::{ConfigError, Scheme, TargetConfig, CHECK_PATH},
    descriptors::{MetricDescriptor, Sample, EXPORTER_NAME},
    format::Format,
    registry::Registry,
    report::{HealthCheckEntry, HealthCheckReport, ReportError},
};
