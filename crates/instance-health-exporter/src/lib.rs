//! Prometheus exporter for the instance health endpoint of Atlassian applications.
//!
//! The exporter wraps a [`Registry`](instance_health::Registry) into an HTTP server built on `hyper`.
//! Metrics are served at [`METRICS_PATH`]; see [`MetricsExporter`] for the full list of endpoints.
//!
//! # Examples
//!
//! ```no_run
//! use instance_health::{HealthCollector, Registry, Scheme, TargetConfig};
//! use instance_health_exporter::MetricsExporter;
//! use tokio::runtime::Handle;
//!
//! use std::{net::Ipv4Addr, sync::Arc};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let target = TargetConfig::new(Scheme::Https, "jira.example.com", "dXNlcjpwYXNzd29yZA==")?;
//! let registry = Registry::new(HealthCollector::new(target)?, Handle::current());
//! MetricsExporter::new(Arc::new(registry))
//!     .with_graceful_shutdown(async {
//!         tokio::signal::ctrl_c().await.ok();
//!     })
//!     .start((Ipv4Addr::UNSPECIFIED, 9998).into())
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod cli;
mod exporter;
mod logging;

pub use crate::{
    exporter::{MetricsExporter, MetricsServer, METRICS_PATH},
    logging::LogConfig,
};
