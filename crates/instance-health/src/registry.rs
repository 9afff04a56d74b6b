//! Wrapper around the metrics registry.

use prometheus_client::{
    collector::Collector, encoding::text, encoding::DescriptorEncoder,
    registry::Registry as RegistryInner,
};
use tokio::runtime::{Handle, RuntimeFlavor};

use std::fmt;

use crate::{
    collector::{encode_samples, HealthCollector},
    descriptors::MetricDescriptor,
    format::{Format, PrometheusWrapper},
};

/// Adapter running the async [`HealthCollector`] from the blocking `prometheus-client` interface.
#[derive(Debug)]
struct BlockingCollector {
    inner: HealthCollector,
    runtime: Handle,
}

impl Collector for BlockingCollector {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> fmt::Result {
        let samples = self.runtime.block_on(self.inner.collect());
        encode_samples(&samples, &mut encoder)
    }
}

/// Metrics registry containing a single [`HealthCollector`].
#[derive(Debug)]
pub struct Registry {
    inner: RegistryInner,
    descriptors: [&'static MetricDescriptor; 3],
}

impl Registry {
    /// Creates a registry for the specified collector. `runtime` is used to drive upstream requests
    /// during encoding.
    ///
    /// The runtime must make progress while [`Self::encode()`] blocks on it, which requires
    /// a multi-threaded runtime. A current-thread runtime only works if it is being driven
    /// by [`Runtime::block_on()`](tokio::runtime::Runtime::block_on) on another thread; otherwise,
    /// encoding hangs. A warning is logged if a current-thread runtime is supplied.
    pub fn new(collector: HealthCollector, runtime: Handle) -> Self {
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            tracing::warn!(
                "Metrics registry is driven by a current-thread runtime; encoding will hang \
                 unless the runtime is polled by another thread"
            );
        }
        let descriptors = collector.describe();
        tracing::info!(
            target = %collector.target().url(),
            metric_count = descriptors.len(),
            "Created metrics registry for instance health of `{}`",
            collector.target().fqdn()
        );

        let mut inner = RegistryInner::default();
        inner.register_collector(Box::new(BlockingCollector {
            inner: collector,
            runtime,
        }));
        Self { inner, descriptors }
    }

    /// Returns descriptors of all metrics that can be produced by this registry.
    pub fn descriptors(&self) -> &[&'static MetricDescriptor] {
        &self.descriptors
    }

    /// Encodes all metrics in this registry to the specified text format. Encoding performs
    /// an upstream request.
    ///
    /// # Errors
    ///
    /// Proxies formatting errors of the provided `writer`.
    ///
    /// # Panics
    ///
    /// Panics if called from an async context, since the upstream request is driven to completion
    /// on the current thread. Use e.g. [`tokio::task::spawn_blocking()`] to call this method
    /// from async code.
    pub fn encode<W: fmt::Write>(&self, writer: &mut W, format: Format) -> fmt::Result {
        match format {
            Format::OpenMetrics => text::encode(writer, &self.inner),
            Format::Prometheus => {
                let mut wrapper = PrometheusWrapper::new(writer);
                text::encode(&mut wrapper, &self.inner)?;
                wrapper.flush()
            }
        }
    }
}
