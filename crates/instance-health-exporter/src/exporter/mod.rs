//! `MetricsExporter` and closely related types.

use std::{
    convert::Infallible,
    fmt,
    future::{self, Future},
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    time::Instant,
};

use hyper::{
    body::Incoming, header, server::conn::http1, service::service_fn, Request, Response,
    StatusCode, Uri,
};
use hyper_util::rt::TokioIo;
use instance_health::{Format, Registry, EXPORTER_NAME};
use tokio::{io, net::TcpListener, sync::watch};


/// Path serving the metrics.
pub const METRICS_PATH: &str = "/metrics";
const FAVICON_PATH: &str = "/favicon.ico";

#[derive(Clone)]
struct MetricsExporterInner {
    registry: Arc<Registry>,
    format: Format,
}

impl MetricsExporterInner {
    async fn render_body(&self) -> Option<String> {
        let started_at = Instant::now();
        let registry = Arc::clone(&self.registry);
        let format = self.format;
        // `Registry::encode()` blocks on the upstream request, so it must not run on an async worker.
        let encoded = tokio::task::spawn_blocking(move || {
            let mut buffer = String::with_capacity(1_024);
            registry.encode(&mut buffer, format).map(|()| buffer)
        })
        .await;

        let buffer = match encoded {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(err)) => {
                tracing::error!(%err, "Failed encoding metrics");
                return None;
            }
            Err(err) => {
                tracing::error!(%err, "Metrics encoding task failed");
                return None;
            }
        };

        let latency = started_at.elapsed();
        let scraped_size = buffer.len();
        tracing::debug!(
            latency_sec = latency.as_secs_f64(),
            scraped_size,
            "Scraped metrics in {latency:?} (scraped size: {scraped_size}B)"
        );
        Some(buffer)
    }

    async fn render(&self) -> Response<String> {
        let Some(body) = self.render_body().await else {
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, String::new());
        };
        let mut response = Response::new(body);
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static(self.format.content_type()),
        );
        response
    }

    async fn handle(&self, uri: Uri, remote_addr: SocketAddr) -> Response<String> {
        match uri.path() {
            METRICS_PATH => self.render().await,
            FAVICON_PATH => plain_response(StatusCode::OK, String::new()),
            _ => {
                tracing::info!(%remote_addr, %uri, "{remote_addr} requested {uri}");
                plain_response(StatusCode::OK, format!("{EXPORTER_NAME} is running"))
            }
        }
    }
}

fn plain_response(status: StatusCode, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

/// Metrics exporter to Prometheus.
///
/// The exporter serves an HTTP/1 server with the following endpoints:
///
/// - `/metrics`: metrics from the [`Registry`] in the text format configured using
///   [`Self::with_format()`]. Each request triggers a request to the monitored application.
/// - `/favicon.ico`: empty response, so that browsers don't trigger logging.
/// - any other path: liveness message. Requests are logged at `INFO` level.
pub struct MetricsExporter<'a> {
    inner: MetricsExporterInner,
    shutdown_future: Pin<Box<dyn Future<Output = ()> + Send + 'a>>,
}

impl fmt::Debug for MetricsExporter<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsExporter")
            .field("registry", &self.inner.registry)
            .field("format", &self.inner.format)
            .finish_non_exhaustive()
    }
}

impl<'a> MetricsExporter<'a> {
    /// Creates an exporter based on the provided metrics [`Registry`].
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::log_metrics_stats(&registry);
        Self {
            inner: MetricsExporterInner {
                registry,
                format: Format::default(),
            },
            shutdown_future: Box::pin(future::pending()),
        }
    }

    fn log_metrics_stats(registry: &Registry) {
        let descriptors = registry.descriptors();
        let metric_count = descriptors.len();
        let names: Vec<_> = descriptors
            .iter()
            .map(|descriptor| descriptor.full_name())
            .collect();
        tracing::info!(
            "Created metrics exporter with {metric_count} metrics: {}",
            names.join(", ")
        );
    }

    /// Sets the export [`Format`]. By default, [`Format::Prometheus`] is used.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.inner.format = format;
        self
    }

    /// Configures graceful shutdown for the exporter server.
    #[must_use]
    pub fn with_graceful_shutdown<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'a,
    {
        self.shutdown_future = Box::pin(shutdown);
        self
    }

    /// Starts the server on the specified address. This future resolves when the server is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn start(self, bind_address: SocketAddr) -> io::Result<()> {
        tracing::info!("Starting Prometheus exporter web server on {bind_address}");
        self.bind(bind_address).await?.start().await?;
        tracing::info!("Prometheus metrics exporter server shut down");
        Ok(())
    }

    /// Creates an HTTP exporter server and binds it to the specified address.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn bind(mut self, bind_address: SocketAddr) -> io::Result<MetricsServer<'a>> {
        let listener = TcpListener::bind(bind_address).await?;
        let local_addr = listener.local_addr()?;
        let server = async move {
            let (started_shutdown_sender, started_shutdown) = watch::channel(());
            loop {
                let (stream, remote_addr) = tokio::select! {
                    res = listener.accept() => res?,
                    () = &mut self.shutdown_future => break,
                };

                let io = TokioIo::new(stream);
                let inner = self.inner.clone();
                let mut started_shutdown = started_shutdown.clone();
                tokio::spawn(async move {
                    let service = service_fn(|request: Request<Incoming>| {
                        let inner = inner.clone();
                        let uri = request.uri().clone();
                        async move { Ok::<_, Infallible>(inner.handle(uri, remote_addr).await) }
                    });
                    let conn = http1::Builder::new().serve_connection(io, service);
                    tokio::pin!(conn);

                    let res = tokio::select! {
                        _ = started_shutdown.changed() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                        res = conn.as_mut() => res,
                    };
                    if let Err(err) = res {
                        tracing::warn!(%err, %remote_addr, "Error serving connection");
                    }
                });
            }

            tracing::info!("Stop signal received, Prometheus metrics exporter is shutting down");
            // Send the graceful shutdown signal to all alive connections.
            drop(started_shutdown);
            started_shutdown_sender.send_replace(());
            // Wait until all connections are dropped.
            started_shutdown_sender.closed().await;

            Ok(())
        };

        Ok(MetricsServer {
            server: Box::pin(server),
            local_addr,
        })
    }
}

/// Metrics server bound to a certain local address returned by [`MetricsExporter::bind()`].
///
/// Useful e.g. if you need to find out which port the server was bound to if the 0th port was specified.
#[must_use = "Server should be `start()`ed"]
pub struct MetricsServer<'a> {
    server: Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>,
    local_addr: SocketAddr,
}

impl fmt::Debug for MetricsServer<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsServer")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl MetricsServer<'_> {
    /// Returns the local address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts this server. Resolves once the server is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting connections fails.
    pub async fn start(self) -> io::Result<()> {
        self.server.await
    }
}
