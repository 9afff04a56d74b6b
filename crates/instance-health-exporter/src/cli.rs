//! Command-line interface of the exporter.

use clap::{Parser, ValueEnum};
use instance_health::{ConfigError, Format, Scheme, TargetConfig, EXPORTER_NAME};

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use crate::logging::LogConfig;

const ABOUT: &str = "Exports the Atlassian instance health checks as Prometheus metrics";

const LONG_ABOUT: &str = "\
The Atlassian Instance Health Exporter is used in conjunction with the Atlassian
Troubleshooting and Support Tools Plugin. The Instance Health feature is currently available
for Confluence and Jira. The application account that this exporter will use to reach
out and scrape that endpoint will need to have Administrator access. Once the plugin is
installed and the account is set up, you can run the exporter against the endpoint and
it will turn the endpoint into metrics.

Reference:
https://confluence.atlassian.com/support/instance-health-790796828.html";

/// Text format of the exported metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    /// Prometheus text format.
    #[default]
    Prometheus,
    /// OpenMetrics text format.
    OpenMetrics,
}

impl From<ExportFormat> for Format {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Prometheus => Self::Prometheus,
            ExportFormat::OpenMetrics => Self::OpenMetrics,
        }
    }
}

/// Command-line arguments of the exporter. Each option can also be provided via an env variable.
#[derive(Debug, Parser)]
#[command(name = EXPORTER_NAME, version, about = ABOUT, long_about = LONG_ABOUT)]
pub struct Cli {
    /// IP address for this service to listen on.
    #[arg(
        long = "svc.address",
        env = "SVC_ADDRESS",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    )]
    pub address: IpAddr,
    /// Port that this service will listen on.
    #[arg(long = "svc.port", env = "SVC_PORT", default_value_t = 9998)]
    pub port: u16,
    /// FQDN of the application, e.g. `jira.example.com`.
    #[arg(long = "app.fqdn", env = "APP_FQDN")]
    pub fqdn: String,
    /// Protocol used to reach the application.
    #[arg(
        long = "app.protocol",
        visible_alias = "app.protocal",
        env = "APP_PROTOCOL",
        default_value_t = Scheme::Https,
        value_parser = parse_scheme
    )]
    pub protocol: Scheme,
    /// Basic auth token used to make requests to the application.
    #[arg(long = "app.token", env = "APP_TOKEN", hide_env_values = true)]
    pub token: String,
    /// Timeout for a single request to the application, in seconds.
    #[arg(
        long = "app.timeout",
        env = "APP_TIMEOUT",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,
    /// Maximum number of health checks exported on a single scrape. Unbounded if not set.
    #[arg(long = "app.max-checks", env = "APP_MAX_CHECKS")]
    pub max_checks: Option<usize>,
    /// Format of the exported metrics.
    #[arg(long, value_enum, default_value_t)]
    pub format: ExportFormat,
    /// Enables debug logs.
    #[arg(long)]
    pub debug: bool,
    /// Enables colored logs.
    #[arg(long = "enable-color-logs")]
    pub enable_color_logs: bool,
}

fn parse_scheme(raw: &str) -> Result<Scheme, ConfigError> {
    raw.parse()
}

impl Cli {
    /// Returns the address to bind the metrics server to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Returns the logger configuration.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            debug: self.debug,
            ansi: self.enable_color_logs,
        }
    }

    /// Builds the configuration of the monitored application.
    ///
    /// # Errors
    ///
    /// Proxies validation errors from [`TargetConfig::new()`].
    pub fn target_config(&self) -> Result<TargetConfig, ConfigError> {
        let mut target = TargetConfig::new(self.protocol, &*self.fqdn, &*self.token)?
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(max_checks) = self.max_checks {
            target = target.with_max_entries(max_checks);
        }
        Ok(target)
    }
}
