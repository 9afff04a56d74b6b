//! Integration testing for the exporter binary.

use anyhow::Context as _;
use assert_matches::assert_matches;
use http_body_util::{BodyExt as _, Empty};
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::{
    client::legacy::Client,
    rt::{TokioExecutor, TokioIo},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    process::{Child, Command},
};
use tracing::metadata::LevelFilter;

use std::{
    convert::Infallible,
    net::{Ipv4Addr, SocketAddr},
    process::Stdio,
    time::Duration,
};

const TOKEN: &str = "dXNlcjpwYXNzd29yZA==";
const MAX_WAIT: Duration = Duration::from_secs(10);
const PAYLOAD: &str = r#"{
    "statuses": [
        {
            "id": 0,
            "completeKey": "com.atlassian.jira.plugins.jira-healthcheck-plugin:eolHealthCheck",
            "name": "End of Life",
            "description": "Checks if the running version of JIRA is approaching, or has reached End of Life.",
            "isHealthy": true,
            "failureReason": "JIRA version 9.4.0 has not reached End of Life.",
            "application": "JIRA",
            "time": 1665416458424,
            "severity": "undefined",
            "documentation": "https://confluence.atlassian.com/support/end-of-life-policy-201851003.html",
            "tag": "Supported Platforms",
            "healthy": true
        },
        {
            "id": 1,
            "completeKey": "com.atlassian.jira.plugins.jira-healthcheck-plugin:dbCollationHealthCheck",
            "name": "Database collation",
            "description": "Checks the database collation.",
            "isHealthy": false,
            "failureReason": "The database collation is not supported.",
            "application": "JIRA",
            "time": 1665416458431,
            "severity": "critical",
            "documentation": "https://confluence.atlassian.com/x/GpNUBg",
            "tag": "Database",
            "healthy": false
        }
    ]
}"#;

fn init_logging() {
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(LevelFilter::INFO)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Spawns a mock instance health endpoint checking the credential on each request.
async fn spawn_upstream() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let local_addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| async move {
                    let expected_auth = format!("Basic {TOKEN}");
                    let is_authorized = req
                        .headers()
                        .get(hyper::header::AUTHORIZATION)
                        .is_some_and(|value| value.as_bytes() == expected_auth.as_bytes());
                    let response = if is_authorized {
                        Response::new(PAYLOAD.to_owned())
                    } else {
                        let mut response = Response::new(String::new());
                        *response.status_mut() = StatusCode::UNAUTHORIZED;
                        response
                    };
                    Ok::<_, Infallible>(response)
                });
                http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                    .ok();
            });
        }
    });
    Ok(local_addr)
}

fn app_command(upstream_addr: SocketAddr) -> Command {
    let binary = env!(concat!("CARGO_BIN_EXE_", env!("CARGO_PKG_NAME")));
    tracing::info!("Running binary `{binary}`");
    let mut command = Command::new(binary);
    command
        .arg("--svc.address=127.0.0.1")
        .arg("--svc.port=0")
        .arg(format!("--app.fqdn={upstream_addr}"))
        .arg("--app.protocol=http")
        .arg(format!("--app.token={TOKEN}"))
        .arg("--app.timeout=2");
    command
}

async fn start_app(mut command: Command) -> anyhow::Result<(Child, SocketAddr)> {
    let mut app_process = command
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("Failed spawning child")?;

    // The child should print its address to stdout.
    let app_stdout = app_process.stdout.take().context("no stdout")?;
    let app_stdout = BufReader::new(app_stdout);
    let line = tokio::time::timeout(MAX_WAIT, app_stdout.lines().next_line())
        .await
        .context("timed out waiting for app to start")??
        .context("app terminated prematurely")?;

    let app_addr = line
        .strip_prefix("local_addr=")
        .with_context(|| format!("Malformed app output: `{line}`"))?
        .trim();
    let app_addr: SocketAddr = app_addr.parse()?;
    tracing::info!("Application started on {app_addr}");
    Ok((app_process, app_addr))
}

async fn get(addr: SocketAddr, path: &str) -> anyhow::Result<(StatusCode, String)> {
    let client = Client::builder(TokioExecutor::new()).build_http::<Empty<Bytes>>();
    let uri = format!("http://{addr}{path}").parse()?;
    let response = tokio::time::timeout(MAX_WAIT, client.get(uri))
        .await
        .context("timed out waiting for response")??;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, String::from_utf8(body.to_vec())?))
}

#[tokio::test]
async fn scraping_app() -> anyhow::Result<()> {
    init_logging();
    let upstream_addr = spawn_upstream().await?;
    let (_app, app_addr) = start_app(app_command(upstream_addr)).await?;

    let (status, body) = get(app_addr, "/metrics").await?;
    assert_eq!(status, StatusCode::OK);
    tracing::info!("Scraped metrics:\n{body}");
    let lines: Vec<_> = body.lines().collect();

    let up_line = format!(
        r#"atlassian_instance_health_scrape_url_up{{httpcode="200",fqdn="{upstream_addr}"}} 1.0"#
    );
    assert!(lines.contains(&up_line.as_str()), "{lines:#?}");

    let health_lines: Vec<_> = lines
        .iter()
        .filter(|line| line.starts_with("atlassian_instance_health{"))
        .collect();
    assert_eq!(health_lines.len(), 2, "{lines:#?}");
    assert!(health_lines[0].contains(r#"name="End of Life""#));
    assert!(health_lines[0].contains(r#"tag="Supported Platforms""#));
    assert!(health_lines[0].ends_with(" 1.0"));
    assert!(health_lines[1].contains(r#"severity="critical""#));
    assert!(health_lines[1].ends_with(" 0.0"));

    let duration_prefix =
        format!(r#"atlassian_instance_health_scrape_duration_seconds{{fqdn="{upstream_addr}"}} "#);
    assert!(
        lines.iter().any(|line| line.starts_with(&duration_prefix)),
        "{lines:#?}"
    );
    assert!(!lines.contains(&"# EOF"));
    Ok(())
}

#[tokio::test]
async fn scraping_app_in_open_metrics_format() -> anyhow::Result<()> {
    init_logging();
    let upstream_addr = spawn_upstream().await?;
    let mut command = app_command(upstream_addr);
    command.arg("--format=open-metrics");
    let (_app, app_addr) = start_app(command).await?;

    let (status, body) = get(app_addr, "/metrics").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("# UNIT atlassian_instance_health_scrape_duration_seconds seconds"));
    assert_eq!(body.lines().last(), Some("# EOF"));
    Ok(())
}

#[tokio::test]
async fn scraping_app_with_rejected_credential() -> anyhow::Result<()> {
    init_logging();
    let upstream_addr = spawn_upstream().await?;
    let mut command = app_command(upstream_addr);
    command.arg("--app.token=wrong");
    let (_app, app_addr) = start_app(command).await?;

    let (status, body) = get(app_addr, "/metrics").await?;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<_> = body.lines().collect();
    let up_line = format!(
        r#"atlassian_instance_health_scrape_url_up{{httpcode="401",fqdn="{upstream_addr}"}} 1.0"#
    );
    assert!(lines.contains(&up_line.as_str()), "{lines:#?}");
    assert!(
        !lines
            .iter()
            .any(|line| line.starts_with("atlassian_instance_health{")),
        "{lines:#?}"
    );
    Ok(())
}

#[tokio::test]
async fn scraping_app_with_unreachable_upstream() -> anyhow::Result<()> {
    init_logging();
    let upstream_addr = {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        listener.local_addr()?
    };
    let (_app, app_addr) = start_app(app_command(upstream_addr)).await?;

    let (status, body) = get(app_addr, "/metrics").await?;
    assert_eq!(status, StatusCode::OK);
    let samples: Vec<_> = body.lines().filter(|line| !line.starts_with('#')).collect();
    let up_line = format!(
        r#"atlassian_instance_health_scrape_url_up{{httpcode="",fqdn="{upstream_addr}"}} 0.0"#
    );
    assert_eq!(samples, [up_line.as_str()]);
    Ok(())
}

#[tokio::test]
async fn auxiliary_endpoints() -> anyhow::Result<()> {
    init_logging();
    let upstream_addr = spawn_upstream().await?;
    let (_app, app_addr) = start_app(app_command(upstream_addr)).await?;

    let (status, body) = get(app_addr, "/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "atlassian_instance_health is running");

    let (status, body) = get(app_addr, "/favicon.ico").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty(), "{body}");
    Ok(())
}

#[tokio::test]
async fn missing_token_is_reported() -> anyhow::Result<()> {
    init_logging();
    let binary = env!(concat!("CARGO_BIN_EXE_", env!("CARGO_PKG_NAME")));
    let output = Command::new(binary)
        .arg("--app.fqdn=jira.example.com")
        .env_remove("APP_TOKEN")
        .output()
        .await?;

    assert_matches!(output.status.code(), Some(code) if code != 0);
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("--app.token"), "{stderr}");
    Ok(())
}
