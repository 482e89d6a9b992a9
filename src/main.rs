use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use host_recon_rs::config::{GeoConfig, ScanConfig};
use host_recon_rs::export::{self, ExportFormat};
use host_recon_rs::server;
use host_recon_rs::session::ScanSession;
use host_recon_rs::types::{LegacyScanResult, ScanRequest, ScanResult};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// host-recon-rs — TCP connect scanner with banner grabbing, service names and GeoIP enrichment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "host-recon-rs",
    version,
    about = "TCP connect scanner with banner grabbing, service names and GeoIP enrichment.",
    long_about = None
)]
struct Cli {
    /// Hostname or IP address to scan. Required unless --serve-ui is given.
    #[arg(long)]
    target: Option<String>,

    /// First port of the inclusive range.
    #[arg(long, default_value_t = 1)]
    start: i64,

    /// Last port of the inclusive range.
    #[arg(long, default_value_t = 1024)]
    end: i64,

    /// Number of concurrent connect workers.
    #[arg(long, env = "RECON_WORKERS", default_value_t = 100)]
    workers: usize,

    /// Per-port connect timeout in milliseconds.
    #[arg(long = "connect-timeout-ms", env = "RECON_CONNECT_TIMEOUT_MS", default_value_t = 400)]
    connect_timeout_ms: u64,

    /// How long to wait for a banner after connecting, in milliseconds.
    #[arg(long = "banner-timeout-ms", env = "RECON_BANNER_TIMEOUT_MS", default_value_t = 200)]
    banner_timeout_ms: u64,

    /// Maximum banner bytes kept per port.
    #[arg(long = "banner-bytes", env = "RECON_BANNER_BYTES", default_value_t = 256)]
    banner_bytes: usize,

    /// Widest range a single scan may cover.
    #[arg(long = "max-range", env = "RECON_MAX_RANGE", default_value_t = 10_000)]
    max_range: u32,

    /// Overall scan deadline in seconds.
    #[arg(long = "deadline-secs", env = "RECON_DEADLINE_SECS", default_value_t = 30)]
    deadline_secs: u64,

    /// Skip GeoIP enrichment.
    #[arg(long = "no-geoip", env = "RECON_NO_GEOIP", default_value_t = false)]
    no_geoip: bool,

    /// GeoIP endpoint; the address is appended as the last path segment.
    #[arg(long = "geoip-url", env = "RECON_GEOIP_URL", default_value = "http://ip-api.com/json")]
    geoip_url: String,

    /// Print only the list of open ports as JSON.
    #[arg(long, default_value_t = false)]
    minimal: bool,

    /// Write the result to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Format for --output: json or csv.
    #[arg(long, default_value = "json")]
    format: String,

    /// Start the HTTP UI/API server instead of running a single scan.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Address the HTTP server binds to.
    #[arg(long, env = "RECON_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            banner_timeout: Duration::from_millis(self.banner_timeout_ms),
            banner_max_bytes: self.banner_bytes,
            workers: self.workers,
            max_range_width: self.max_range,
            scan_deadline: Duration::from_secs(self.deadline_secs),
            geoip: GeoConfig {
                enabled: !self.no_geoip,
                endpoint: self.geoip_url.clone(),
                ..GeoConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let session = Arc::new(
        ScanSession::from_config(cli.scan_config()).context("invalid scan configuration")?,
    );
    let cfg = session.config();
    info!(
        workers = cfg.workers,
        connect_timeout_ms = cfg.connect_timeout.as_millis() as u64,
        banner_timeout_ms = cfg.banner_timeout.as_millis() as u64,
        max_range = cfg.max_range_width,
        deadline_secs = cfg.scan_deadline.as_secs(),
        geoip = cfg.geoip.enabled,
        "configuration"
    );

    if cli.serve_ui {
        println!("UI server starting at http://{} (Ctrl+C to stop)", cli.bind);
        tokio::select! {
            res = server::spawn_server(&cli.bind, session.clone()) => res?,
            _ = tokio::signal::ctrl_c() => info!("shutting down"),
        }
        return Ok(());
    }

    let Some(target) = cli.target.clone() else {
        bail!("--target is required unless --serve-ui is given");
    };
    let format: ExportFormat = cli.format.parse()?;
    let req = ScanRequest {
        target,
        start: cli.start,
        end: cli.end,
    };

    // Ctrl-C cancels the sweep; the partial result is still reported.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing with partial results");
            cancel_ctrlc.cancel();
        }
    });

    let result = session.scan_with_cancel(&req, cancel).await?;

    if cli.minimal {
        println!(
            "{}",
            serde_json::to_string(&LegacyScanResult::from(result.as_ref()))?
        );
    } else {
        print_geo(&result);
        print_results_table(&result);
    }

    if let Some(path) = cli.output.as_deref() {
        let doc = export::render(&result, format)?;
        std::fs::write(path, doc.body)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        println!("Wrote {} results to {}", cli.format, path.display());
    }

    Ok(())
}

fn print_geo(result: &ScanResult) {
    match &result.geoip {
        Some(g) => println!(
            "GeoIP: {} | {} / {} / {} | ISP: {} | Org: {}",
            g.ip, g.country, g.region, g.city, g.isp, g.org
        ),
        None => println!("GeoIP: <unavailable>"),
    }
}

fn print_results_table(result: &ScanResult) {
    let port_w = 5usize;
    let mut service_w = "service".len();
    let lat_w = "response_ms".len();
    for p in &result.ports {
        service_w = service_w.max(p.service.as_deref().unwrap_or("-").len());
    }

    let s = &result.summary;
    println!(
        "\n{} ({}) ports {}-{}: {} open, {} closed, {} filtered, {} not scanned in {} ms{}",
        result.target,
        result.ip,
        result.range.start,
        result.range.end,
        s.open,
        s.closed,
        s.filtered,
        s.not_scanned,
        s.elapsed_ms,
        if s.complete { "" } else { " (incomplete)" }
    );
    if result.ports.is_empty() {
        println!("No open ports found.");
        return;
    }
    println!(
        "{:>port_w$}  {:<service_w$}  {:>lat_w$}  banner",
        "port", "service", "response_ms",
    );
    println!(
        "{:-<port_w$}  {:-<service_w$}  {:-<lat_w$}  {:-<6}",
        "", "", "", "",
    );
    for p in &result.ports {
        let banner: String = p.banner.chars().take(60).collect();
        println!(
            "{:>port_w$}  {:<service_w$}  {:>lat_w$}  {}",
            p.port,
            p.service.as_deref().unwrap_or("-"),
            p.response_time_ms,
            if banner.is_empty() { "-" } else { banner.as_str() },
        );
    }
}
