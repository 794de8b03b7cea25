//! `mxgate-server`: serves the management gateway over HTTP.
//!
//! Usage:
//!   mxgate-server [--port 8080] [--filter-rules rules.json] [--metrics-port 9100]
//!
//! Every flag can also be set through its `MXGATE_*` environment variable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use mxgate_core::DEFAULT_MAX_DEPTH;
use mxgate_server::{Gateway, GatewayConfig, NetworkConfig, NetworkModule};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Management gateway server.
#[derive(Parser, Debug)]
#[command(name = "mxgate-server", version, about)]
struct Cli {
    /// Bind address.
    #[arg(long, env = "MXGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP port; 0 picks a free one.
    #[arg(long, env = "MXGATE_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "MXGATE_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "MXGATE_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// JSON file of attribute filter rules.
    #[arg(long, env = "MXGATE_FILTER_RULES")]
    filter_rules: Option<PathBuf>,

    /// Traversal depth when a request gives no maxDepth.
    #[arg(long, env = "MXGATE_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Absolute document size ceiling in bytes.
    #[arg(long, env = "MXGATE_DOCUMENT_CEILING", default_value_t = 8 * 1024 * 1024)]
    document_ceiling: usize,

    /// Largest declared invocation request length, in characters.
    #[arg(long, env = "MXGATE_MAX_REQUEST_LENGTH", default_value_t = 1024 * 1024)]
    max_request_length: usize,

    /// Invocation deadline in milliseconds when a request gives no maxTime.
    #[arg(long, env = "MXGATE_INVOKE_TIMEOUT_MS", default_value_t = 30_000)]
    invoke_timeout_ms: u64,

    /// Rendered result cap in bytes when a request gives no maxSize.
    #[arg(long, env = "MXGATE_RESPONSE_MAX", default_value_t = 1024 * 1024)]
    response_max: usize,

    /// Concurrent invocations before new ones are refused.
    #[arg(long, env = "MXGATE_MAX_CONCURRENT", default_value_t = 64)]
    max_concurrent: u32,

    /// Comma-separated allowed CORS origins.
    #[arg(long, env = "MXGATE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,
}

impl Cli {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            default_max_depth: self.max_depth,
            document_ceiling: self.document_ceiling,
            max_request_length: self.max_request_length,
            default_invoke_timeout: Duration::from_millis(self.invoke_timeout_ms),
            default_response_max: self.response_max,
            max_concurrent_invocations: self.max_concurrent,
            filter_rules_path: self.filter_rules.clone(),
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            ..NetworkConfig::default()
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mxgate_server=info,mxgate_core=info,tower_http=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    if let Some(port) = cli.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "prometheus exporter listening");
    }

    let gateway = Arc::new(Gateway::new(cli.gateway_config())?);
    let mut module = NetworkModule::new(cli.network_config(), gateway);
    let port = module.start().await?;
    info!(port, "mxgate-server started");

    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
