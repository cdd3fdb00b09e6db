use anyhow::{Context as _, Result};
use clap::Parser;
use opentelemetry::{
    trace::{FutureExt, Status, TraceContextExt, Tracer},
    Context,
};
use tracewire_core::{
    client::{RpcClient, TransactionRequest},
    config::AppConfig,
    telemetry::Telemetry,
    utils::BlockRef,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Contract read issued by every run.
const CONTRACT_ADDRESS: &str = "0xc305c901078781C232A2a521C2aF7980f8385ee9";
const CONTRACT_CALLDATA: &str = "0x477a5c98";

/// Account whose balance is read by every run.
const BALANCE_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

const ROOT_SPAN_NAME: &str = "tracewire run";

#[derive(Parser)]
#[command(name = "tracewire")]
#[command(about = "Issue traced Ethereum JSON-RPC calls and export the spans over OTLP")]
struct Cli {
    /// Path to config file
    #[arg(short, long, env = "TRACEWIRE_CONFIG", default_value = "config/config.toml")]
    config: String,

    /// JSON-RPC endpoint URL, overrides `transport.endpoint`
    #[arg(long)]
    endpoint: Option<String>,

    /// OTLP/gRPC collector URL, overrides `telemetry.otlp_endpoint`
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Do not export spans
    #[arg(long)]
    no_telemetry: bool,

    /// Log output format
    #[arg(long, value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::from_file(&self.config)
            .context(format!("failed to load configuration from {}", self.config))?;

        if let Some(endpoint) = &self.endpoint {
            config.transport.endpoint.clone_from(endpoint);
        }
        if let Some(otlp_endpoint) = &self.otlp_endpoint {
            config.telemetry.otlp_endpoint.clone_from(otlp_endpoint);
        }
        if self.no_telemetry {
            config.telemetry.enabled = false;
        }
        if let Some(format) = &self.log_format {
            config.logging.format.clone_from(format);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` takes precedence over `logging.level` when set.
fn init_logging(config: &AppConfig) {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,tracewire_core={level},tracewire={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json();
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

fn contract_read() -> TransactionRequest {
    TransactionRequest {
        to: Some(CONTRACT_ADDRESS.to_string()),
        data: Some(CONTRACT_CALLDATA.to_string()),
        value: Some(0),
        gas: Some(21_736),
        max_fee_per_gas: Some(15_254_192_295),
        max_priority_fee_per_gas: Some(1_000_000_000),
        ..TransactionRequest::default()
    }
}

/// Issues the contract read and the balance lookup under one root span.
async fn run<T>(config: &AppConfig, tracer: T) -> Result<()>
where
    T: Tracer + Clone + Send + Sync + 'static,
    T::Span: Send + Sync + 'static,
{
    let client = RpcClient::from_config(config, tracer.clone())?;

    let root = tracer.start(ROOT_SPAN_NAME);
    let cx = Context::current_with_span(root);

    let outcome = async {
        let data = client
            .call(&contract_read(), BlockRef::LATEST)
            .await
            .context("eth_call failed")?;
        info!(contract = CONTRACT_ADDRESS, %data, "contract read returned");
        println!("eth_call {CONTRACT_ADDRESS}: {data}");

        let balance = client
            .get_balance(BALANCE_ADDRESS, BlockRef::LATEST)
            .await
            .context("eth_getBalance failed")?;
        info!(address = BALANCE_ADDRESS, balance_wei = %balance, "balance returned");
        println!("eth_getBalance {BALANCE_ADDRESS}: {balance}");

        Ok::<_, anyhow::Error>(())
    }
    .with_context(cx.clone())
    .await;

    let root = cx.span();
    if let Err(e) = &outcome {
        root.set_status(Status::error(format!("{e:#}")));
    }
    root.end();

    outcome
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    init_logging(&config);

    let telemetry = Telemetry::init(&config.telemetry)?;
    let result = run(&config, telemetry.tracer()).await;

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "run failed");
    }

    // flush before the process exits, on both paths
    telemetry.shutdown();
    result
}
