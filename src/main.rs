use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use payment_orchestrator::application::orchestrator::Orchestrator;
use payment_orchestrator::config::Config;
use payment_orchestrator::domain::ports::{DurableStoreRef, PaymentGatewayBox};
use payment_orchestrator::infrastructure::http_gateway::HttpGatewayClient;
use payment_orchestrator::infrastructure::in_memory::InMemoryStore;
use payment_orchestrator::infrastructure::simulated_gateway::{GatewayBehavior, SimulatedGateway};
use payment_orchestrator::interfaces::csv::wallet_writer::WalletWriter;
use payment_orchestrator::interfaces::jsonl::request_reader::RequestReader;
use payment_orchestrator::interfaces::jsonl::response_writer::ResponseWriter;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GatewayKind {
    /// In-process gateway, no network.
    Simulated,
    /// External processor at GATEWAY_BASE_URL.
    Http,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Behavior {
    Approve,
    Decline,
    Fail,
    Pending,
}

impl From<Behavior> for GatewayBehavior {
    fn from(behavior: Behavior) -> Self {
        match behavior {
            Behavior::Approve => GatewayBehavior::AlwaysApprove,
            Behavior::Decline => GatewayBehavior::AlwaysDecline,
            Behavior::Fail => GatewayBehavior::AlwaysFail,
            Behavior::Pending => GatewayBehavior::AlwaysPending,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input requests, one JSON object per line
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Gateway to charge payments through
    #[arg(long, value_enum, default_value_t = GatewayKind::Simulated)]
    gateway: GatewayKind,

    /// How the simulated gateway answers
    #[arg(long, value_enum, default_value_t = Behavior::Approve)]
    gateway_behavior: Behavior,

    /// Write a wallet summary CSV here once all requests are handled
    #[arg(long)]
    wallets_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().into_diagnostic()?;

    let store: DurableStoreRef = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            use payment_orchestrator::infrastructure::rocksdb::RocksDBStore;
            Arc::new(RocksDBStore::open(db_path).into_diagnostic()?)
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Arc::new(InMemoryStore::new())
        }
        None => Arc::new(InMemoryStore::new()),
    };

    let gateway: PaymentGatewayBox = match cli.gateway {
        GatewayKind::Simulated => Box::new(SimulatedGateway::new(cli.gateway_behavior.into())),
        GatewayKind::Http => Box::new(
            HttpGatewayClient::new(config.http_gateway().into_diagnostic()?).into_diagnostic()?,
        ),
    };

    let orchestrator = Orchestrator::new(store, gateway, &config);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = RequestReader::new(BufReader::new(file));
    let stdout = io::stdout();
    let mut writer = ResponseWriter::new(stdout.lock());
    for request in reader.requests() {
        match request {
            Ok(request) => {
                let result = orchestrator.handle(request).await;
                if let Err(e) = &result {
                    tracing::debug!(code = e.code(), error = %e, "request failed");
                }
                writer.write(&result).into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading request: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;

    if let Some(path) = cli.wallets_csv {
        let wallets = orchestrator.wallets().list_wallets().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        WalletWriter::new(file)
            .write_wallets(&wallets)
            .into_diagnostic()?;
    }

    Ok(())
}
