use std::{env, fs::File, path::Path, sync::Arc};

use tracing::info;
use tracing_subscriber::EnvFilter;

use wallet_engine::{
    EngineConfig, Ledger, SettlementEngine, TransactionLog, dlq::TracingDLQ,
    ingestion::CsvReader, output_repository::CsvSnapshotOutput,
};

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    // stdout carries the report, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::from_env();
    info!(
        currency = %config.currency,
        min_withdrawal = %config.min_withdrawal(),
        "configuration loaded"
    );
    let mut args = env::args();

    let file_path = args
        .nth(1)
        .ok_or("usage: wallet_engine <settlements.csv>")?;
    let file = File::open(Path::new(&file_path))?;

    // Set up the components
    let ledger = Arc::new(Ledger::new(config.currency, Arc::new(TransactionLog::new())));
    let ingestion = CsvReader::new(file, config.currency)?;
    let mut engine = SettlementEngine::new(ingestion, ledger, TracingDLQ::default());

    let summary = engine.process().await?;
    info!(file = %file_path, applied = summary.applied, rejected = summary.rejected, "done");

    let mut output = CsvSnapshotOutput::new(std::io::stdout());
    engine.flush(&mut output).await?;

    Ok(())
}
