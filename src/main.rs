use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payrail::application::ledger::Ledger;
use payrail::application::service::PaymentService;
use payrail::config::ServiceConfig;
use payrail::domain::account::OwnerId;
use payrail::infrastructure::clock::SystemClock;
use payrail::infrastructure::in_memory::{InMemoryAccountStore, InMemoryTransactionStore};
use payrail::infrastructure::processor::build_processor;
use payrail::interfaces::csv::report_writer::BalanceWriter;
use payrail::interfaces::csv::request_reader::RequestReader;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input payment requests CSV file
    input: PathBuf,

    /// Path to a JSON service configuration (optional). Defaults apply
    /// field by field.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => ServiceConfig::from_path(&path).into_diagnostic()?,
        None => ServiceConfig::default(),
    };

    let (events, mut receiver) =
        tokio::sync::mpsc::unbounded_channel::<payrail::domain::events::DomainEvent>();
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            tracing::info!(
                event = event.name(),
                id = %event.transaction().id,
                amount = %event.transaction().amount,
                "domain event"
            );
        }
    });

    let ledger = Ledger::new(
        Box::new(InMemoryAccountStore::new()),
        Box::new(InMemoryTransactionStore::new()),
        Arc::new(SystemClock),
    );
    let processor = build_processor(&config.processor);
    let service = PaymentService::new(ledger, processor, events, config);

    // Process requests
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    for request in reader.requests() {
        match request {
            Ok(request) => {
                if let Err(e) = service.process_transaction(request).await {
                    eprintln!("Error processing request: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading request: {e}");
            }
        }
    }

    // Final balance report for every owner with an account
    let accounts = service.ledger().all_accounts().await.into_diagnostic()?;
    let mut owners: Vec<OwnerId> = accounts.into_iter().map(|a| a.owner).collect();
    owners.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    owners.dedup();

    let mut report = Vec::with_capacity(owners.len());
    for owner in owners {
        if let Some(info) = service.get_balance(&owner).await.into_diagnostic()? {
            report.push(info);
        }
    }

    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_report(&report).into_diagnostic()?;

    Ok(())
}
