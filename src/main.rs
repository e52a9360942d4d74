use clap::{Parser, ValueEnum};
use cohort_saga::application::orchestrator::Orchestrator;
use cohort_saga::config::{SagaConfig, SessionContext};
use cohort_saga::domain::policy::{FirstWins, RandomWinner};
use cohort_saga::infrastructure::sandbox::SandboxProvider;
use cohort_saga::interfaces::json::card_reader::CardReader;
use cohort_saga::interfaces::json::report_writer::ReportWriter;
use miette::{IntoDiagnostic, Result, miette};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// The first registered customer wins
    First,
    /// A uniformly random customer wins
    Random,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider key pair as `public,private`
    #[arg(long, env = "COHORT_SAGA_KEYS", hide_env_values = true)]
    keys: String,

    /// Payment form JSON (`cardNo`, `CVC`, `expire`, `holderName`, ...)
    #[arg(long)]
    card: PathBuf,

    /// Saga configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of customers in the cohort
    #[arg(long)]
    cohort_size: Option<usize>,

    /// Timeout for each provider call, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enroll and authorize customers concurrently
    #[arg(long)]
    parallel: bool,

    /// How the winner is chosen
    #[arg(long, value_enum, default_value = "first")]
    policy: Policy,

    /// Seed for the random policy
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let session = SessionContext::from_key_pair(&cli.keys).into_diagnostic()?;

    let mut config = match &cli.config {
        Some(path) => SagaConfig::load(path).into_diagnostic()?,
        None => SagaConfig::default(),
    };
    if let Some(size) = cli.cohort_size {
        config.cohort_size = size;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.call_timeout_ms = timeout_ms;
    }
    config.parallel |= cli.parallel;

    let input = CardReader::new(File::open(&cli.card).into_diagnostic()?)
        .read()
        .into_diagnostic()?;
    if let Some(method) = input.method {
        config.method = method;
    }
    if input.pay_times.is_some() {
        config.pay_times = input.pay_times.clone();
    }

    let provider = Arc::new(SandboxProvider::connect(&session));
    let orchestrator = Orchestrator::new(provider, session, config).into_diagnostic()?;
    let orchestrator = match (cli.policy, cli.seed) {
        (Policy::First, _) => orchestrator.with_policy(FirstWins),
        (Policy::Random, Some(seed)) => orchestrator.with_policy(RandomWinner::seeded(seed)),
        (Policy::Random, None) => orchestrator.with_policy(RandomWinner::new()),
    };

    let report = orchestrator.run(&input.card).await;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_report(&report).into_diagnostic()?;

    match report.aborted_stage() {
        None => Ok(()),
        Some(stage) => Err(miette!("saga aborted during {stage}")),
    }
}
