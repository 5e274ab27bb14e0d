use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valuator_core::domain::request::ValuationRequest;
use valuator_core::ingest::provider::HttpJsonDataProvider;
use valuator_core::observer::TracingObserver;
use valuator_core::pipeline::{analyze_company, AnalysisContext};
use valuator_core::time::calendar::resolve_today;

mod request;

#[derive(Debug, Parser)]
#[command(name = "valuator_worker")]
struct Args {
    /// Ticker to score.
    #[arg(long)]
    ticker: Option<String>,

    /// Discover this many peers (default: VALUATOR_PEER_COUNT or 5).
    #[arg(long)]
    peers: Option<usize>,

    /// Explicit, equally weighted peers: `BBB,CCC`.
    #[arg(long)]
    peer_list: Option<String>,

    /// Explicit weighted peers: `BBB=0.6,CCC=0.4`.
    #[arg(long)]
    peer_weights: Option<String>,

    /// Income score weights: `growth=0.5,peers=0.5`.
    #[arg(long)]
    income_weights: Option<String>,

    /// Global score weights: `income=0.4,balance=0.3,cash_flow=0.3`.
    #[arg(long)]
    global_weights: Option<String>,

    /// Multiples weights: `pe=0.25,ps=0.25,pgp=0.25,pfcf=0.25`.
    #[arg(long)]
    multiples_weights: Option<String>,

    /// Date closing the newest fundamentals interval (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long)]
    today: Option<String>,

    /// Read the whole request from a JSON file instead of the flags above.
    #[arg(long, conflicts_with_all = ["ticker", "peers", "peer_list", "peer_weights"])]
    request: Option<std::path::PathBuf>,

    /// Include the daily multiples table in the output.
    #[arg(long)]
    include_history: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = valuator_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let mut valuation_request = match &args.request {
        Some(path) => read_request(path)?,
        None => request::build_request(
            request::RequestFlags {
                ticker: args.ticker.clone(),
                peers: args.peers,
                peer_list: args.peer_list.clone(),
                peer_weights: args.peer_weights.clone(),
                income_weights: args.income_weights.clone(),
                global_weights: args.global_weights.clone(),
                multiples_weights: args.multiples_weights.clone(),
                include_history: args.include_history,
            },
            request::default_peer_count_from_env(),
        )?,
    };
    if args.include_history {
        valuation_request.include_history = true;
    }

    let today_arg = args
        .today
        .clone()
        .or_else(|| valuation_request.today.map(|d| d.to_string()));
    let today = resolve_today(today_arg.as_deref(), chrono::Utc::now())
        .context("--today must be YYYY-MM-DD")?;

    let provider = HttpJsonDataProvider::from_settings(&settings)?;
    let ctx = AnalysisContext {
        today,
        price_currency: settings.price_currency(),
    };

    tracing::info!(ticker = %valuation_request.ticker, %today, "valuation run started");

    match analyze_company(&provider, &valuation_request, &ctx, &TracingObserver).await {
        Ok(document) => {
            let out = serde_json::to_string_pretty(&document)
                .context("failed to serialize score document")?;
            println!("{out}");
            tracing::info!(
                ticker = %document.ticker,
                financial_score = ?document.financials.score,
                historic_score = ?document.price_historic.score,
                "valuation run finished"
            );
            Ok(())
        }
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "valuation run failed");
            Err(err)
        }
    }
}

fn read_request(path: &std::path::Path) -> anyhow::Result<ValuationRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("request file {} is not a valid request", path.display()))
}

fn init_sentry(settings: &valuator_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
