use crate::domain::kpis::{
    CASH_FLOW_ANNUAL, CASH_FLOW_MULTIPLES_TTM, INCOME_ANNUAL, INCOME_MARGINS_TTM,
    INCOME_MULTIPLES_TTM,
};
use crate::domain::peers::{PeerSet, ResolvedPeers};
use crate::domain::report::{
    BalanceSection, CashFlowSection, FinancialsSection, HistoricSection, IncomeSection,
    ScoreDocument,
};
use crate::domain::request::ValuationRequest;
use crate::domain::weights::FinancialWeights;
use crate::error::ScoringError;
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::statement::fetch_financial_statement;
use crate::ingest::types::{ReportPeriod, StatementKind};
use crate::observer::{ScoreEvent, ScoreObserver};
use crate::scoring::aggregate::{score_financial, score_income};
use crate::scoring::balance::{derive_balance_kpis, score_balance};
use crate::scoring::growth::{score_growth, GrowthOutcome};
use crate::scoring::historic::{score_historic_multiples, HistoricMultiplesScore};
use crate::scoring::margins::{score_peer_margins, Margins};
use crate::scoring::multiples::{build_multiples, MultiplesInput, MultiplesTable};
use crate::scoring::peer_multiples::score_peer_multiples;
use chrono::NaiveDate;
use futures_util::future::join_all;

/// Inputs that come from the environment rather than the request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    /// Closes the newest fundamentals interval.
    pub today: NaiveDate,
    /// Currency the provider quotes daily prices in.
    pub price_currency: String,
}

/// Runs one valuation request end to end.
///
/// Subject data that cannot be fetched fails the request; a peer whose data cannot be
/// fetched is reported to `observer` and left out of the comparison it failed in.
pub async fn analyze_company(
    provider: &dyn MarketDataProvider,
    request: &ValuationRequest,
    ctx: &AnalysisContext,
    observer: &dyn ScoreObserver,
) -> Result<ScoreDocument, ScoringError> {
    let peer_set = request.validate(observer)?;
    let ticker = request.normalized_ticker();
    let peers = resolve_peers(provider, &ticker, peer_set).await?;
    tracing::info!(
        %ticker,
        provider = provider.provider_name(),
        peers = ?peers.tickers,
        today = %ctx.today,
        "analysis started"
    );

    let financials =
        score_financials(provider, &ticker, &peers, &request.financial_weights, observer).await?;

    let multiples = fetch_multiples(provider, &ticker, ctx, observer).await?;
    let historic = score_historic_multiples(&multiples, request.multiples_weights.as_ref());
    report_historic_gaps(observer, &historic);
    observer.on_event(ScoreEvent::ComponentScored {
        component: "price_historic",
        score: historic.score,
    });

    let mut entities = Vec::with_capacity(peers.tickers.len() + 1);
    if let Some(latest) = multiples.latest() {
        entities.push((ticker.clone(), latest.clone()));
    }
    let peer_multiples = join_all(peers.tickers.iter().map(|peer| async move {
        (peer, fetch_multiples(provider, peer, ctx, observer).await)
    }))
    .await;
    for (peer, result) in peer_multiples {
        match result.map(|table| table.latest().cloned()) {
            Ok(Some(latest)) => entities.push((peer.clone(), latest)),
            Ok(None) => skip_peer(observer, peer, "multiples", "no multiples rows".to_string()),
            Err(err) => skip_peer(observer, peer, "multiples", err.to_string()),
        }
    }
    let price_peers = score_peer_multiples(entities, request.multiples_weights.as_ref());
    observer.on_event(ScoreEvent::ComponentScored {
        component: "price_peers",
        score: price_peers.score_of(&ticker),
    });

    Ok(ScoreDocument {
        ticker,
        as_of: ctx.today,
        peers: peers.tickers,
        financials,
        price_historic: HistoricSection {
            detail: historic.detail,
            score: historic.score,
            multiples: request.include_history.then_some(multiples),
        },
        price_peers,
    })
}

async fn resolve_peers(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    peer_set: PeerSet,
) -> Result<ResolvedPeers, ScoringError> {
    let discovered = match peer_set.discovery_count() {
        // One extra slot in case the provider lists the subject itself.
        Some(n) => provider
            .discover_peers(ticker, n + 1)
            .await
            .map_err(|e| ScoringError::fetch(ticker, "peers", &e))?
            .into_iter()
            .filter(|peer| !peer.trim().eq_ignore_ascii_case(ticker))
            .collect(),
        None => Vec::new(),
    };
    Ok(peer_set.into_resolved(discovered))
}

async fn score_financials(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    peers: &ResolvedPeers,
    weights: &FinancialWeights,
    observer: &dyn ScoreObserver,
) -> Result<FinancialsSection, ScoringError> {
    // Income statement: annual growth plus TTM margins against peers.
    let income = fetch_financial_statement(
        provider,
        ticker,
        StatementKind::Income,
        &INCOME_ANNUAL,
        ReportPeriod::Annual,
        observer,
    )
    .await?;
    let income_growth = score_growth(&income.filtered);
    report_growth(observer, "income_growth", &income_growth);

    let subject_margins = fetch_margins(provider, ticker, observer).await?;
    let peer_margins = join_all(peers.tickers.iter().map(|peer| async move {
        (peer, fetch_margins(provider, peer, observer).await)
    }))
    .await;
    let mut comparable = Vec::with_capacity(peer_margins.len());
    for (peer, result) in peer_margins {
        match result {
            Ok(margins) => comparable.push((peer.clone(), margins)),
            Err(err) => skip_peer(observer, peer, "margins", err.to_string()),
        }
    }
    let margins = score_peer_margins(subject_margins, comparable, &peers.weights);
    observer.on_event(ScoreEvent::ComponentScored {
        component: "income_peers",
        score: margins.score,
    });

    let income_score = score_income(income_growth.score(), margins.score, weights.income.as_ref());
    observer.on_event(ScoreEvent::ComponentScored {
        component: "income",
        score: income_score,
    });

    // Balance sheet: latest annual column of the published statement, unfiltered.
    let balance = provider
        .fetch_statement(ticker, StatementKind::BalanceSheet, ReportPeriod::Annual)
        .await
        .map_err(|e| ScoringError::fetch(ticker, StatementKind::BalanceSheet.as_str(), &e))?;
    let kpis = derive_balance_kpis(
        &balance.latest_items(),
        &income.full.latest_items(),
        observer,
    )?;
    let balance_score = score_balance(&kpis.ratios);
    observer.on_event(ScoreEvent::ComponentScored {
        component: "balance",
        score: balance_score.score,
    });

    // Cash flow: annual growth only.
    let cash_flow = fetch_financial_statement(
        provider,
        ticker,
        StatementKind::CashFlow,
        &CASH_FLOW_ANNUAL,
        ReportPeriod::Annual,
        observer,
    )
    .await?;
    let cash_flow_growth = score_growth(&cash_flow.filtered);
    report_growth(observer, "cash_flow_growth", &cash_flow_growth);
    let cash_flow_score = cash_flow_growth.score();

    let score = score_financial(
        income_score,
        balance_score.score,
        cash_flow_score,
        weights.global.as_ref(),
    );
    observer.on_event(ScoreEvent::ComponentScored {
        component: "financial",
        score,
    });

    Ok(FinancialsSection {
        income: IncomeSection {
            table: income.filtered,
            growth: income_growth,
            margins,
            score: income_score,
        },
        balance: BalanceSection {
            kpis,
            rules: balance_score.rules,
            score: balance_score.score,
        },
        cash_flow: CashFlowSection {
            table: cash_flow.filtered,
            growth: cash_flow_growth,
            score: cash_flow_score,
        },
        score,
    })
}

async fn fetch_margins(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    observer: &dyn ScoreObserver,
) -> Result<Margins, ScoringError> {
    let ttm = fetch_financial_statement(
        provider,
        ticker,
        StatementKind::Income,
        &INCOME_MARGINS_TTM,
        ReportPeriod::Ttm,
        observer,
    )
    .await?;
    Margins::from_latest(&ttm.filtered)
}

/// Fetches TTM fundamentals, prices and, when currencies differ, FX rates for one ticker
/// and builds its daily multiples.
pub async fn fetch_multiples(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    ctx: &AnalysisContext,
    observer: &dyn ScoreObserver,
) -> Result<MultiplesTable, ScoringError> {
    let income = fetch_financial_statement(
        provider,
        ticker,
        StatementKind::Income,
        &INCOME_MULTIPLES_TTM,
        ReportPeriod::Ttm,
        observer,
    )
    .await?;
    let cash_flow = fetch_financial_statement(
        provider,
        ticker,
        StatementKind::CashFlow,
        &CASH_FLOW_MULTIPLES_TTM,
        ReportPeriod::Ttm,
        observer,
    )
    .await?;

    let prices = provider
        .fetch_daily_prices(ticker)
        .await
        .map_err(|e| ScoringError::fetch(ticker, "daily prices", &e))?;
    let currency = provider
        .fetch_reporting_currency(ticker)
        .await
        .map_err(|e| ScoringError::fetch(ticker, "reporting currency", &e))?;

    let fx = if currency.eq_ignore_ascii_case(&ctx.price_currency) {
        None
    } else {
        let rates = provider.fetch_fx_rates(&currency).await.map_err(|e| {
            ScoringError::CurrencyMismatchUnresolved {
                currency: currency.clone(),
                price_currency: ctx.price_currency.clone(),
                detail: format!("{e:#}"),
            }
        })?;
        observer.on_event(ScoreEvent::CurrencyAdjusted {
            ticker: ticker.to_string(),
            currency: currency.clone(),
        });
        Some(rates)
    };

    let table = build_multiples(
        MultiplesInput {
            income_ttm: &income.filtered,
            cash_flow_ttm: &cash_flow.filtered,
            prices: &prices,
            fx: fx.as_deref(),
        },
        ctx.today,
    )?;
    tracing::debug!(%ticker, days = table.rows().len(), %currency, "multiples built");
    Ok(table)
}

fn report_growth(observer: &dyn ScoreObserver, component: &'static str, outcome: &GrowthOutcome) {
    if let GrowthOutcome::InsufficientData { periods, metrics } = outcome {
        observer.on_event(ScoreEvent::InsufficientData {
            component,
            detail: format!("{periods} periods over {metrics} metrics"),
        });
    }
    observer.on_event(ScoreEvent::ComponentScored {
        component,
        score: outcome.score(),
    });
}

/// Multiples whose history gives no score are left out of the historic combination.
fn report_historic_gaps(observer: &dyn ScoreObserver, historic: &HistoricMultiplesScore) {
    for (name, history) in &historic.detail {
        if history.score.is_none() {
            observer.on_event(ScoreEvent::InsufficientData {
                component: "price_historic",
                detail: format!(
                    "{name} left out: current {:?}, range {:?}..{:?}",
                    history.current, history.min, history.max
                ),
            });
        }
    }
}

fn skip_peer(observer: &dyn ScoreObserver, peer: &str, stage: &'static str, reason: String) {
    observer.on_event(ScoreEvent::PeerSkipped {
        ticker: peer.to_string(),
        stage,
        reason,
    });
}
