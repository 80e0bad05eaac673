//! Backtest engine and index loop.
//!
//! [`Backtester::run`] wires the whole pipeline: parse the tree, resolve the
//! date range, load closes, then hand over to [`run_backtest`] which builds
//! the indicator and pre-calc caches and walks the axis one trading day at a
//! time, interpreting the tree and rebalancing at every step.

use crate::domain::date_range::resolve_date_range;
use crate::domain::error::TreeTraderError;
use crate::domain::indicator_cache::IndicatorCache;
use crate::domain::interpreter::{Allocation, Interpreter};
use crate::domain::metrics::Metrics;
use crate::domain::node::TradingBotNode;
use crate::domain::ohlc_cache::OhlcCache;
use crate::domain::parser::{parse, ParsedStrategy};
use crate::domain::precalc_cache::PreCalcCache;
use crate::domain::rebalancer::Rebalancer;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Engine tunables read from the `[engine]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Volatility substituted for a zero (or negative) pre-calc volatility.
    pub inverse_volatility_floor: f64,
    pub max_pre_calc_depth: usize,
    /// Annual rate, as a fraction.
    pub risk_free_rate: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            inverse_volatility_floor: 0.0001,
            max_pre_calc_depth: 3,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeOptions {
    #[serde(default)]
    pub history: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub starting_balance: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trading_bot: TradingBotNode,
    #[serde(default)]
    pub include: IncludeOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    /// Every tradeable ticker by percentage of balance; `None` where the
    /// tree routed no weight that day.
    pub tickers: Allocation,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResults {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub starting_balance: f64,
    pub ending_balance: f64,
    pub ticker_start_dates: BTreeMap<String, NaiveDate>,
    pub metrics: Metrics,
    pub trades: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryPoint>>,
}

pub struct Backtester<'a> {
    port: &'a dyn DataPort,
    settings: EngineSettings,
}

impl<'a> Backtester<'a> {
    pub fn new(port: &'a dyn DataPort, settings: EngineSettings) -> Self {
        Self { port, settings }
    }

    pub fn run(
        &self,
        request: &BacktestRequest,
        today: NaiveDate,
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestResults, TreeTraderError> {
        let parsed = parse(&request.trading_bot)?;
        tracing::info!(
            assets = parsed.assets.len(),
            indicators = parsed.indicators.len(),
            pre_calcs = parsed.pre_calcs.len(),
            lookback = parsed.required_lookback(),
            "parsed strategy"
        );

        let bounds = resolve_date_range(self.port, &parsed, request.start_date, request.end_date, today)?;
        let ohlc = OhlcCache::load(self.port, &parsed, &bounds)?;
        run_backtest(request, &parsed, &ohlc, &self.settings, cancel)
    }
}

/// Run the index loop over already-loaded closes.
pub fn run_backtest(
    request: &BacktestRequest,
    parsed: &ParsedStrategy,
    ohlc: &OhlcCache,
    settings: &EngineSettings,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResults, TreeTraderError> {
    let starting_balance = request.starting_balance as f64;
    let indicators = IndicatorCache::load(ohlc, &parsed.indicators)?;
    let pre_calcs = PreCalcCache::load(
        &request.trading_bot,
        parsed,
        ohlc,
        &indicators,
        settings,
        starting_balance,
    )?;

    let interpreter = Interpreter::new(&parsed.tradeable_assets, &indicators, &pre_calcs, settings);
    let mut rebalancer = Rebalancer::new(ohlc, starting_balance);

    let start = ohlc
        .tradeable_start_index()
        .max(indicators.first_complete_index())
        .max(pre_calcs.first_complete_index());
    tracing::info!(start, days = ohlc.get_max_length(), "starting backtest loop");

    let mut balances = Vec::new();
    let mut history = request.include.history.then(Vec::new);
    let mut index = start;
    while index < ohlc.get_max_length() && ohlc.has_bars_for_index(index) {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            tracing::info!(index, "backtest cancelled");
            return Err(TreeTraderError::Cancelled { index });
        }

        let allocation = interpreter.evaluate(&request.trading_bot, index)?;
        let outcome = rebalancer.rebalance(index, &allocation)?;
        balances.push(outcome.balance);

        if let Some(history) = history.as_mut() {
            history.push(HistoryPoint {
                date: date_at(ohlc, index)?,
                tickers: allocation,
                value: outcome.balance,
            });
        }
        index += 1;
    }

    if balances.is_empty() {
        return Err(TreeTraderError::InsufficientData {
            reason: format!(
                "no tradeable days: evaluation starts at index {} of {}",
                start,
                ohlc.get_max_length()
            ),
        });
    }

    let ticker_start_dates = parsed
        .assets
        .iter()
        .filter_map(|ticker| {
            let first = ohlc.first_index_with_data(ticker)?;
            Some((ticker.clone(), ohlc.date_at(first)?))
        })
        .collect();

    let ending_balance = balances.last().copied().unwrap_or(starting_balance);
    let results = BacktestResults {
        date_from: date_at(ohlc, start)?,
        date_to: date_at(ohlc, index - 1)?,
        starting_balance,
        ending_balance,
        ticker_start_dates,
        metrics: Metrics::compute(&balances, settings.risk_free_rate),
        trades: rebalancer.trades().len(),
        history,
    };
    tracing::info!(
        days = balances.len(),
        ending_balance,
        trades = results.trades,
        "backtest complete"
    );
    Ok(results)
}

fn date_at(ohlc: &OhlcCache, index: usize) -> Result<NaiveDate, TreeTraderError> {
    ohlc.date_at(index).ok_or_else(|| TreeTraderError::InsufficientData {
        reason: format!("no calendar date for index {}", index),
    })
}
