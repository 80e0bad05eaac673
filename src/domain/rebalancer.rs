//! Portfolio rebalancing state machine.
//!
//! One `Rebalancer` is driven index by index through a run. Each step marks
//! existing holdings to market, then trades every ticker in the allocation to
//! its target percentage of the marked balance. Whatever the allocation leaves
//! unassigned is held as cash with zero return.

use crate::domain::error::TreeTraderError;
use crate::domain::interpreter::Allocation;
use crate::domain::ohlc_cache::OhlcCache;
use serde::Serialize;
use std::collections::BTreeMap;

const MIN_SHARE_DELTA: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Holding {
    pub percentage: f64,
    pub shares: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub index: usize,
    pub ticker: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    /// Marked-to-market balance before any trade at this index.
    pub balance: f64,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone)]
pub struct Rebalancer<'a> {
    ohlc: &'a OhlcCache,
    holdings: BTreeMap<String, Holding>,
    cash: f64,
    balance: f64,
    trades: Vec<Trade>,
}

impl<'a> Rebalancer<'a> {
    pub fn new(ohlc: &'a OhlcCache, starting_balance: f64) -> Self {
        Self {
            ohlc,
            holdings: BTreeMap::new(),
            cash: starting_balance,
            balance: starting_balance,
            trades: Vec::new(),
        }
    }

    pub fn rebalance(&mut self, index: usize, allocation: &Allocation) -> Result<RebalanceOutcome, TreeTraderError> {
        self.mark_to_market(index)?;
        let balance = self.balance;

        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for (ticker, percentage) in allocation {
            let Some(price) = self.ohlc.get_bar_for_index(ticker, index)?.filter(|p| *p > 0.0) else {
                continue;
            };
            let percentage = percentage.unwrap_or(0.0);
            let target_shares = percentage / 100.0 * balance / price;
            let held_shares = self.holdings.get(ticker).map_or(0.0, |h| h.shares);
            let delta = target_shares - held_shares;

            if delta.abs() >= MIN_SHARE_DELTA {
                let trade = Trade {
                    index,
                    ticker: ticker.clone(),
                    side: if delta > 0.0 { TradeSide::Buy } else { TradeSide::Sell },
                    shares: delta.abs(),
                    price,
                };
                match trade.side {
                    TradeSide::Sell => sells.push(trade),
                    TradeSide::Buy => buys.push(trade),
                }
            }

            if target_shares > 0.0 {
                self.holdings.insert(
                    ticker.clone(),
                    Holding {
                        percentage,
                        shares: target_shares,
                        value: target_shares * price,
                    },
                );
            } else {
                self.holdings.remove(ticker);
            }
        }

        let invested: f64 = self.holdings.values().map(|h| h.value).sum();
        self.cash = balance - invested;
        for holding in self.holdings.values_mut() {
            holding.percentage = holding.value / balance * 100.0;
        }

        let mut trades = sells;
        trades.append(&mut buys);
        for trade in &trades {
            tracing::debug!(
                index,
                ticker = %trade.ticker,
                side = ?trade.side,
                shares = trade.shares,
                price = trade.price,
                "trade"
            );
        }
        self.trades.extend(trades.iter().cloned());

        Ok(RebalanceOutcome { balance, trades })
    }

    fn mark_to_market(&mut self, index: usize) -> Result<(), TreeTraderError> {
        for (ticker, holding) in self.holdings.iter_mut() {
            if let Some(price) = self.ohlc.get_bar_for_index(ticker, index)? {
                holding.value = holding.shares * price;
            }
        }
        self.balance = self.holdings.values().map(|h| h.value).sum::<f64>() + self.cash;
        Ok(())
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> &BTreeMap<String, Holding> {
        &self.holdings
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }
}
