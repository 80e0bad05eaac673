//! Pre-calculated statistics over node sub-simulations.
//!
//! Weight-inverse-volatility and filter nodes rank their children by how those
//! children would have performed on their own. For each such child the cache
//! runs the child's subtree as a stand-alone strategy across the whole axis
//! (fresh interpreter and rebalancer, same starting balance), turns the
//! resulting balance curve into daily percent returns and applies the
//! requested [`PreCalcFunction`](crate::domain::precalc::PreCalcFunction).
//!
//! Nested pre-calc nodes are built deepest first so that a sub-simulation can
//! read the statistics of the nodes below it. Each depth level is built in
//! parallel.

use crate::domain::backtest::EngineSettings;
use crate::domain::error::TreeTraderError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator_cache::IndicatorCache;
use crate::domain::interpreter::Interpreter;
use crate::domain::node::TradingBotNode;
use crate::domain::ohlc_cache::OhlcCache;
use crate::domain::parser::{ParsedStrategy, PreCalc};
use crate::domain::rebalancer::Rebalancer;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct PreCalcCache {
    series: HashMap<String, IndicatorSeries>,
}

impl PreCalcCache {
    pub fn load(
        tree: &TradingBotNode,
        parsed: &ParsedStrategy,
        ohlc: &OhlcCache,
        indicators: &IndicatorCache,
        settings: &EngineSettings,
        starting_balance: f64,
    ) -> Result<Self, TreeTraderError> {
        if let Some(too_deep) = parsed
            .pre_calcs
            .iter()
            .find(|p| p.depth > settings.max_pre_calc_depth)
        {
            return Err(TreeTraderError::PreCalcNestingTooDeep {
                node_id: too_deep.node_id.clone(),
                depth: too_deep.depth,
                max: settings.max_pre_calc_depth,
            });
        }
        if parsed.max_pre_calc_depth > 1 {
            tracing::warn!(
                depth = parsed.max_pre_calc_depth,
                pre_calcs = parsed.pre_calcs.len(),
                "nested pre-calc nodes, each level repeats the simulation"
            );
        }

        let mut cache = Self::default();
        for depth in (1..=parsed.max_pre_calc_depth).rev() {
            let level: Vec<&PreCalc> = parsed.pre_calcs.iter().filter(|p| p.depth == depth).collect();
            let built = level
                .par_iter()
                .map(|pre_calc| -> Result<(String, IndicatorSeries), TreeTraderError> {
                    let node = tree
                        .find(&pre_calc.node_id)
                        .ok_or_else(|| TreeTraderError::NodeNotFound {
                            node_id: pre_calc.node_id.clone(),
                        })?;
                    let series = cache.simulate(node, pre_calc, ohlc, indicators, settings, starting_balance)?;
                    Ok((pre_calc.node_id.clone(), series))
                })
                .collect::<Result<Vec<_>, _>>()?;
            tracing::info!(depth, pre_calcs = built.len(), "built pre-calc level");
            cache.series.extend(built);
        }
        Ok(cache)
    }

    pub fn from_series(series: HashMap<String, IndicatorSeries>) -> Self {
        Self { series }
    }

    fn simulate(
        &self,
        node: &TradingBotNode,
        pre_calc: &PreCalc,
        ohlc: &OhlcCache,
        indicators: &IndicatorCache,
        settings: &EngineSettings,
        starting_balance: f64,
    ) -> Result<IndicatorSeries, TreeTraderError> {
        let tradeable = node.asset_tickers();
        let start = self.simulation_start(node, &tradeable, ohlc, indicators);
        let interpreter = Interpreter::new(&tradeable, indicators, self, settings);
        let mut rebalancer = Rebalancer::new(ohlc, starting_balance);

        let mut returns = Vec::new();
        let mut previous = None;
        let mut index = start;
        while index < ohlc.get_max_length() && ohlc.has_bars_for_index(index) {
            let allocation = interpreter.evaluate(node, index)?;
            let outcome = rebalancer.rebalance(index, &allocation)?;
            if let Some(previous) = previous {
                returns.push((outcome.balance / previous - 1.0) * 100.0);
            }
            previous = Some(outcome.balance);
            index += 1;
        }

        let values = pre_calc
            .function
            .calculate(&returns, pre_calc.window)
            .map_err(|e| match e {
                TreeTraderError::NotEnoughData { have, need, .. } => TreeTraderError::InsufficientData {
                    reason: format!(
                        "pre-calc for node {}: {} simulated returns, {} needed",
                        pre_calc.node_id, have, need
                    ),
                },
                other => other,
            })?;

        // returns[k] belongs to axis index start + 1 + k
        let start_index = start + 1 + pre_calc.function.first_valid_offset(pre_calc.window);
        tracing::debug!(
            node_id = %pre_calc.node_id,
            function = %pre_calc.function,
            start_index,
            values = values.len(),
            "pre-calc simulated"
        );
        Ok(IndicatorSeries { start_index, values })
    }

    /// First index where the subtree's prices, indicators and nested
    /// pre-calcs are all available.
    fn simulation_start(
        &self,
        node: &TradingBotNode,
        tradeable: &BTreeSet<String>,
        ohlc: &OhlcCache,
        indicators: &IndicatorCache,
    ) -> usize {
        let data_start = tradeable
            .iter()
            .map(|t| ohlc.first_index_with_data(t).unwrap_or(ohlc.get_max_length()))
            .max()
            .unwrap_or(0);
        let nested_start = self
            .series
            .iter()
            .filter(|(id, _)| node.id != **id && node.find(id).is_some())
            .map(|(_, s)| s.start_index)
            .max()
            .unwrap_or(0);
        data_start
            .max(nested_start)
            .max(indicators.first_complete_index())
    }

    pub fn get_pre_calc_for_node_id(&self, node_id: &str, index: usize) -> Result<f64, TreeTraderError> {
        let series = self
            .series
            .get(node_id)
            .ok_or_else(|| TreeTraderError::UnknownPreCalc {
                node_id: node_id.to_string(),
            })?;
        if index < series.start_index {
            return Err(TreeTraderError::LookbackNotAvailable {
                key: format!("pre-calc {}", node_id),
                index,
                first_valid: series.start_index,
            });
        }
        series
            .value_at(index)
            .ok_or_else(|| TreeTraderError::InsufficientData {
                reason: format!("pre-calc {} has no value at index {}", node_id, index),
            })
    }

    pub fn get_series(&self, node_id: &str) -> Option<&IndicatorSeries> {
        self.series.get(node_id)
    }

    /// First axis index at which every pre-calc has a value.
    pub fn first_complete_index(&self) -> usize {
        self.series
            .values()
            .map(|s| s.start_index)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{NodeKind, Selection, SortBy};
    use crate::domain::parser::parse;
    use crate::domain::precalc::PreCalcFunction;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn ohlc(spy: Vec<f64>, tlt: Vec<f64>) -> OhlcCache {
        let dates = (0..spy.len() as u64)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i))
            .collect();
        let mut series = HashMap::new();
        series.insert("SPY".to_string(), spy.into_iter().map(Some).collect());
        series.insert("TLT".to_string(), tlt.into_iter().map(Some).collect());
        OhlcCache::from_series(dates, series, 0).unwrap()
    }

    fn filter_tree(window: usize) -> TradingBotNode {
        TradingBotNode::new(
            "root",
            NodeKind::Root {
                children: vec![TradingBotNode::new(
                    "f",
                    NodeKind::Filter {
                        sort: SortBy {
                            function: PreCalcFunction::CumulativeReturn,
                            window,
                        },
                        select: Selection::Top,
                        count: 1,
                        children: vec![
                            TradingBotNode::asset("spy", "SPY"),
                            TradingBotNode::asset("tlt", "TLT"),
                        ],
                    },
                )],
            },
        )
    }

    #[test]
    fn asset_pre_calc_tracks_price_returns() {
        // SPY +10% per day, TLT flat
        let spy: Vec<f64> = (0..6).map(|i| 100.0 * 1.1_f64.powi(i)).collect();
        let cache_ohlc = ohlc(spy, vec![50.0; 6]);
        let tree = filter_tree(2);
        let parsed = parse(&tree).unwrap();
        let indicators = IndicatorCache::default();
        let settings = EngineSettings::default();

        let cache = PreCalcCache::load(&tree, &parsed, &cache_ohlc, &indicators, &settings, 10_000.0).unwrap();
        assert_eq!(cache.len(), 2);

        let spy = cache.get_series("spy").unwrap();
        assert_eq!(spy.start_index, 2);
        assert_eq!(spy.values.len(), 4);
        assert_abs_diff_eq!(cache.get_pre_calc_for_node_id("spy", 2).unwrap(), 21.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cache.get_pre_calc_for_node_id("tlt", 5).unwrap(), 0.0, epsilon = 1e-9);
        assert_eq!(cache.first_complete_index(), 2);
    }

    #[test]
    fn lookups_fail_outside_series() {
        let cache_ohlc = ohlc(vec![1.0, 2.0, 3.0, 4.0], vec![1.0; 4]);
        let tree = filter_tree(2);
        let parsed = parse(&tree).unwrap();
        let cache = PreCalcCache::load(
            &tree,
            &parsed,
            &cache_ohlc,
            &IndicatorCache::default(),
            &EngineSettings::default(),
            1_000.0,
        )
        .unwrap();

        assert!(matches!(
            cache.get_pre_calc_for_node_id("spy", 1),
            Err(TreeTraderError::LookbackNotAvailable { first_valid: 2, .. })
        ));
        assert!(matches!(
            cache.get_pre_calc_for_node_id("f", 3),
            Err(TreeTraderError::UnknownPreCalc { .. })
        ));
    }

    #[test]
    fn short_axis_is_insufficient() {
        let cache_ohlc = ohlc(vec![1.0, 2.0], vec![1.0, 1.0]);
        let tree = filter_tree(5);
        let parsed = parse(&tree).unwrap();
        let err = PreCalcCache::load(
            &tree,
            &parsed,
            &cache_ohlc,
            &IndicatorCache::default(),
            &EngineSettings::default(),
            1_000.0,
        )
        .unwrap_err();
        assert!(matches!(err, TreeTraderError::InsufficientData { .. }));
    }

    #[test]
    fn nesting_guard() {
        let inner = TradingBotNode::new(
            "inner",
            NodeKind::WeightInverseVolatility {
                window: 2,
                children: vec![TradingBotNode::asset("a", "SPY"), TradingBotNode::asset("b", "TLT")],
            },
        );
        let tree = TradingBotNode::new(
            "outer",
            NodeKind::WeightInverseVolatility {
                window: 2,
                children: vec![inner, TradingBotNode::asset("c", "TLT")],
            },
        );
        let parsed = parse(&tree).unwrap();
        let settings = EngineSettings {
            max_pre_calc_depth: 1,
            ..EngineSettings::default()
        };
        let cache_ohlc = ohlc(vec![1.0; 10], vec![1.0; 10]);
        let err = PreCalcCache::load(&tree, &parsed, &cache_ohlc, &IndicatorCache::default(), &settings, 1_000.0)
            .unwrap_err();
        assert!(matches!(
            err,
            TreeTraderError::PreCalcNestingTooDeep { depth: 2, max: 1, .. }
        ));
    }

    #[test]
    fn nested_levels_start_after_inner_series() {
        let spy: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let tlt: Vec<f64> = (0..12).map(|i| 50.0 + (i % 3) as f64).collect();
        let cache_ohlc = ohlc(spy, tlt);
        let inner = TradingBotNode::new(
            "inner",
            NodeKind::WeightInverseVolatility {
                window: 3,
                children: vec![TradingBotNode::asset("a", "SPY"), TradingBotNode::asset("b", "TLT")],
            },
        );
        let tree = TradingBotNode::new(
            "outer",
            NodeKind::WeightInverseVolatility {
                window: 3,
                children: vec![inner, TradingBotNode::asset("c", "TLT")],
            },
        );
        let parsed = parse(&tree).unwrap();
        let cache = PreCalcCache::load(
            &tree,
            &parsed,
            &cache_ohlc,
            &IndicatorCache::default(),
            &EngineSettings::default(),
            1_000.0,
        )
        .unwrap();

        assert_eq!(cache.get_series("a").unwrap().start_index, 3);
        assert_eq!(cache.get_series("inner").unwrap().start_index, 6);
        assert_eq!(cache.get_series("c").unwrap().start_index, 3);
        assert_eq!(cache.first_complete_index(), 6);
    }
}
