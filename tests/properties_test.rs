//! Property tests for allocation and bookkeeping invariants.

mod common;

use common::*;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use treetrader::domain::backtest::EngineSettings;
use treetrader::domain::indicator_cache::IndicatorCache;
use treetrader::domain::interpreter::{Allocation, Interpreter};
use treetrader::domain::node::{NodeKind, TradingBotNode};
use treetrader::domain::ohlc_cache::OhlcCache;
use treetrader::domain::precalc_cache::PreCalcCache;
use treetrader::domain::rebalancer::Rebalancer;

const TICKERS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

fn allocation_sum(allocation: &Allocation) -> f64 {
    allocation.values().flatten().sum()
}

fn evaluate(tree: &TradingBotNode) -> Allocation {
    let tradeable: BTreeSet<String> = tree.asset_tickers();
    let indicators = IndicatorCache::from_series(HashMap::new());
    let pre_calcs = PreCalcCache::from_series(HashMap::new());
    let settings = EngineSettings::default();
    Interpreter::new(&tradeable, &indicators, &pre_calcs, &settings)
        .evaluate(tree, 0)
        .unwrap()
}

proptest! {
    #[test]
    fn equal_weights_always_sum_to_full(picks in prop::collection::vec(0usize..4, 1..12)) {
        let children = picks
            .iter()
            .enumerate()
            .map(|(i, t)| TradingBotNode::asset(format!("leaf-{i}"), TICKERS[*t]))
            .collect();
        let tree = TradingBotNode::new(
            "root",
            NodeKind::Root {
                children: vec![TradingBotNode::new("eq", NodeKind::WeightCashEqual { children })],
            },
        );

        let allocation = evaluate(&tree);
        prop_assert!((allocation_sum(&allocation) - 100.0).abs() < 1e-9);
        prop_assert_eq!(evaluate(&tree), allocation);
    }

    #[test]
    fn specified_weights_fill_the_parent_share(numerators in prop::collection::vec(0u32..10, 1..5)) {
        let denominator = numerators.iter().sum::<u32>().max(1);
        let children = numerators
            .iter()
            .enumerate()
            .map(|(i, n)| TradingBotNode::asset(format!("leaf-{i}"), TICKERS[i % TICKERS.len()]).with_weight(*n, denominator))
            .collect();
        // half of the book goes to the specified node, half to EEE
        let tree = TradingBotNode::new(
            "root",
            NodeKind::Root {
                children: vec![TradingBotNode::new(
                    "eq",
                    NodeKind::WeightCashEqual {
                        children: vec![
                            TradingBotNode::new("spec", NodeKind::WeightCashSpecified { children }),
                            TradingBotNode::asset("sibling", "EEE"),
                        ],
                    },
                )],
            },
        );

        let allocation = evaluate(&tree);
        let specified: f64 = TICKERS
            .iter()
            .filter_map(|t| allocation.get(*t).copied().flatten())
            .sum();
        let expected = if numerators.iter().any(|n| *n > 0) { 50.0 } else { 0.0 };
        prop_assert!((specified - expected).abs() < 1e-9);
        prop_assert_eq!(allocation.get("EEE").copied().flatten(), Some(50.0));
        prop_assert!(allocation.values().flatten().all(|p| *p >= 0.0));
    }

    #[test]
    fn rebalancer_balance_is_cash_plus_holdings(
        prices in prop::collection::vec((1.0f64..500.0, 1.0f64..500.0), 2..20),
        splits in prop::collection::vec(0.0f64..=100.0, 2..20),
    ) {
        let days = prices.len().min(splits.len());
        let dates = weekdays(date(2024, 1, 1), days);
        let series = HashMap::from([
            ("AAA".to_string(), prices[..days].iter().map(|p| Some(p.0)).collect()),
            ("BBB".to_string(), prices[..days].iter().map(|p| Some(p.1)).collect()),
        ]);
        let ohlc = OhlcCache::from_series(dates, series, 0).unwrap();
        let mut rebalancer = Rebalancer::new(&ohlc, 10_000.0);

        for (index, split) in splits[..days].iter().enumerate() {
            let allocation: Allocation = [
                ("AAA".to_string(), Some(*split)),
                ("BBB".to_string(), Some(100.0 - split)),
            ]
            .into_iter()
            .collect();
            let outcome = rebalancer.rebalance(index, &allocation).unwrap();

            let invested: f64 = rebalancer.holdings().values().map(|h| h.value).sum();
            let tolerance = 1e-9 * outcome.balance.max(1.0);
            prop_assert!(outcome.balance > 0.0);
            prop_assert!((rebalancer.cash() + invested - outcome.balance).abs() < tolerance);
            // fully invested every day
            prop_assert!(rebalancer.cash().abs() < tolerance);
        }
    }
}
