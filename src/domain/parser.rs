//! Strategy tree parser.
//!
//! A single depth-first pass over the tree that collects everything the
//! caches need before the first index is evaluated: which tickers to load and
//! over which window, which indicators to compute, and which nodes need a
//! pre-calculated return history.

use crate::domain::error::TreeTraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::node::{NodeKind, Operand, TradingBotNode};
use crate::domain::precalc::PreCalcFunction;
use std::collections::{BTreeSet, HashSet};

/// A statistic over the simulated return history of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct PreCalc {
    pub node_id: String,
    pub function: PreCalcFunction,
    pub window: usize,
    /// 1 for a node with no pre-calc-owning ancestors.
    pub depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStrategy {
    /// Every ticker referenced anywhere in the tree.
    pub assets: BTreeSet<String>,
    /// Tickers held by `Asset` leaves.
    pub tradeable_assets: BTreeSet<String>,
    /// Tickers whose history must reach back over the full lookback window.
    pub lookback_assets: BTreeSet<String>,
    pub indicators: Vec<IndicatorKey>,
    pub pre_calcs: Vec<PreCalc>,
    pub largest_indicator_window: usize,
    pub largest_pre_calc_window: usize,
    pub max_pre_calc_depth: usize,
}

impl ParsedStrategy {
    pub fn required_lookback(&self) -> usize {
        self.largest_indicator_window + self.largest_pre_calc_window * self.max_pre_calc_depth
    }

    /// Tradeable tickers that no lookback calculation depends on.
    pub fn tradeable_only_assets(&self) -> BTreeSet<String> {
        self.tradeable_assets
            .difference(&self.lookback_assets)
            .cloned()
            .collect()
    }

    pub fn pre_calc(&self, node_id: &str) -> Option<&PreCalc> {
        self.pre_calcs.iter().find(|p| p.node_id == node_id)
    }
}

pub fn parse(tree: &TradingBotNode) -> Result<ParsedStrategy, TreeTraderError> {
    let mut parser = Parser::default();
    parser.visit(tree, 0)?;
    let mut parsed = parser.out;
    parsed.indicators.sort();
    Ok(parsed)
}

#[derive(Default)]
struct Parser {
    out: ParsedStrategy,
    seen_indicators: HashSet<IndicatorKey>,
    seen_pre_calcs: HashSet<String>,
}

impl Parser {
    fn visit(&mut self, node: &TradingBotNode, pre_calc_depth: usize) -> Result<(), TreeTraderError> {
        if node.weight.is_some_and(|w| w.denominator == 0) {
            return Err(TreeTraderError::InvalidWeight {
                node_id: node.id.clone(),
                reason: "denominator must be > 0".into(),
            });
        }

        match &node.kind {
            NodeKind::Root { children }
            | NodeKind::Group { children, .. }
            | NodeKind::WeightCashEqual { children }
            | NodeKind::WeightCashSpecified { children } => {
                for child in children {
                    self.visit(child, pre_calc_depth)?;
                }
            }
            NodeKind::WeightInverseVolatility { window, children } => {
                self.register_pre_calcs(
                    node,
                    children,
                    PreCalcFunction::StandardDeviationReturn,
                    *window,
                    pre_calc_depth + 1,
                )?;
                for child in children {
                    self.visit(child, pre_calc_depth + 1)?;
                }
            }
            NodeKind::Filter {
                sort,
                count,
                children,
                ..
            } => {
                if *count == 0 {
                    return Err(TreeTraderError::InvalidNode {
                        node_id: node.id.clone(),
                        reason: "filter count must be > 0".into(),
                    });
                }
                self.register_pre_calcs(node, children, sort.function, sort.window, pre_calc_depth + 1)?;
                for child in children {
                    self.visit(child, pre_calc_depth + 1)?;
                }
            }
            NodeKind::IfThenElse {
                conditions,
                then,
                otherwise,
            } => {
                for condition in &conditions.items {
                    self.register_indicator(&condition.lhs)?;
                    if let Operand::Indicator(rhs) = &condition.rhs {
                        self.register_indicator(rhs)?;
                    }
                }
                self.visit(then, pre_calc_depth)?;
                self.visit(otherwise, pre_calc_depth)?;
            }
            NodeKind::Asset { ticker } => {
                self.out.assets.insert(ticker.clone());
                self.out.tradeable_assets.insert(ticker.clone());
                if pre_calc_depth > 0 {
                    self.out.lookback_assets.insert(ticker.clone());
                }
            }
            NodeKind::Unknown => {
                tracing::warn!(node_id = %node.id, "unknown node type, skipping");
            }
        }
        Ok(())
    }

    fn register_indicator(&mut self, key: &IndicatorKey) -> Result<(), TreeTraderError> {
        if key.window == 0 {
            return Err(TreeTraderError::InvalidWindow {
                function: key.function.to_string(),
            });
        }
        self.out.assets.insert(key.ticker.clone());
        self.out.lookback_assets.insert(key.ticker.clone());
        self.out.largest_indicator_window = self.out.largest_indicator_window.max(key.window);
        if self.seen_indicators.insert(key.clone()) {
            self.out.indicators.push(key.clone());
        }
        Ok(())
    }

    fn register_pre_calcs(
        &mut self,
        owner: &TradingBotNode,
        children: &[TradingBotNode],
        function: PreCalcFunction,
        window: usize,
        depth: usize,
    ) -> Result<(), TreeTraderError> {
        if window == 0 {
            return Err(TreeTraderError::InvalidWindow {
                function: format!("{} on node {}", function, owner.id),
            });
        }
        self.out.largest_pre_calc_window = self.out.largest_pre_calc_window.max(window);
        self.out.max_pre_calc_depth = self.out.max_pre_calc_depth.max(depth);
        for child in children {
            if self.seen_pre_calcs.insert(child.id.clone()) {
                self.out.pre_calcs.push(PreCalc {
                    node_id: child.id.clone(),
                    function,
                    window,
                    depth,
                });
            } else {
                tracing::warn!(node_id = %child.id, "duplicate node id, pre-calc already registered");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorFunction;
    use crate::domain::node::{
        Comparator, Condition, ConditionMode, Conditions, Selection, SortBy,
    };

    fn cumret(ticker: &str, window: usize) -> IndicatorKey {
        IndicatorKey::new(ticker, IndicatorFunction::CumulativeReturn, window)
    }

    fn if_node(lhs: IndicatorKey, rhs: Operand) -> TradingBotNode {
        TradingBotNode::new(
            "if",
            NodeKind::IfThenElse {
                conditions: Conditions {
                    mode: ConditionMode::AllOf,
                    items: vec![Condition {
                        lhs,
                        comparator: Comparator::Gt,
                        rhs,
                    }],
                },
                then: Box::new(TradingBotNode::asset("t", "QQQ")),
                otherwise: Box::new(TradingBotNode::asset("e", "TLT")),
            },
        )
    }

    fn root(children: Vec<TradingBotNode>) -> TradingBotNode {
        TradingBotNode::new("root", NodeKind::Root { children })
    }

    #[test]
    fn collects_assets_and_indicators() {
        let tree = root(vec![if_node(cumret("SPY", 10), Operand::Indicator(cumret("SPY", 20)))]);
        let parsed = parse(&tree).unwrap();

        let assets: Vec<&str> = parsed.assets.iter().map(String::as_str).collect();
        assert_eq!(assets, vec!["QQQ", "SPY", "TLT"]);
        let tradeable: Vec<&str> = parsed.tradeable_assets.iter().map(String::as_str).collect();
        assert_eq!(tradeable, vec!["QQQ", "TLT"]);
        assert_eq!(parsed.indicators, vec![cumret("SPY", 10), cumret("SPY", 20)]);
        assert_eq!(parsed.largest_indicator_window, 20);
        assert!(parsed.pre_calcs.is_empty());
        assert_eq!(parsed.required_lookback(), 20);
    }

    #[test]
    fn fixed_rhs_registers_no_indicator() {
        let tree = root(vec![if_node(cumret("SPY", 10), Operand::Fixed(5.0))]);
        let parsed = parse(&tree).unwrap();
        assert_eq!(parsed.indicators, vec![cumret("SPY", 10)]);
    }

    #[test]
    fn indicators_are_deduplicated() {
        let tree = root(vec![
            if_node(cumret("SPY", 10), Operand::Indicator(cumret("SPY", 10))),
            if_node(cumret("SPY", 10), Operand::Fixed(1.0)),
        ]);
        let parsed = parse(&tree).unwrap();
        assert_eq!(parsed.indicators.len(), 1);
    }

    #[test]
    fn inverse_volatility_registers_child_pre_calcs() {
        let tree = root(vec![TradingBotNode::new(
            "wiv",
            NodeKind::WeightInverseVolatility {
                window: 30,
                children: vec![
                    TradingBotNode::asset("a", "SPY"),
                    TradingBotNode::asset("b", "TLT"),
                ],
            },
        )]);
        let parsed = parse(&tree).unwrap();

        assert_eq!(parsed.pre_calcs.len(), 2);
        assert_eq!(parsed.pre_calcs[0].node_id, "a");
        assert_eq!(
            parsed.pre_calcs[0].function,
            PreCalcFunction::StandardDeviationReturn
        );
        assert_eq!(parsed.pre_calcs[0].window, 30);
        assert_eq!(parsed.pre_calcs[0].depth, 1);
        assert_eq!(parsed.largest_pre_calc_window, 30);
        assert_eq!(parsed.max_pre_calc_depth, 1);
        assert!(parsed.lookback_assets.contains("SPY"));
        assert!(parsed.tradeable_only_assets().is_empty());
        assert_eq!(parsed.required_lookback(), 30);
    }

    #[test]
    fn nested_filter_increases_depth() {
        let inner = TradingBotNode::new(
            "inner",
            NodeKind::Filter {
                sort: SortBy {
                    function: PreCalcFunction::CumulativeReturn,
                    window: 5,
                },
                select: Selection::Top,
                count: 1,
                children: vec![
                    TradingBotNode::asset("a", "SPY"),
                    TradingBotNode::asset("b", "QQQ"),
                ],
            },
        );
        let tree = root(vec![TradingBotNode::new(
            "outer",
            NodeKind::WeightInverseVolatility {
                window: 10,
                children: vec![inner, TradingBotNode::asset("c", "TLT")],
            },
        )]);
        let parsed = parse(&tree).unwrap();

        assert_eq!(parsed.max_pre_calc_depth, 2);
        assert_eq!(parsed.pre_calc("a").unwrap().depth, 2);
        assert_eq!(parsed.pre_calc("inner").unwrap().depth, 1);
        assert_eq!(parsed.required_lookback(), 20);
    }

    #[test]
    fn tradeable_only_assets_exclude_lookback() {
        let tree = root(vec![
            if_node(cumret("QQQ", 10), Operand::Fixed(0.0)),
            TradingBotNode::asset("x", "GLD"),
        ]);
        let parsed = parse(&tree).unwrap();
        let only: Vec<String> = parsed.tradeable_only_assets().into_iter().collect();
        assert_eq!(only, vec!["GLD", "TLT"]);
    }

    #[test]
    fn zero_denominator_is_rejected() {
        let tree = root(vec![TradingBotNode::new(
            "spec",
            NodeKind::WeightCashSpecified {
                children: vec![TradingBotNode::asset("a", "SPY").with_weight(1, 0)],
            },
        )]);
        let err = parse(&tree).unwrap_err();
        assert!(matches!(err, TreeTraderError::InvalidWeight { ref node_id, .. } if node_id == "a"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let tree = root(vec![if_node(cumret("SPY", 0), Operand::Fixed(0.0))]);
        assert!(matches!(
            parse(&tree),
            Err(TreeTraderError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn zero_filter_count_is_rejected() {
        let tree = root(vec![TradingBotNode::new(
            "f",
            NodeKind::Filter {
                sort: SortBy {
                    function: PreCalcFunction::MaxDrawdown,
                    window: 5,
                },
                select: Selection::Bottom,
                count: 0,
                children: vec![TradingBotNode::asset("a", "SPY")],
            },
        )]);
        assert!(matches!(
            parse(&tree),
            Err(TreeTraderError::InvalidNode { .. })
        ));
    }

    #[test]
    fn unknown_node_is_skipped() {
        let tree = root(vec![
            TradingBotNode::new("x", NodeKind::Unknown),
            TradingBotNode::asset("a", "SPY"),
        ]);
        let parsed = parse(&tree).unwrap();
        assert_eq!(parsed.tradeable_assets.len(), 1);
    }
}
