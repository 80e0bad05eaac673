//! Strategy tree interpreter.
//!
//! Evaluates a tree at one axis index and produces an [`Allocation`]: the
//! percentage of the balance each tradeable ticker should hold.
//!
//! # Evaluation Semantics
//!
//! Descent carries a weight (starting at 100) and a [`WeightMode`]:
//!
//! - `root` / `group`: pass the weight through
//! - `weight-cash-equal`: split the weight equally across children
//! - `weight-cash-specified`: each child takes `numerator/denominator` of the
//!   weight from its own fraction; a child without one contributes nothing
//! - `weight-inverse-volatility`: split by the inverse of each child's
//!   pre-calculated return volatility
//! - `filter`: rank children by their pre-calc value, keep the top or bottom
//!   `count`, split equally among the kept ones
//! - `if-then-else`: route the whole weight to `then` or `else`
//! - `asset`: emit `ticker -> weight`
//!
//! Weights reaching one ticker through several branches are summed.

use crate::domain::backtest::EngineSettings;
use crate::domain::error::TreeTraderError;
use crate::domain::indicator::IndicatorKey;
use crate::domain::indicator_cache::IndicatorCache;
use crate::domain::node::{Comparator, Condition, ConditionMode, NodeKind, Operand, Selection, TradingBotNode};
use crate::domain::precalc_cache::PreCalcCache;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Ticker to percentage of balance; `None` means hold nothing.
pub type Allocation = BTreeMap<String, Option<f64>>;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    Equal,
    Specified,
}

pub struct Interpreter<'a> {
    tradeable: &'a BTreeSet<String>,
    indicators: &'a IndicatorCache,
    pre_calcs: &'a PreCalcCache,
    settings: &'a EngineSettings,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        tradeable: &'a BTreeSet<String>,
        indicators: &'a IndicatorCache,
        pre_calcs: &'a PreCalcCache,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            tradeable,
            indicators,
            pre_calcs,
            settings,
        }
    }

    /// Allocation covering every tradeable ticker; unreached ones are `None`.
    pub fn evaluate(&self, tree: &TradingBotNode, index: usize) -> Result<Allocation, TreeTraderError> {
        let reached = self.evaluate_node(tree, index, WeightMode::Equal, 100.0)?;
        let mut allocation: Allocation = self.tradeable.iter().map(|t| (t.clone(), None)).collect();
        allocation.extend(reached);
        Ok(allocation)
    }

    /// Allocation of the tickers `node` actually routes weight to.
    pub fn evaluate_node(
        &self,
        node: &TradingBotNode,
        index: usize,
        mode: WeightMode,
        weight: f64,
    ) -> Result<Allocation, TreeTraderError> {
        let mut evaluation = Evaluation {
            interpreter: self,
            index,
            memo: HashMap::new(),
            sums: BTreeMap::new(),
        };
        evaluation.visit(node, mode, weight)?;
        Ok(evaluation
            .sums
            .into_iter()
            .map(|(ticker, w)| (ticker, Some(w)))
            .collect())
    }
}

/// State of one evaluation at a fixed index.
struct Evaluation<'i, 'a> {
    interpreter: &'i Interpreter<'a>,
    index: usize,
    memo: HashMap<IndicatorKey, f64>,
    sums: BTreeMap<String, f64>,
}

impl Evaluation<'_, '_> {
    fn visit(&mut self, node: &TradingBotNode, mode: WeightMode, parent_weight: f64) -> Result<(), TreeTraderError> {
        let weight = match mode {
            WeightMode::Equal => parent_weight,
            WeightMode::Specified => match node.weight {
                Some(fraction) => fraction.ratio() * parent_weight,
                None => {
                    tracing::warn!(node_id = %node.id, "no weight under weight-cash-specified, skipping");
                    return Ok(());
                }
            },
        };

        match &node.kind {
            NodeKind::Root { children } | NodeKind::Group { children, .. } => {
                for child in children {
                    self.visit(child, WeightMode::Equal, weight)?;
                }
            }
            NodeKind::WeightCashEqual { children } => {
                let share = weight / children.len().max(1) as f64;
                for child in children {
                    self.visit(child, WeightMode::Equal, share)?;
                }
            }
            NodeKind::WeightCashSpecified { children } => {
                for child in children {
                    self.visit(child, WeightMode::Specified, weight)?;
                }
            }
            NodeKind::WeightInverseVolatility { children, .. } => {
                let floor = self.interpreter.settings.inverse_volatility_floor;
                let mut inverse = Vec::with_capacity(children.len());
                for child in children {
                    let vol = self.pre_calc(&child.id)?;
                    let vol = if vol > 0.0 && vol.is_finite() { vol } else { floor };
                    inverse.push(1.0 / vol);
                }
                let total: f64 = inverse.iter().sum();
                for (child, inv) in children.iter().zip(inverse) {
                    self.visit(child, WeightMode::Equal, inv / total * weight)?;
                }
            }
            NodeKind::Filter {
                select,
                count,
                children,
                ..
            } => {
                let mut ranked = Vec::with_capacity(children.len());
                for child in children {
                    ranked.push((self.pre_calc(&child.id)?, child));
                }
                ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

                let kept = (*count).min(ranked.len());
                let selected = match select {
                    Selection::Bottom => &ranked[..kept],
                    Selection::Top => &ranked[ranked.len() - kept..],
                };
                if kept > 0 {
                    let share = weight / kept as f64;
                    for (_, child) in selected {
                        self.visit(child, WeightMode::Equal, share)?;
                    }
                }
            }
            NodeKind::IfThenElse {
                conditions,
                then,
                otherwise,
            } => {
                let passed = match conditions.mode {
                    ConditionMode::AllOf => {
                        let mut all = true;
                        for condition in &conditions.items {
                            if !self.condition(condition)? {
                                all = false;
                                break;
                            }
                        }
                        all
                    }
                    ConditionMode::AnyOf => {
                        let mut any = false;
                        for condition in &conditions.items {
                            if self.condition(condition)? {
                                any = true;
                                break;
                            }
                        }
                        any
                    }
                };
                let branch = if passed { then } else { otherwise };
                self.visit(branch, WeightMode::Equal, weight)?;
            }
            NodeKind::Asset { ticker } => {
                *self.sums.entry(ticker.clone()).or_insert(0.0) += weight;
            }
            NodeKind::Unknown => {
                tracing::warn!(node_id = %node.id, "unknown node type, contributes nothing");
            }
        }
        Ok(())
    }

    fn condition(&mut self, condition: &Condition) -> Result<bool, TreeTraderError> {
        let lhs = self.indicator(&condition.lhs)?;
        let rhs = match &condition.rhs {
            Operand::Fixed(value) => *value,
            Operand::Indicator(key) => self.indicator(key)?,
        };
        Ok(match condition.comparator {
            Comparator::Gt => lhs > rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Eq => (lhs - rhs).abs() < EPSILON,
        })
    }

    fn indicator(&mut self, key: &IndicatorKey) -> Result<f64, TreeTraderError> {
        if let Some(value) = self.memo.get(key) {
            return Ok(*value);
        }
        let value = self.interpreter.indicators.get_indicator_value(key, self.index)?;
        self.memo.insert(key.clone(), value);
        Ok(value)
    }

    fn pre_calc(&self, node_id: &str) -> Result<f64, TreeTraderError> {
        self.interpreter
            .pre_calcs
            .get_pre_calc_for_node_id(node_id, self.index)
    }
}
