//! Strategy tree data structures.
//!
//! A strategy is a tree of [`TradingBotNode`]s deserialised from JSON. Every
//! node carries an `id`, an optional weight fraction and a `type`-tagged
//! [`NodeKind`] holding only the fields relevant to that kind:
//!
//! ```json
//! {"id": "root", "type": "root", "children": [
//!   {"id": "eq", "type": "weight-cash-equal", "children": [
//!     {"id": "a", "type": "asset", "ticker": "SPY"},
//!     {"id": "b", "type": "asset", "ticker": "TLT"}
//!   ]}
//! ]}
//! ```
//!
//! Unrecognised `type` tags deserialise to [`NodeKind::Unknown`] so newer tree
//! formats still load.

use crate::domain::indicator::IndicatorKey;
use crate::domain::precalc::PreCalcFunction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingBotNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Fraction>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeKind {
    Root {
        children: Vec<TradingBotNode>,
    },
    Group {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        children: Vec<TradingBotNode>,
    },
    WeightCashEqual {
        children: Vec<TradingBotNode>,
    },
    WeightCashSpecified {
        children: Vec<TradingBotNode>,
    },
    WeightInverseVolatility {
        window: usize,
        children: Vec<TradingBotNode>,
    },
    Filter {
        sort: SortBy,
        select: Selection,
        count: usize,
        children: Vec<TradingBotNode>,
    },
    IfThenElse {
        conditions: Conditions,
        then: Box<TradingBotNode>,
        #[serde(rename = "else")]
        otherwise: Box<TradingBotNode>,
    },
    Asset {
        ticker: String,
    },
    #[serde(other)]
    Unknown,
}

/// Statistic used to rank a filter's children.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SortBy {
    pub function: PreCalcFunction,
    pub window: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub mode: ConditionMode,
    pub items: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionMode {
    AllOf,
    AnyOf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub lhs: IndicatorKey,
    pub comparator: Comparator,
    pub rhs: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Lt,
    Eq,
}

/// Right-hand side of a condition: a bare number or a second indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Fixed(f64),
    Indicator(IndicatorKey),
}

impl TradingBotNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            weight: None,
            kind,
        }
    }

    pub fn with_weight(mut self, numerator: u32, denominator: u32) -> Self {
        self.weight = Some(Fraction::new(numerator, denominator));
        self
    }

    pub fn asset(id: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeKind::Asset {
                ticker: ticker.into(),
            },
        )
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Root { .. } => "root",
            NodeKind::Group { .. } => "group",
            NodeKind::WeightCashEqual { .. } => "weight-cash-equal",
            NodeKind::WeightCashSpecified { .. } => "weight-cash-specified",
            NodeKind::WeightInverseVolatility { .. } => "weight-inverse-volatility",
            NodeKind::Filter { .. } => "filter",
            NodeKind::IfThenElse { .. } => "if-then-else",
            NodeKind::Asset { .. } => "asset",
            NodeKind::Unknown => "unknown",
        }
    }

    /// Direct descendants, with then/else branches for `IfThenElse`.
    pub fn children(&self) -> Vec<&TradingBotNode> {
        match &self.kind {
            NodeKind::Root { children }
            | NodeKind::Group { children, .. }
            | NodeKind::WeightCashEqual { children }
            | NodeKind::WeightCashSpecified { children }
            | NodeKind::WeightInverseVolatility { children, .. }
            | NodeKind::Filter { children, .. } => children.iter().collect(),
            NodeKind::IfThenElse {
                then, otherwise, ..
            } => vec![then.as_ref(), otherwise.as_ref()],
            NodeKind::Asset { .. } | NodeKind::Unknown => Vec::new(),
        }
    }

    /// Depth-first search for the node with `id`.
    pub fn find(&self, id: &str) -> Option<&TradingBotNode> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(id))
    }

    /// Every ticker held by an `Asset` leaf in this subtree.
    pub fn asset_tickers(&self) -> BTreeSet<String> {
        let mut tickers = BTreeSet::new();
        self.collect_tickers(&mut tickers);
        tickers
    }

    fn collect_tickers(&self, out: &mut BTreeSet<String>) {
        if let NodeKind::Asset { ticker } = &self.kind {
            out.insert(ticker.clone());
        }
        for child in self.children() {
            child.collect_tickers(out);
        }
    }

    /// Whether this node ranks its children by a pre-calc statistic.
    pub fn owns_pre_calcs(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::WeightInverseVolatility { .. } | NodeKind::Filter { .. }
        )
    }
}
