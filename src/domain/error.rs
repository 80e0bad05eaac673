//! Domain error types.

/// Top-level error type for treetrader.
#[derive(Debug, thiserror::Error)]
pub enum TreeTraderError {
    #[error("data source error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{function}: window must be > 0")]
    InvalidWindow { function: String },

    #[error("{function}: not enough data (have {have}, need {need})")]
    NotEnoughData {
        function: String,
        have: usize,
        need: usize,
    },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("invalid weight on node {node_id}: {reason}")]
    InvalidWeight { node_id: String, reason: String },

    #[error("invalid node {node_id}: {reason}")]
    InvalidNode { node_id: String, reason: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("pre-calc nesting too deep at node {node_id}: depth {depth}, max {max}")]
    PreCalcNestingTooDeep {
        node_id: String,
        depth: usize,
        max: usize,
    },

    #[error("ticker {ticker} was never registered for loading")]
    TickerNotLoaded { ticker: String },

    #[error("unknown indicator {key}")]
    UnknownIndicator { key: String },

    #[error("no pre-calc for node {node_id}")]
    UnknownPreCalc { node_id: String },

    #[error("{key} has no value at index {index} (first valid index {first_valid})")]
    LookbackNotAvailable {
        key: String,
        index: usize,
        first_valid: usize,
    },

    #[error("node {node_id} not found in strategy tree")]
    NodeNotFound { node_id: String },

    #[error("backtest cancelled at index {index}")]
    Cancelled { index: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TreeTraderError> for std::process::ExitCode {
    fn from(err: &TreeTraderError) -> Self {
        let code: u8 = match err {
            TreeTraderError::Io(_) => 1,
            TreeTraderError::ConfigParse { .. }
            | TreeTraderError::ConfigMissing { .. }
            | TreeTraderError::ConfigInvalid { .. } => 2,
            TreeTraderError::Data { .. } => 3,
            TreeTraderError::Json(_)
            | TreeTraderError::InvalidWindow { .. }
            | TreeTraderError::UnknownFunction { .. }
            | TreeTraderError::InvalidWeight { .. }
            | TreeTraderError::InvalidNode { .. }
            | TreeTraderError::PreCalcNestingTooDeep { .. } => 4,
            TreeTraderError::NotEnoughData { .. } | TreeTraderError::InsufficientData { .. } => 5,
            TreeTraderError::TickerNotLoaded { .. }
            | TreeTraderError::UnknownIndicator { .. }
            | TreeTraderError::UnknownPreCalc { .. }
            | TreeTraderError::LookbackNotAvailable { .. }
            | TreeTraderError::NodeNotFound { .. }
            | TreeTraderError::Cancelled { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
