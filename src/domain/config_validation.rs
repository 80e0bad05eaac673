//! Configuration and request validation.
//!
//! Validates engine config fields and backtest requests before a run starts.

use crate::domain::backtest::{BacktestRequest, EngineSettings};
use crate::domain::error::TreeTraderError;
use crate::ports::config_port::ConfigPort;

pub const MIN_STARTING_BALANCE: u64 = 1000;

const ENGINE: &str = "engine";

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), TreeTraderError> {
    validate_inverse_volatility_floor(config)?;
    validate_max_pre_calc_depth(config)?;
    validate_risk_free_rate(config)?;
    Ok(())
}

/// Validated engine settings, with defaults for absent keys.
pub fn build_engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, TreeTraderError> {
    validate_engine_config(config)?;
    let defaults = EngineSettings::default();
    Ok(EngineSettings {
        inverse_volatility_floor: config.get_double(
            ENGINE,
            "inverse_volatility_floor",
            defaults.inverse_volatility_floor,
        ),
        max_pre_calc_depth: config.get_usize(ENGINE, "max_pre_calc_depth", defaults.max_pre_calc_depth),
        risk_free_rate: config.get_double(ENGINE, "risk_free_rate", defaults.risk_free_rate),
    })
}

fn validate_inverse_volatility_floor(config: &dyn ConfigPort) -> Result<(), TreeTraderError> {
    let value = config.get_double(
        ENGINE,
        "inverse_volatility_floor",
        EngineSettings::default().inverse_volatility_floor,
    );
    if value <= 0.0 || !value.is_finite() {
        return Err(TreeTraderError::ConfigInvalid {
            section: ENGINE.to_string(),
            key: "inverse_volatility_floor".to_string(),
            reason: "inverse_volatility_floor must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_max_pre_calc_depth(config: &dyn ConfigPort) -> Result<(), TreeTraderError> {
    let value = config.get_usize(ENGINE, "max_pre_calc_depth", EngineSettings::default().max_pre_calc_depth);
    if value == 0 {
        return Err(TreeTraderError::ConfigInvalid {
            section: ENGINE.to_string(),
            key: "max_pre_calc_depth".to_string(),
            reason: "max_pre_calc_depth must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TreeTraderError> {
    let value = config.get_double(ENGINE, "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(TreeTraderError::ConfigInvalid {
            section: ENGINE.to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

pub fn validate_request(request: &BacktestRequest) -> Result<(), TreeTraderError> {
    if request.starting_balance < MIN_STARTING_BALANCE {
        return Err(TreeTraderError::ConfigInvalid {
            section: "request".to_string(),
            key: "starting_balance".to_string(),
            reason: format!("starting_balance must be at least {}", MIN_STARTING_BALANCE),
        });
    }
    if request.start_date >= request.end_date {
        return Err(TreeTraderError::ConfigInvalid {
            section: "request".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(())
}
