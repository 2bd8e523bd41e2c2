//! Scenario configuration loading from TOML.
//!
//! The binary runs one backtest described by `config.toml`: where the
//! fixtures live, where to write the report, and the full simulation
//! request. Deserializes into strongly-typed structs; cross-field request
//! rules are checked by `SimulationRequest::validate` before the run.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::request::SimulationRequest;

/// Top-level scenario configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scenario: ScenarioConfig,
    pub request: SimulationRequest,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    /// JSON file of historical matches.
    pub fixtures_file: String,
    /// Where to write the result report; omit to skip writing.
    #[serde(default)]
    pub report_file: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
