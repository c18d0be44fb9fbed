//! # Main Calculator
//!
//! Runs every engine in dependency order and assembles a [`CalculationResult`].
//!
//! The calculation entry points are total: they never return an error and
//! never panic past this boundary. Malformed input degrades to zeros, and
//! anything that cannot be calculated at all yields
//! [`CalculationResult::error`], an all-zero result with `error: true`.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::MainCalculator;
//! use calc_core::document::Document;
//!
//! let calculator = MainCalculator::default();
//! let result = calculator.calculate(&Document::sample());
//!
//! assert!(!result.error);
//! assert!(result.profitability.is_profitable);
//! assert_eq!(result.metadata.data_version.len(), 8);
//! ```

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::errors::{CalcError, CalcResult};
use crate::formula::FormulaEngine;
use crate::numeric::Sanitize;

use super::analysis::{ComprehensiveAnalysis, Stages};
use super::breakeven::{BreakevenEngine, BreakevenResult};
use super::cost::{CostEngine, CostResult};
use super::investment::{InvestmentEngine, InvestmentResult};
use super::profitability::{ProfitabilityEngine, ProfitabilityMetrics, ProfitabilityResult};
use super::revenue::{RevenueEngine, RevenueResult};
use super::scenario::{ScenarioEngine, ScenarioResult};

/// Version string reported in [`Metadata::calculator_version`].
pub const CALCULATOR_VERSION: &str = "2.0.0";

/// Top-level sections a raw JSON document must carry.
pub const REQUIRED_SECTIONS: [&str; 4] = ["basic", "revenue", "cost", "investment"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// 8 hex digits derived from the document JSON; empty on error results
    pub data_version: String,
    pub calculator_version: String,
    /// Stage name → engine name
    pub modules: BTreeMap<String, String>,
}

/// Everything the pipeline produces for one document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub revenue: RevenueResult,
    pub cost: CostResult,
    pub investment: InvestmentResult,
    pub profitability: ProfitabilityResult,
    pub scenarios: ScenarioResult,
    pub breakeven: BreakevenResult,
    pub comprehensive: ComprehensiveAnalysis,
    pub metadata: Metadata,
}

impl CalculationResult {
    /// All-zero result tagged as failed.
    pub fn error(message: impl Into<String>) -> Self {
        CalculationResult {
            error: true,
            message: Some(message.into()),
            profitability: ProfitabilityResult {
                payback_years: f64::INFINITY,
                metrics: ProfitabilityMetrics {
                    break_even_point: f64::INFINITY,
                    operating_leverage: f64::INFINITY,
                    cash_recovery_period: f64::INFINITY,
                    ..Default::default()
                },
                ..Default::default()
            },
            comprehensive: ComprehensiveAnalysis::failed(),
            metadata: Metadata {
                data_version: String::new(),
                calculator_version: CALCULATOR_VERSION.to_string(),
                modules: BTreeMap::new(),
            },
            ..Default::default()
        }
    }
}

/// Orchestrator owning one instance of every engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MainCalculator {
    pub revenue: RevenueEngine,
    pub cost: CostEngine,
    pub investment: InvestmentEngine,
    pub profitability: ProfitabilityEngine,
    pub scenario: ScenarioEngine,
    pub breakeven: BreakevenEngine,
}

impl MainCalculator {
    pub fn new(
        revenue: RevenueEngine,
        cost: CostEngine,
        investment: InvestmentEngine,
        profitability: ProfitabilityEngine,
        scenario: ScenarioEngine,
        breakeven: BreakevenEngine,
    ) -> Self {
        MainCalculator {
            revenue,
            cost,
            investment,
            profitability,
            scenario,
            breakeven,
        }
    }

    /// Run the full pipeline. Never fails; see the module docs.
    pub fn calculate(&self, doc: &Document) -> CalculationResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(doc))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown calculation failure".to_string());
                tracing::error!(%message, "calculation aborted, returning error result");
                CalculationResult::error(CalcError::calculation_failed("pipeline", message).to_string())
            }
        }
    }

    /// Calculate a raw JSON document.
    ///
    /// The value must be an object carrying every section in
    /// [`REQUIRED_SECTIONS`] as an object; leaves inside are parsed leniently.
    pub fn try_calculate_json(&self, value: &Value) -> CalcResult<CalculationResult> {
        let object = value
            .as_object()
            .ok_or_else(|| CalcError::invalid_input("document", value.to_string(), "Document must be a JSON object"))?;

        let missing: Vec<&str> = REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|key| !object.get(*key).map(Value::is_object).unwrap_or(false))
            .collect();
        if !missing.is_empty() {
            return Err(CalcError::missing_field(missing.join(", ")));
        }

        let doc = Document::from_value(value.clone())?;
        Ok(self.calculate(&doc))
    }

    /// [`try_calculate_json`](Self::try_calculate_json) with failures folded
    /// into an error result.
    pub fn calculate_json(&self, value: &Value) -> CalculationResult {
        self.try_calculate_json(value).unwrap_or_else(|e| {
            tracing::error!(code = e.error_code(), "rejected document: {}", e);
            CalculationResult::error(e.to_string())
        })
    }

    fn run(&self, input: &Document) -> CalculationResult {
        let doc = input.sanitized();
        let formula = FormulaEngine::from_document(&doc);

        let revenue = self.revenue.calculate(&doc, &formula).sanitize();
        let cost = self.cost.calculate(&doc, &revenue, &formula).sanitize();
        let investment = self.investment.calculate(&doc).sanitize();
        let profitability = self.profitability.calculate(&revenue, &cost, &investment).sanitize();
        let scenarios = self.scenario.calculate(&doc, &revenue, &cost, &investment).sanitize();
        let breakeven = self.breakeven.calculate(&revenue, &cost, &investment).sanitize();

        let investment_risk = self.investment.assess_risk(&investment, &revenue, &profitability).sanitize();
        let comprehensive = ComprehensiveAnalysis::build(
            &Stages {
                revenue: &revenue,
                cost: &cost,
                investment: &investment,
                profitability: &profitability,
                scenarios: &scenarios,
                breakeven: &breakeven,
            },
            investment_risk,
        );

        tracing::debug!(
            revenue = revenue.total,
            cost = cost.total,
            profit = profitability.profit,
            score = comprehensive.health_score.score,
            "calculation complete"
        );

        CalculationResult {
            error: false,
            message: None,
            metadata: Metadata {
                data_version: data_version(input),
                calculator_version: CALCULATOR_VERSION.to_string(),
                modules: module_info(),
            },
            revenue,
            cost,
            investment,
            profitability,
            scenarios,
            breakeven,
            comprehensive,
        }
    }
}

fn module_info() -> BTreeMap<String, String> {
    [
        ("revenue", "RevenueEngine"),
        ("cost", "CostEngine"),
        ("investment", "InvestmentEngine"),
        ("profitability", "ProfitabilityEngine"),
        ("scenario", "ScenarioEngine"),
        ("breakeven", "BreakevenEngine"),
        ("analysis", "ComprehensiveAnalysis"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Deterministic 8-hex-digit fingerprint of the document JSON.
///
/// 32-bit `h = h * 31 + unit` over the UTF-16 code units, then the absolute
/// value as zero-padded hex.
pub fn data_version(doc: &Document) -> String {
    let json = serde_json::to_string(doc).unwrap_or_default();
    let hash = json
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit)));
    format!("{:08x}", i64::from(hash).abs())
}
