//! # Financial Calculations
//!
//! One engine per stage of the pipeline, each a plain struct with a pure
//! `calculate` method:
//!
//! ```text
//! Document ─┬─> RevenueEngine ──> CostEngine ─┐
//!           └─> InvestmentEngine ─────────────┼─> ProfitabilityEngine
//!                                             ├─> ScenarioEngine
//!                                             └─> BreakevenEngine ──> analysis
//! ```
//!
//! [`MainCalculator`] owns one instance of every engine, runs them in the
//! order above and sanitizes each stage's output before the next stage sees
//! it.
//!
//! ## Available Engines
//!
//! - [`revenue`] - annual revenue per business line plus custom modules
//! - [`cost`] - fixed, variable and margin-derived (COGS) cost
//! - [`investment`] - capital outlay, ROI and investment risk
//! - [`profitability`] - profit, margins, payback and advanced metrics
//! - [`scenario`] - optimistic / conservative / pessimistic projections
//! - [`breakeven`] - break-even, target margins, safety margin and stress tests
//! - [`analysis`] - health score, risk indicators and investment guidance
//! - [`calculator`] - the orchestrator

pub mod analysis;
pub mod breakeven;
pub mod calculator;
pub mod cost;
pub mod investment;
pub mod profitability;
pub mod revenue;
pub mod scenario;

use serde::{Deserialize, Serialize};

pub use analysis::ComprehensiveAnalysis;
pub use breakeven::{BreakevenEngine, BreakevenResult};
pub use calculator::{CalculationResult, MainCalculator, Metadata};
pub use cost::{CostEngine, CostResult};
pub use investment::{InvestmentEngine, InvestmentResult};
pub use profitability::{ProfitLevel, ProfitabilityEngine, ProfitabilityResult};
pub use revenue::{RevenueEngine, RevenueResult};
pub use scenario::{ScenarioEngine, ScenarioResult};

/// Qualitative risk bucket shared by every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "低风险",
            RiskLevel::Medium => "中等风险",
            RiskLevel::High => "高风险",
            RiskLevel::Critical => "严重风险",
        }
    }

    /// Raise to `other` if it is more severe.
    pub fn escalate(self, other: RiskLevel) -> RiskLevel {
        self.max(other)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert_eq!(RiskLevel::Low.escalate(RiskLevel::Medium), RiskLevel::Medium);
        assert_eq!(RiskLevel::High.escalate(RiskLevel::Medium), RiskLevel::High);
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
        assert_eq!(RiskLevel::Medium.to_string(), "medium");
    }
}
