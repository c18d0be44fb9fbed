//! # Scenario Engine
//!
//! Optimistic, conservative and pessimistic projections. Each scenario scales
//! total revenue and variable cost by its percentage factors; fixed cost is
//! held constant:
//!
//! ```text
//! revenue'  = revenue.total × revenueFactor / 100
//! variable' = cost.variable.total × costFactor / 100
//! cost'     = cost.fixed.total + variable'
//! profit'   = revenue' − cost'
//! ```
//!
//! Margin, payback and ROI use the same guards as the profitability engine.
//! Zero or non-finite factors fall back to [`ScenarioEngine::defaults`].

use serde::{Deserialize, Serialize};

use crate::document::{Document, ScenarioFactors};
use crate::numeric::{
    finite_or_zero, margin_pct, payback_years, roi_pct, sentinel, serde_sentinel, Sanitize,
};

use super::cost::CostResult;
use super::investment::InvestmentResult;
use super::revenue::RevenueResult;
use super::RiskLevel;

/// Scenario calculator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenarioEngine {
    /// Factors used when the document's are zero or invalid
    pub defaults: ScenarioFactors,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioCost {
    pub fixed: f64,
    pub variable: f64,
    pub total: f64,
}

/// One projected scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    /// Applied revenue factor, percent
    pub revenue_factor: f64,
    /// Applied variable-cost factor, percent
    pub cost_factor: f64,
    pub revenue: f64,
    pub cost: ScenarioCost,
    pub profit: f64,
    pub margin: f64,
    #[serde(with = "serde_sentinel")]
    pub payback_years: f64,
    pub roi: f64,
}

impl Default for ScenarioOutcome {
    fn default() -> Self {
        ScenarioOutcome {
            revenue_factor: 0.0,
            cost_factor: 0.0,
            revenue: 0.0,
            cost: ScenarioCost::default(),
            profit: 0.0,
            margin: 0.0,
            payback_years: f64::INFINITY,
            roi: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Range {
    pub max: f64,
    pub min: f64,
    pub spread: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaybackRange {
    /// Optimistic payback
    #[serde(with = "serde_sentinel")]
    pub min: f64,
    /// Pessimistic payback; `None` when it never pays back
    pub max: Option<f64>,
}

impl Default for PaybackRange {
    fn default() -> Self {
        PaybackRange {
            min: f64::INFINITY,
            max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRisk {
    pub level: RiskLevel,
    pub factors: Vec<String>,
    /// (optimistic − pessimistic profit) / |conservative profit|
    pub profit_volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioComparison {
    pub profit_range: Range,
    pub margin_range: Range,
    pub payback_range: PaybackRange,
    pub risk_assessment: ScenarioRisk,
    pub recommendations: Vec<String>,
}

/// Revenue or total cost moved by a fixed percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityCase {
    pub name: String,
    pub profit: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub optimistic: ScenarioOutcome,
    pub conservative: ScenarioOutcome,
    pub pessimistic: ScenarioOutcome,
    pub comparison: ScenarioComparison,
    pub sensitivity: Vec<SensitivityCase>,
}

impl Sanitize for ScenarioOutcome {
    fn sanitize(self) -> Self {
        ScenarioOutcome {
            revenue_factor: self.revenue_factor.sanitize(),
            cost_factor: self.cost_factor.sanitize(),
            revenue: self.revenue.sanitize(),
            cost: ScenarioCost {
                fixed: self.cost.fixed.sanitize(),
                variable: self.cost.variable.sanitize(),
                total: self.cost.total.sanitize(),
            },
            profit: self.profit.sanitize(),
            margin: self.margin.sanitize(),
            payback_years: sentinel(self.payback_years),
            roi: self.roi.sanitize(),
        }
    }
}

impl Sanitize for SensitivityCase {
    fn sanitize(mut self) -> Self {
        self.profit = finite_or_zero(self.profit);
        self.margin = finite_or_zero(self.margin);
        self
    }
}

impl Sanitize for ScenarioResult {
    fn sanitize(self) -> Self {
        let mut comparison = self.comparison;
        for range in [&mut comparison.profit_range, &mut comparison.margin_range] {
            range.max = finite_or_zero(range.max);
            range.min = finite_or_zero(range.min);
            range.spread = finite_or_zero(range.spread);
        }
        comparison.payback_range.min = sentinel(comparison.payback_range.min);
        comparison.payback_range.max = comparison.payback_range.max.filter(|v| v.is_finite());
        comparison.risk_assessment.profit_volatility = finite_or_zero(comparison.risk_assessment.profit_volatility);

        ScenarioResult {
            optimistic: self.optimistic.sanitize(),
            conservative: self.conservative.sanitize(),
            pessimistic: self.pessimistic.sanitize(),
            comparison,
            sensitivity: self.sensitivity.sanitize(),
        }
    }
}

/// Shared inputs of every scenario.
struct Base {
    revenue: f64,
    fixed: f64,
    variable: f64,
    investment: f64,
}

impl Base {
    fn project(&self, revenue_factor: f64, cost_factor: f64) -> ScenarioOutcome {
        let revenue = finite_or_zero(self.revenue * revenue_factor / 100.0);
        let variable = finite_or_zero(self.variable * cost_factor / 100.0);
        let total = finite_or_zero(self.fixed + variable);
        let profit = finite_or_zero(revenue - total);

        ScenarioOutcome {
            revenue_factor,
            cost_factor,
            revenue,
            cost: ScenarioCost {
                fixed: self.fixed,
                variable,
                total,
            },
            profit,
            margin: margin_pct(profit, revenue),
            payback_years: payback_years(self.investment, profit),
            roi: roi_pct(profit, self.investment),
        }
    }
}

impl ScenarioEngine {
    pub fn new(defaults: ScenarioFactors) -> Self {
        ScenarioEngine { defaults }
    }

    pub fn calculate(
        &self,
        doc: &Document,
        revenue: &RevenueResult,
        cost: &CostResult,
        investment: &InvestmentResult,
    ) -> ScenarioResult {
        let factors = doc.scenario.resolved_against(&self.defaults);
        let base = Base {
            revenue: finite_or_zero(revenue.total),
            fixed: finite_or_zero(cost.fixed.total),
            variable: finite_or_zero(cost.variable.total),
            investment: finite_or_zero(investment.total),
        };

        let optimistic = base.project(factors.optimistic_revenue_factor, factors.optimistic_cost_factor);
        let conservative = base.project(factors.conservative_revenue_factor, factors.conservative_cost_factor);
        let pessimistic = base.project(factors.pessimistic_revenue_factor, factors.pessimistic_cost_factor);

        let comparison = compare(&optimistic, &conservative, &pessimistic);
        tracing::debug!(risk = %comparison.risk_assessment.level, "scenarios calculated");

        ScenarioResult {
            sensitivity: sensitivity(revenue.total, cost.total),
            optimistic,
            conservative,
            pessimistic,
            comparison,
        }
    }
}

fn compare(optimistic: &ScenarioOutcome, conservative: &ScenarioOutcome, pessimistic: &ScenarioOutcome) -> ScenarioComparison {
    ScenarioComparison {
        profit_range: Range {
            max: optimistic.profit,
            min: pessimistic.profit,
            spread: optimistic.profit - pessimistic.profit,
        },
        margin_range: Range {
            max: optimistic.margin,
            min: pessimistic.margin,
            spread: optimistic.margin - pessimistic.margin,
        },
        payback_range: PaybackRange {
            min: optimistic.payback_years,
            max: Some(pessimistic.payback_years).filter(|v| v.is_finite()),
        },
        risk_assessment: assess_risk(optimistic, conservative, pessimistic),
        recommendations: recommendations(optimistic, conservative, pessimistic),
    }
}

/// High when the conservative case loses money, medium when the profit
/// spread exceeds twice the conservative profit, otherwise low.
fn assess_risk(optimistic: &ScenarioOutcome, conservative: &ScenarioOutcome, pessimistic: &ScenarioOutcome) -> ScenarioRisk {
    let mut factors = Vec::new();

    let base = if conservative.profit == 0.0 { 1.0 } else { conservative.profit.abs() };
    let volatility = finite_or_zero((optimistic.profit - pessimistic.profit) / base);

    let level = if conservative.profit <= 0.0 {
        factors.push("保守情景下出现亏损".to_string());
        RiskLevel::High
    } else if volatility > 2.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if pessimistic.profit < 0.0 && pessimistic.profit.abs() > optimistic.profit {
        factors.push("最坏情景亏损严重".to_string());
    }
    if volatility > 2.0 {
        factors.push("盈利波动性较大".to_string());
    }
    if conservative.payback_years > 5.0 || pessimistic.payback_years.is_infinite() {
        factors.push("回本周期不稳定".to_string());
    }

    ScenarioRisk {
        level,
        factors,
        profit_volatility: volatility,
    }
}

fn recommendations(optimistic: &ScenarioOutcome, conservative: &ScenarioOutcome, pessimistic: &ScenarioOutcome) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();

    if conservative.profit > 0.0 && pessimistic.profit > 0.0 {
        out.push("各情景下均可盈利，投资风险较低");
        out.push("建议制定积极的发展策略");
    } else if conservative.profit > 0.0 {
        out.push("保守情景下可盈利，但需要防范下行风险");
        out.push("建议建立风险应对机制");
    } else {
        out.push("投资风险较高，需要重新评估商业模式");
        out.push("建议优化成本结构或延迟投资");
    }

    if optimistic.payback_years < 3.0 {
        out.push("乐观情景下回报快速，可考虑加快投资进度");
    }
    if pessimistic.margin < 0.0 {
        out.push("制定应急预案，准备额外资金缓冲");
    }

    out.into_iter().map(String::from).collect()
}

fn sensitivity(revenue_total: f64, cost_total: f64) -> Vec<SensitivityCase> {
    let rev = finite_or_zero(revenue_total);
    let cost = finite_or_zero(cost_total);
    [
        ("收入+10%", rev * 1.1, cost),
        ("收入-10%", rev * 0.9, cost),
        ("成本+10%", rev, cost * 1.1),
        ("成本-10%", rev, cost * 0.9),
    ]
    .iter()
    .map(|&(name, r, c)| {
        let profit = finite_or_zero(r - c);
        SensitivityCase {
            name: name.to_string(),
            profit,
            margin: margin_pct(profit, r),
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::cost::{FixedCosts, VariableCosts};

    fn stage(rev: f64, fixed: f64, variable: f64, invested: f64) -> (RevenueResult, CostResult, InvestmentResult) {
        let revenue = RevenueResult {
            total: rev,
            ..Default::default()
        };
        let cost = CostResult {
            fixed: FixedCosts {
                total: fixed,
                ..Default::default()
            },
            variable: VariableCosts {
                total: variable,
                ..Default::default()
            },
            total: fixed + variable,
            ..Default::default()
        };
        let investment = InvestmentResult {
            total: invested,
            ..Default::default()
        };
        (revenue, cost, investment)
    }

    fn run(doc: &Document, rev: f64, fixed: f64, variable: f64, invested: f64) -> ScenarioResult {
        let (r, c, i) = stage(rev, fixed, variable, invested);
        ScenarioEngine::default().calculate(doc, &r, &c, &i)
    }

    #[test]
    fn test_default_factors() {
        let result = run(&Document::default(), 1_000_000.0, 400_000.0, 200_000.0, 600_000.0);

        let o = &result.optimistic;
        assert!((o.revenue - 1_200_000.0).abs() < 1e-6);
        assert!((o.cost.variable - 190_000.0).abs() < 1e-6);
        assert!((o.cost.total - 590_000.0).abs() < 1e-6);
        assert!((o.profit - 610_000.0).abs() < 1e-6);

        let c = &result.conservative;
        assert!((c.revenue - 900_000.0).abs() < 1e-6);
        assert!((c.cost.total - 610_000.0).abs() < 1e-6);

        let p = &result.pessimistic;
        assert!((p.revenue - 800_000.0).abs() < 1e-6);
        assert!((p.cost.total - 620_000.0).abs() < 1e-6);
        assert!((p.payback_years - 600_000.0 / 180_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_cost_held_constant() {
        let result = run(&Document::default(), 1_000.0, 300.0, 100.0, 0.0);
        for outcome in [&result.optimistic, &result.conservative, &result.pessimistic] {
            assert_eq!(outcome.cost.fixed, 300.0);
        }
    }

    #[test]
    fn test_document_factors_and_fallback() {
        let mut doc = Document::default();
        doc.scenario.optimistic_revenue_factor = 150.0;
        doc.scenario.pessimistic_cost_factor = 0.0;
        let result = run(&doc, 1_000.0, 0.0, 100.0, 0.0);
        assert!((result.optimistic.revenue - 1_500.0).abs() < 1e-9);
        assert_eq!(result.pessimistic.cost_factor, 110.0);
    }

    #[test]
    fn test_low_risk_when_all_profitable() {
        let result = run(&Document::default(), 1_000_000.0, 300_000.0, 100_000.0, 500_000.0);
        let risk = &result.comparison.risk_assessment;
        assert_eq!(risk.level, RiskLevel::Low);
        assert_eq!(result.comparison.recommendations[0], "各情景下均可盈利，投资风险较低");
        assert!(result.comparison.payback_range.max.is_some());
    }

    #[test]
    fn test_high_risk_when_conservative_loses() {
        let result = run(&Document::default(), 1_000.0, 950.0, 0.0, 500.0);
        let comparison = &result.comparison;
        assert_eq!(comparison.risk_assessment.level, RiskLevel::High);
        assert!(comparison.risk_assessment.factors.contains(&"保守情景下出现亏损".to_string()));
        assert_eq!(comparison.payback_range.max, None);
        assert!(comparison.recommendations.contains(&"制定应急预案，准备额外资金缓冲".to_string()));
    }

    #[test]
    fn test_medium_risk_on_volatility() {
        // conservative profit 50, spread 400 / 50 = 8
        let result = run(&Document::default(), 1_000.0, 850.0, 0.0, 0.0);
        assert!(result.conservative.profit > 0.0);
        assert_eq!(result.comparison.risk_assessment.level, RiskLevel::Medium);
        assert!(result.comparison.risk_assessment.profit_volatility > 2.0);
    }

    #[test]
    fn test_zero_revenue_scenarios() {
        let result = run(&Document::default(), 0.0, 100.0, 0.0, 100.0);
        for outcome in [&result.optimistic, &result.conservative, &result.pessimistic] {
            assert_eq!(outcome.margin, 0.0);
            assert_eq!(outcome.payback_years, f64::INFINITY);
        }
    }

    #[test]
    fn test_sensitivity_cases() {
        let result = run(&Document::default(), 1_000.0, 800.0, 0.0, 0.0);
        assert_eq!(result.sensitivity.len(), 4);
        assert!((result.sensitivity[1].profit - 100.0).abs() < 1e-9);
        assert!((result.sensitivity[3].profit - 280.0).abs() < 1e-9);
    }
}
