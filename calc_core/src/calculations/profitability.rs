//! # Profitability Engine
//!
//! Profit, margins and payback from the revenue, cost and investment stages.
//!
//! ## Guards
//!
//! - Every percentage of revenue is exactly `0.0` when the revenue magnitude
//!   is below `min_revenue_magnitude` (1.0 by default).
//! - `payback_years` is `f64::INFINITY` unless both profit and investment are
//!   positive; then it is `investment / profit`.
//! - `breakEvenPoint`, `operatingLeverage` and `cashRecoveryPeriod` use
//!   `f64::INFINITY` when they are undefined.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::{
//!     cost::CostResult, investment::InvestmentResult, profitability::ProfitabilityEngine,
//!     revenue::RevenueResult,
//! };
//!
//! let revenue = RevenueResult { total: 1_000_000.0, ..Default::default() };
//! let cost = CostResult { total: 800_000.0, ..Default::default() };
//! let investment = InvestmentResult { total: 500_000.0, ..Default::default() };
//!
//! let result = ProfitabilityEngine::default().calculate(&revenue, &cost, &investment);
//! assert_eq!(result.profit, 200_000.0);
//! assert_eq!(result.margin, 20.0);
//! assert_eq!(result.payback_years, 2.5);
//! ```

use serde::{Deserialize, Serialize};

use crate::numeric::{
    finite_or_zero, margin_pct_with, payback_years, roi_pct, safe_div, sentinel, serde_sentinel, Sanitize,
    MIN_REVENUE_MAGNITUDE,
};

use super::cost::CostResult;
use super::investment::InvestmentResult;
use super::revenue::RevenueResult;

/// Margin bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfitLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Marginal,
    #[default]
    Loss,
}

impl ProfitLevel {
    /// ≥20 excellent, ≥15 good, ≥10 fair, ≥5 poor, >0 marginal, else loss.
    pub fn from_margin(margin: f64) -> Self {
        if margin >= 20.0 {
            ProfitLevel::Excellent
        } else if margin >= 15.0 {
            ProfitLevel::Good
        } else if margin >= 10.0 {
            ProfitLevel::Fair
        } else if margin >= 5.0 {
            ProfitLevel::Poor
        } else if margin > 0.0 {
            ProfitLevel::Marginal
        } else {
            ProfitLevel::Loss
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProfitLevel::Excellent => "优秀",
            ProfitLevel::Good => "良好",
            ProfitLevel::Fair => "一般",
            ProfitLevel::Poor => "较差",
            ProfitLevel::Marginal => "微利",
            ProfitLevel::Loss => "亏损",
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            ProfitLevel::Excellent => "盈利能力很强，可考虑扩大规模",
            ProfitLevel::Good => "盈利水平健康，保持现有策略",
            ProfitLevel::Fair => "盈利能力中等，需要优化运营",
            ProfitLevel::Poor => "盈利能力偏低，需要改进成本结构",
            ProfitLevel::Marginal => "微利状态，急需优化或重新评估",
            ProfitLevel::Loss => "当前亏损，需要重大调整",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitabilityMetrics {
    pub gross_profit: f64,
    pub gross_margin: f64,
    pub net_margin: f64,
    #[serde(rename = "annualROI")]
    pub annual_roi: f64,
    pub asset_turnover: f64,
    /// Revenue at which fixed cost is covered by contribution margin
    #[serde(with = "serde_sentinel")]
    pub break_even_point: f64,
    #[serde(with = "serde_sentinel")]
    pub operating_leverage: f64,
    /// Years to recover investment from profit plus fixed cost
    #[serde(with = "serde_sentinel")]
    pub cash_recovery_period: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitabilityResult {
    pub profit: f64,
    pub margin: f64,
    #[serde(with = "serde_sentinel")]
    pub payback_years: f64,
    pub roi: f64,
    pub gross_margin: f64,
    pub monthly_cash_flow: f64,
    pub break_even_revenue: f64,
    pub is_profitable: bool,
    pub profit_level: ProfitLevel,
    pub metrics: ProfitabilityMetrics,
}

impl Sanitize for ProfitabilityMetrics {
    fn sanitize(self) -> Self {
        ProfitabilityMetrics {
            gross_profit: self.gross_profit.sanitize(),
            gross_margin: self.gross_margin.sanitize(),
            net_margin: self.net_margin.sanitize(),
            annual_roi: self.annual_roi.sanitize(),
            asset_turnover: self.asset_turnover.sanitize(),
            break_even_point: sentinel(self.break_even_point),
            operating_leverage: sentinel(self.operating_leverage),
            cash_recovery_period: sentinel(self.cash_recovery_period),
        }
    }
}

impl Sanitize for ProfitabilityResult {
    fn sanitize(self) -> Self {
        ProfitabilityResult {
            profit: self.profit.sanitize(),
            margin: self.margin.sanitize(),
            payback_years: sentinel(self.payback_years),
            roi: self.roi.sanitize(),
            gross_margin: self.gross_margin.sanitize(),
            monthly_cash_flow: self.monthly_cash_flow.sanitize(),
            break_even_revenue: self.break_even_revenue.sanitize(),
            is_profitable: self.is_profitable,
            profit_level: self.profit_level,
            metrics: self.metrics.sanitize(),
        }
    }
}

/// One what-if case of [`ProfitabilityEngine::sensitivity_analysis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIf {
    pub name: String,
    pub profit: f64,
    pub margin: f64,
    #[serde(with = "serde_sentinel")]
    pub payback_years: f64,
    pub roi: f64,
    pub profit_level: ProfitLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendChanges {
    /// Percent change in profit
    pub profit: f64,
    /// Margin change in percentage points
    pub margin: f64,
    /// ROI change in percentage points
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysis {
    pub trend: Trend,
    pub changes: Option<TrendChanges>,
    pub recommendations: Vec<String>,
}

/// Profitability calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitabilityEngine {
    /// Revenue magnitudes below this force every margin to 0
    pub min_revenue_magnitude: f64,
}

impl Default for ProfitabilityEngine {
    fn default() -> Self {
        ProfitabilityEngine {
            min_revenue_magnitude: MIN_REVENUE_MAGNITUDE,
        }
    }
}

impl ProfitabilityEngine {
    pub fn calculate(&self, revenue: &RevenueResult, cost: &CostResult, investment: &InvestmentResult) -> ProfitabilityResult {
        let rev = finite_or_zero(revenue.total);
        let cost_total = finite_or_zero(cost.total);
        let invested = finite_or_zero(investment.total);

        let profit = finite_or_zero(rev - cost_total);
        let margin = self.margin(profit, rev);
        if rev.abs() < self.min_revenue_magnitude && profit != 0.0 {
            tracing::warn!(revenue = rev, "total revenue is effectively zero, margins forced to 0");
        }

        let metrics = self.metrics(revenue, cost, investment, profit);

        ProfitabilityResult {
            profit,
            margin,
            payback_years: payback_years(invested, profit),
            roi: roi_pct(profit, invested),
            gross_margin: metrics.gross_margin,
            monthly_cash_flow: profit / 12.0,
            break_even_revenue: cost_total,
            is_profitable: profit > 0.0,
            profit_level: ProfitLevel::from_margin(margin),
            metrics,
        }
    }

    fn margin(&self, part: f64, revenue: f64) -> f64 {
        margin_pct_with(part, revenue, self.min_revenue_magnitude)
    }

    fn metrics(
        &self,
        revenue: &RevenueResult,
        cost: &CostResult,
        investment: &InvestmentResult,
        profit: f64,
    ) -> ProfitabilityMetrics {
        let rev = finite_or_zero(revenue.total);
        let fixed = finite_or_zero(cost.fixed.total);
        let variable = finite_or_zero(cost.variable.total);
        let cogs = finite_or_zero(cost.cogs.total);
        let invested = finite_or_zero(investment.total);

        let gross_profit = finite_or_zero(rev - cogs);
        let cash_recovery_period = if profit > 0.0 {
            sentinel(invested / (profit + fixed))
        } else {
            f64::INFINITY
        };

        ProfitabilityMetrics {
            gross_profit,
            gross_margin: self.margin(gross_profit, rev),
            net_margin: self.margin(profit, rev),
            annual_roi: roi_pct(profit, invested),
            asset_turnover: if invested > 0.0 { safe_div(rev, invested) } else { 0.0 },
            break_even_point: break_even_point(fixed, variable, rev),
            operating_leverage: operating_leverage(rev, variable, fixed),
            cash_recovery_period,
        }
    }

    /// Five what-if cases against total revenue and total cost.
    pub fn sensitivity_analysis(
        &self,
        revenue: &RevenueResult,
        cost: &CostResult,
        investment: &InvestmentResult,
    ) -> Vec<WhatIf> {
        let rev = finite_or_zero(revenue.total);
        let total = finite_or_zero(cost.total);
        let invested = finite_or_zero(investment.total);

        let cases = [
            ("收入+10%", rev * 1.1, total),
            ("收入-10%", rev * 0.9, total),
            ("成本+10%", rev, total * 1.1),
            ("成本-10%", rev, total * 0.9),
            ("收入+10%成本+5%", rev * 1.1, total * 1.05),
        ];

        cases
            .iter()
            .map(|&(name, r, c)| {
                let profit = finite_or_zero(r - c);
                let margin = self.margin(profit, r);
                WhatIf {
                    name: name.to_string(),
                    profit,
                    margin,
                    payback_years: payback_years(invested, profit),
                    roi: roi_pct(profit, invested),
                    profit_level: ProfitLevel::from_margin(margin),
                }
            })
            .collect()
    }

    /// Compare against a previous result. Without history the trend is stable.
    pub fn analyze_trend(&self, current: &ProfitabilityResult, previous: Option<&ProfitabilityResult>) -> TrendAnalysis {
        let Some(previous) = previous else {
            return TrendAnalysis {
                trend: Trend::Stable,
                changes: None,
                recommendations: vec!["建立历史数据对比基础".to_string()],
            };
        };

        let base = if previous.profit == 0.0 { 1.0 } else { previous.profit.abs() };
        let changes = TrendChanges {
            profit: finite_or_zero((current.profit - previous.profit) / base * 100.0),
            margin: finite_or_zero(current.margin - previous.margin),
            roi: finite_or_zero(current.roi - previous.roi),
        };

        let mut trend = Trend::Stable;
        let mut recommendations = Vec::new();
        if changes.profit > 10.0 {
            trend = Trend::Improving;
            recommendations.push("盈利持续增长，可考虑投资扩张".to_string());
        } else if changes.profit < -10.0 {
            trend = Trend::Declining;
            recommendations.push("盈利下滑，需要分析原因并采取措施".to_string());
        }
        if changes.margin > 2.0 {
            recommendations.push("利润率提升，运营效率改善".to_string());
        } else if changes.margin < -2.0 {
            recommendations.push("利润率下降，需要控制成本或提高收入".to_string());
        }

        TrendAnalysis {
            trend,
            changes: Some(changes),
            recommendations,
        }
    }
}

/// `fixed / (1 − variable / revenue)`, or Infinity when revenue or the
/// contribution-margin rate is not positive.
pub fn break_even_point(fixed: f64, variable: f64, revenue: f64) -> f64 {
    if revenue <= 0.0 {
        return f64::INFINITY;
    }
    let contribution_rate = 1.0 - variable / revenue;
    if contribution_rate <= 0.0 {
        return f64::INFINITY;
    }
    sentinel(fixed / contribution_rate)
}

/// Contribution margin over operating income, Infinity when operating
/// income is not positive.
pub fn operating_leverage(revenue: f64, variable: f64, fixed: f64) -> f64 {
    let contribution = revenue - variable;
    let operating_income = contribution - fixed;
    if operating_income <= 0.0 {
        return f64::INFINITY;
    }
    sentinel(contribution / operating_income)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::cost::{CogsBreakdown, FixedCosts, VariableCosts};

    fn inputs(rev: f64, fixed: f64, variable: f64, cogs: f64, invested: f64) -> (RevenueResult, CostResult, InvestmentResult) {
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
            cogs: CogsBreakdown {
                total: cogs,
                ..Default::default()
            },
            total: fixed + variable + cogs,
            custom_items: Vec::new(),
        };
        let investment = InvestmentResult {
            total: invested,
            ..Default::default()
        };
        (revenue, cost, investment)
    }

    fn run(rev: f64, fixed: f64, variable: f64, cogs: f64, invested: f64) -> ProfitabilityResult {
        let (r, c, i) = inputs(rev, fixed, variable, cogs, invested);
        ProfitabilityEngine::default().calculate(&r, &c, &i)
    }

    #[test]
    fn test_sample_like_figures() {
        let result = run(4_751_100.0, 2_139_513.0, 288_300.0, 1_012_875.0, 2_700_000.0);
        assert!((result.profit - 1_310_412.0).abs() < 1e-6);
        assert!((result.payback_years - 2_700_000.0 / 1_310_412.0).abs() < 1e-12);
        assert_eq!(result.profit_level, ProfitLevel::Excellent);
        assert!(result.is_profitable);
        assert!((result.gross_margin - (4_751_100.0 - 1_012_875.0) / 4_751_100.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_revenue_guard() {
        let result = run(0.0, 100_000.0, 0.0, 0.0, 50_000.0);
        assert_eq!(result.margin, 0.0);
        assert_eq!(result.gross_margin, 0.0);
        assert_eq!(result.metrics.net_margin, 0.0);
        assert_eq!(result.payback_years, f64::INFINITY);
        assert_eq!(result.profit_level, ProfitLevel::Loss);

        let tiny = run(0.5, 10.0, 0.0, 0.0, 0.0);
        assert_eq!(tiny.margin, 0.0);
    }

    #[test]
    fn test_payback_sentinel() {
        assert_eq!(run(100.0, 50.0, 0.0, 0.0, 0.0).payback_years, f64::INFINITY);
        assert_eq!(run(100.0, 100.0, 0.0, 0.0, 500.0).payback_years, f64::INFINITY);
        assert_eq!(run(100.0, 50.0, 0.0, 0.0, 500.0).payback_years, 10.0);
    }

    #[test]
    fn test_roi() {
        assert_eq!(run(100.0, 50.0, 0.0, 0.0, 500.0).roi, 10.0);
        assert_eq!(run(100.0, 50.0, 0.0, 0.0, 0.0).roi, 0.0);
    }

    #[test]
    fn test_advanced_metrics() {
        let result = run(1_000_000.0, 300_000.0, 200_000.0, 100_000.0, 800_000.0);
        let m = &result.metrics;
        // contribution-margin rate 0.8
        assert!((m.break_even_point - 375_000.0).abs() < 1e-6);
        // contribution 800k, operating income 500k
        assert!((m.operating_leverage - 1.6).abs() < 1e-12);
        assert!((m.asset_turnover - 1.25).abs() < 1e-12);
        // 800k / (400k profit + 300k fixed)
        assert!((m.cash_recovery_period - 800_000.0 / 700_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_metric_sentinels() {
        assert_eq!(break_even_point(100.0, 10.0, 0.0), f64::INFINITY);
        assert_eq!(break_even_point(100.0, 200.0, 100.0), f64::INFINITY);
        assert_eq!(operating_leverage(100.0, 50.0, 60.0), f64::INFINITY);
        let loss = run(100.0, 200.0, 0.0, 0.0, 100.0);
        assert_eq!(loss.metrics.cash_recovery_period, f64::INFINITY);
    }

    #[test]
    fn test_profit_levels() {
        assert_eq!(ProfitLevel::from_margin(20.0), ProfitLevel::Excellent);
        assert_eq!(ProfitLevel::from_margin(15.0), ProfitLevel::Good);
        assert_eq!(ProfitLevel::from_margin(10.0), ProfitLevel::Fair);
        assert_eq!(ProfitLevel::from_margin(5.0), ProfitLevel::Poor);
        assert_eq!(ProfitLevel::from_margin(0.1), ProfitLevel::Marginal);
        assert_eq!(ProfitLevel::from_margin(0.0), ProfitLevel::Loss);
        assert_eq!(ProfitLevel::Fair.label(), "一般");
    }

    #[test]
    fn test_sensitivity_analysis() {
        let (r, c, i) = inputs(1_000.0, 800.0, 0.0, 0.0, 1_000.0);
        let cases = ProfitabilityEngine::default().sensitivity_analysis(&r, &c, &i);
        assert_eq!(cases.len(), 5);
        assert_eq!(cases[0].name, "收入+10%");
        assert!((cases[0].profit - 300.0).abs() < 1e-9);
        assert!((cases[2].profit - 120.0).abs() < 1e-9);
        assert!((cases[4].profit - 260.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_analysis() {
        let engine = ProfitabilityEngine::default();
        let current = run(1_000.0, 700.0, 0.0, 0.0, 0.0);
        let previous = run(1_000.0, 800.0, 0.0, 0.0, 0.0);

        let none = engine.analyze_trend(&current, None);
        assert_eq!(none.trend, Trend::Stable);
        assert!(none.changes.is_none());

        let up = engine.analyze_trend(&current, Some(&previous));
        assert_eq!(up.trend, Trend::Improving);
        let changes = up.changes.unwrap();
        assert!((changes.profit - 50.0).abs() < 1e-9);
        assert!((changes.margin - 10.0).abs() < 1e-9);

        let down = engine.analyze_trend(&previous, Some(&current));
        assert_eq!(down.trend, Trend::Declining);
    }

    #[test]
    fn test_sentinels_serialize_as_null() {
        let result = run(0.0, 100.0, 0.0, 0.0, 100.0);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["paybackYears"].is_null());
        assert!(json["metrics"]["breakEvenPoint"].is_null());
        let back: ProfitabilityResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.payback_years, f64::INFINITY);
        assert_eq!(back.metrics.operating_leverage, f64::INFINITY);
        assert_eq!(back.profit, result.profit);
    }
}
