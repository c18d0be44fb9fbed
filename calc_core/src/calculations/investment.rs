//! # Investment Engine
//!
//! One-off capital outlay: fit-out (area × cost per ㎡), initial medical
//! equipment and custom investment items. Custom items are stored in units of
//! 10,000 currency and converted here.
//!
//! Also provides ROI analysis and a qualitative investment-risk assessment
//! used by the comprehensive analysis.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::numeric::{finite_or_zero, payback_years, roi_pct, safe_div, sentinel, serde_sentinel, Sanitize};

use super::profitability::ProfitabilityResult;
use super::revenue::RevenueResult;
use super::RiskLevel;

/// Multiplier from the stored custom-investment unit (万) to base currency.
pub const CUSTOM_INVESTMENT_UNIT: f64 = 10_000.0;

/// Investment calculator. Stateless.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InvestmentEngine;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentResult {
    pub fitout: f64,
    pub medical: f64,
    pub custom: f64,
    pub total: f64,
    /// Fit-out cost per ㎡ as entered
    pub fitout_per_sqm: f64,
    /// Custom items converted to base currency
    pub custom_items: Vec<InvestmentItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentItem {
    pub name: String,
    pub amount: f64,
}

impl Sanitize for InvestmentResult {
    fn sanitize(self) -> Self {
        let fitout = self.fitout.sanitize();
        let medical = self.medical.sanitize();
        let custom = self.custom.sanitize();
        InvestmentResult {
            fitout,
            medical,
            custom,
            total: finite_or_zero(fitout + medical + custom),
            fitout_per_sqm: self.fitout_per_sqm.sanitize(),
            custom_items: self
                .custom_items
                .into_iter()
                .map(|item| InvestmentItem {
                    amount: finite_or_zero(item.amount),
                    ..item
                })
                .collect(),
        }
    }
}

/// Return on a given investment at a given annual profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiAnalysis {
    #[serde(with = "serde_sentinel")]
    pub payback_years: f64,
    pub roi: f64,
    #[serde(rename = "monthlyROI")]
    pub monthly_roi: f64,
    #[serde(with = "serde_sentinel")]
    pub break_even_months: f64,
}

/// Qualitative investment risk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentRisk {
    pub level: RiskLevel,
    pub factors: Vec<String>,
    pub revenue_to_investment_ratio: f64,
    pub recommendations: Vec<String>,
}

impl Sanitize for InvestmentRisk {
    fn sanitize(mut self) -> Self {
        self.revenue_to_investment_ratio = finite_or_zero(self.revenue_to_investment_ratio);
        self
    }
}

impl InvestmentEngine {
    pub fn calculate(&self, doc: &Document) -> InvestmentResult {
        let inv = &doc.investment;
        let fitout = finite_or_zero(finite_or_zero(doc.basic.area_sqm) * finite_or_zero(inv.fitout_standard));
        let medical = finite_or_zero(inv.medical_initial);

        let custom_items: Vec<InvestmentItem> = inv
            .custom_investments
            .iter()
            .map(|item| InvestmentItem {
                name: item.name.clone(),
                amount: finite_or_zero(finite_or_zero(item.value) * CUSTOM_INVESTMENT_UNIT),
            })
            .collect();
        let custom = finite_or_zero(custom_items.iter().map(|i| i.amount).sum());

        let total = finite_or_zero(fitout + medical + custom);
        tracing::debug!(total, "investment calculated");

        InvestmentResult {
            fitout,
            medical,
            custom,
            total,
            fitout_per_sqm: finite_or_zero(inv.fitout_standard),
            custom_items,
        }
    }

    /// Payback, ROI and break-even months for `total` at `annual_profit`.
    pub fn analyze_roi(&self, total: f64, annual_profit: f64) -> RoiAnalysis {
        if total.is_nan() || total <= 0.0 {
            return RoiAnalysis {
                payback_years: f64::INFINITY,
                roi: 0.0,
                monthly_roi: 0.0,
                break_even_months: f64::INFINITY,
            };
        }
        let payback = payback_years(total, annual_profit);
        let roi = roi_pct(annual_profit, total);
        RoiAnalysis {
            payback_years: payback,
            roi,
            monthly_roi: roi / 12.0,
            break_even_months: sentinel(payback * 12.0),
        }
    }

    /// Risk from revenue/investment ratio, margin and payback period.
    pub fn assess_risk(
        &self,
        investment: &InvestmentResult,
        revenue: &RevenueResult,
        profitability: &ProfitabilityResult,
    ) -> InvestmentRisk {
        let ratio = safe_div(revenue.total, investment.total);
        let mut level = RiskLevel::Low;
        let mut factors = Vec::new();

        if ratio < 0.5 {
            level = RiskLevel::High;
            factors.push("收入相对投资规模偏低".to_string());
        } else if ratio < 1.0 {
            level = RiskLevel::Medium;
            factors.push("收入回报需要关注".to_string());
        }

        if profitability.margin < 5.0 {
            level = RiskLevel::High;
            factors.push("盈利能力偏低".to_string());
        } else if profitability.margin < 10.0 {
            level = level.escalate(RiskLevel::Medium);
            factors.push("盈利水平一般".to_string());
        }

        if profitability.payback_years > 5.0 {
            level = RiskLevel::High;
            factors.push("回本周期过长".to_string());
        } else if profitability.payback_years > 3.0 {
            level = level.escalate(RiskLevel::Medium);
            factors.push("回本周期较长".to_string());
        }

        InvestmentRisk {
            level,
            factors,
            revenue_to_investment_ratio: ratio,
            recommendations: risk_recommendations(level),
        }
    }
}

fn risk_recommendations(level: RiskLevel) -> Vec<String> {
    let lines: &[&str] = match level {
        RiskLevel::High | RiskLevel::Critical => &[
            "建议重新评估投资规模和预期收益",
            "考虑分阶段投资降低风险",
            "加强成本控制和收入优化",
        ],
        RiskLevel::Medium => &["关注关键指标变化", "制定风险应对预案"],
        RiskLevel::Low => &["投资风险较低，可考虑适当扩大规模"],
    };
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CustomInvestment;

    #[test]
    fn test_sample_investment() {
        let result = InvestmentEngine.calculate(&Document::sample());
        assert_eq!(result.fitout, 2_100_000.0);
        assert_eq!(result.medical, 600_000.0);
        assert_eq!(result.total, 2_700_000.0);
    }

    #[test]
    fn test_custom_investments_in_ten_thousands() {
        let mut doc = Document::default();
        doc.investment.custom_investments.push(CustomInvestment::new("设备", 12.5));
        doc.investment.custom_investments.push(CustomInvestment::new("押金", 3.0));
        let result = InvestmentEngine.calculate(&doc);
        assert_eq!(result.custom, 155_000.0);
        assert_eq!(result.custom_items[0].amount, 125_000.0);
        assert_eq!(result.total, 155_000.0);
    }

    #[test]
    fn test_analyze_roi() {
        let roi = InvestmentEngine.analyze_roi(1_000_000.0, 250_000.0);
        assert_eq!(roi.payback_years, 4.0);
        assert_eq!(roi.roi, 25.0);
        assert!((roi.monthly_roi - 25.0 / 12.0).abs() < 1e-12);
        assert_eq!(roi.break_even_months, 48.0);

        let loss = InvestmentEngine.analyze_roi(1_000_000.0, -1.0);
        assert_eq!(loss.payback_years, f64::INFINITY);
        assert_eq!(loss.break_even_months, f64::INFINITY);
        assert!(loss.roi < 0.0);

        let none = InvestmentEngine.analyze_roi(0.0, 100.0);
        assert_eq!(none.roi, 0.0);
        assert_eq!(none.payback_years, f64::INFINITY);
    }

    #[test]
    fn test_assess_risk_levels() {
        let investment = InvestmentResult {
            total: 1_000_000.0,
            ..Default::default()
        };
        let revenue = RevenueResult {
            total: 2_000_000.0,
            ..Default::default()
        };
        let healthy = ProfitabilityResult {
            margin: 25.0,
            payback_years: 2.0,
            ..Default::default()
        };
        let risk = InvestmentEngine.assess_risk(&investment, &revenue, &healthy);
        assert_eq!(risk.level, RiskLevel::Low);
        assert!(risk.factors.is_empty());
        assert_eq!(risk.revenue_to_investment_ratio, 2.0);

        let slow = ProfitabilityResult {
            margin: 8.0,
            payback_years: 4.0,
            ..Default::default()
        };
        let risk = InvestmentEngine.assess_risk(&investment, &revenue, &slow);
        assert_eq!(risk.level, RiskLevel::Medium);
        assert_eq!(risk.factors.len(), 2);

        let never = ProfitabilityResult {
            margin: -3.0,
            payback_years: f64::INFINITY,
            ..Default::default()
        };
        let risk = InvestmentEngine.assess_risk(&investment, &revenue, &never);
        assert_eq!(risk.level, RiskLevel::High);
        assert_eq!(risk.recommendations.len(), 3);
    }
}
