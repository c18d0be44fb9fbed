//! # Break-even Engine
//!
//! Break-even revenue, revenue required for target margins, safety margin,
//! risk tolerance, stress tests and a monthly (dynamic) break-even view.
//!
//! ## Target margins
//!
//! The variable cost rate is `(variable + COGS) / revenue` and is assumed to
//! stay constant as revenue moves. The revenue at which the margin reaches
//! `t` percent is then
//!
//! ```text
//! required = fixed / (1 − vcr − t/100)
//! ```
//!
//! or `Infinity` when the denominator is not positive. Without any revenue
//! the rate is unknown and all cost is treated as fixed.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::breakeven::{BreakevenEngine, BreakevenStatus};
//! use calc_core::calculations::{CostEngine, InvestmentEngine, RevenueEngine};
//! use calc_core::document::Document;
//! use calc_core::formula::FormulaEngine;
//!
//! let doc = Document::sample();
//! let formula = FormulaEngine::from_document(&doc);
//! let revenue = RevenueEngine.calculate(&doc, &formula);
//! let cost = CostEngine.calculate(&doc, &revenue, &formula);
//! let investment = InvestmentEngine.calculate(&doc);
//!
//! let result = BreakevenEngine::default().calculate(&revenue, &cost, &investment);
//! assert_eq!(result.basic.break_even_revenue, cost.total);
//! assert_eq!(result.basic.status, BreakevenStatus::Profitable);
//! ```

use serde::{Deserialize, Serialize};

use crate::numeric::{finite_or_zero, margin_pct, payback_years, safe_div, sentinel, serde_sentinel, Sanitize};

use super::cost::CostResult;
use super::investment::InvestmentResult;
use super::revenue::RevenueResult;
use super::RiskLevel;

/// Target margins analysed by default, percent.
pub const DEFAULT_TARGET_MARGINS: [f64; 4] = [5.0, 10.0, 15.0, 20.0];

/// Stress-test steps applied to cost and revenue by default, percent.
pub const DEFAULT_STRESS_STEPS: [f64; 2] = [5.0, 10.0];

/// Break-even calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakevenEngine {
    /// Margins (percent) for which the required revenue is computed
    pub target_margins: Vec<f64>,
    /// Stress percentages; the first one also drives the combined worst case
    pub stress_steps: Vec<f64>,
}

impl Default for BreakevenEngine {
    fn default() -> Self {
        BreakevenEngine {
            target_margins: DEFAULT_TARGET_MARGINS.to_vec(),
            stress_steps: DEFAULT_STRESS_STEPS.to_vec(),
        }
    }
}

// === Result types ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakevenStatus {
    Profitable,
    MarginallyProfitable,
    Breakeven,
    NearBreakeven,
    #[default]
    Loss,
}

impl BreakevenStatus {
    /// Bucket a margin percentage.
    pub fn from_margin(margin: f64) -> Self {
        if margin > 10.0 {
            BreakevenStatus::Profitable
        } else if margin > 5.0 {
            BreakevenStatus::MarginallyProfitable
        } else if margin > 0.0 {
            BreakevenStatus::Breakeven
        } else if margin > -5.0 {
            BreakevenStatus::NearBreakeven
        } else {
            BreakevenStatus::Loss
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BreakevenStatus::Profitable => "盈利良好",
            BreakevenStatus::MarginallyProfitable => "微利状态",
            BreakevenStatus::Breakeven => "刚好盈亏平衡",
            BreakevenStatus::NearBreakeven => "接近盈亏平衡",
            BreakevenStatus::Loss => "亏损状态",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicBreakeven {
    /// Equal to total cost
    pub break_even_revenue: f64,
    /// `max(0, cost − revenue)`
    pub revenue_gap: f64,
    pub revenue_gap_percent: f64,
    pub is_break_even: bool,
    pub status: BreakevenStatus,
    pub status_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Achieved,
    Easy,
    Moderate,
    Hard,
    #[default]
    Extreme,
}

impl Difficulty {
    /// Bucket the revenue increase (percent) needed to reach a target.
    pub fn from_increase(increase_pct: f64) -> Self {
        if increase_pct.is_nan() || increase_pct > 100.0 {
            Difficulty::Extreme
        } else if increase_pct <= 0.0 {
            Difficulty::Achieved
        } else if increase_pct <= 20.0 {
            Difficulty::Easy
        } else if increase_pct <= 50.0 {
            Difficulty::Moderate
        } else {
            Difficulty::Hard
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Achieved => "已达到",
            Difficulty::Easy => "容易",
            Difficulty::Moderate => "中等",
            Difficulty::Hard => "困难",
            Difficulty::Extreme => "极困难",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequirement {
    pub target_margin: f64,
    #[serde(with = "serde_sentinel")]
    pub required_revenue: f64,
    pub required_profit: f64,
    pub revenue_gap: f64,
    /// Revenue increase needed, percent of current revenue
    #[serde(with = "serde_sentinel")]
    pub increase_percent: f64,
    pub is_achievable: bool,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub feasible: bool,
    pub feasible_count: usize,
    pub total_targets: usize,
    pub lowest_target: Option<TargetRequirement>,
    pub highest_target: Option<TargetRequirement>,
    pub avg_required_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAnalysis {
    pub targets: Vec<TargetRequirement>,
    pub summary: TargetSummary,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyMargin {
    pub safety_margin: f64,
    pub safety_margin_rate: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTolerance {
    pub max_cost_increase: f64,
    pub max_cost_increase_percent: f64,
    pub max_revenue_decrease: f64,
    pub max_revenue_decrease_percent: f64,
    /// Five-step label driven by the revenue decrease percentage
    pub level: String,
    pub is_high_risk: bool,
}

/// Revenue and total cost moved by fixed percentages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressCase {
    pub name: String,
    pub revenue_change_pct: f64,
    pub cost_change_pct: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
    pub is_profitable: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivitySummary {
    /// Margin points lost per 1% cost increase
    pub cost_elasticity: f64,
    /// Margin points lost per 1% revenue decrease
    pub revenue_elasticity: f64,
    pub worst_case_margin: f64,
    /// 0-100, higher is riskier
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressTest {
    pub cases: Vec<StressCase>,
    pub combined_worst_case: StressCase,
    pub summary: SensitivitySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicBreakeven {
    /// Monthly revenue needed to cover monthly fixed cost
    pub monthly_breakeven: f64,
    /// Years to recoup the investment at the current profit
    #[serde(with = "serde_sentinel")]
    pub time_to_breakeven: f64,
    /// Revenue growth (percent) needed to reach break-even; 0 when profitable
    pub required_growth: f64,
    pub monthly_profit: f64,
    pub months_to_breakeven: Option<f64>,
}

impl Default for DynamicBreakeven {
    fn default() -> Self {
        DynamicBreakeven {
            monthly_breakeven: 0.0,
            time_to_breakeven: f64::INFINITY,
            required_growth: 0.0,
            monthly_profit: 0.0,
            months_to_breakeven: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakevenResult {
    pub current_margin: f64,
    pub basic: BasicBreakeven,
    pub target_analysis: TargetAnalysis,
    pub safety_margin: SafetyMargin,
    pub risk_tolerance: RiskTolerance,
    pub sensitivity: StressTest,
    pub dynamic_analysis: DynamicBreakeven,
    pub recommendations: Vec<String>,
}

// === Sanitization ===

impl Sanitize for TargetRequirement {
    fn sanitize(self) -> Self {
        TargetRequirement {
            target_margin: self.target_margin.sanitize(),
            required_revenue: sentinel(self.required_revenue),
            required_profit: self.required_profit.sanitize(),
            revenue_gap: self.revenue_gap.sanitize(),
            increase_percent: sentinel(self.increase_percent),
            ..self
        }
    }
}

impl Sanitize for StressCase {
    fn sanitize(self) -> Self {
        StressCase {
            revenue_change_pct: self.revenue_change_pct.sanitize(),
            cost_change_pct: self.cost_change_pct.sanitize(),
            revenue: self.revenue.sanitize(),
            cost: self.cost.sanitize(),
            profit: self.profit.sanitize(),
            margin: self.margin.sanitize(),
            ..self
        }
    }
}

impl Sanitize for BreakevenResult {
    fn sanitize(self) -> Self {
        let mut r = self;
        r.current_margin = finite_or_zero(r.current_margin);

        r.basic.break_even_revenue = finite_or_zero(r.basic.break_even_revenue);
        r.basic.revenue_gap = finite_or_zero(r.basic.revenue_gap);
        r.basic.revenue_gap_percent = finite_or_zero(r.basic.revenue_gap_percent);

        r.target_analysis.targets = r.target_analysis.targets.sanitize();
        let summary = &mut r.target_analysis.summary;
        summary.lowest_target = summary.lowest_target.take().sanitize();
        summary.highest_target = summary.highest_target.take().sanitize();
        summary.avg_required_revenue = finite_or_zero(summary.avg_required_revenue);

        r.safety_margin.safety_margin = finite_or_zero(r.safety_margin.safety_margin);
        r.safety_margin.safety_margin_rate = finite_or_zero(r.safety_margin.safety_margin_rate);

        let tol = &mut r.risk_tolerance;
        tol.max_cost_increase = finite_or_zero(tol.max_cost_increase);
        tol.max_cost_increase_percent = finite_or_zero(tol.max_cost_increase_percent);
        tol.max_revenue_decrease = finite_or_zero(tol.max_revenue_decrease);
        tol.max_revenue_decrease_percent = finite_or_zero(tol.max_revenue_decrease_percent);

        r.sensitivity.cases = r.sensitivity.cases.sanitize();
        r.sensitivity.combined_worst_case = r.sensitivity.combined_worst_case.sanitize();
        let s = &mut r.sensitivity.summary;
        s.cost_elasticity = finite_or_zero(s.cost_elasticity);
        s.revenue_elasticity = finite_or_zero(s.revenue_elasticity);
        s.worst_case_margin = finite_or_zero(s.worst_case_margin);
        s.risk_score = finite_or_zero(s.risk_score);

        let d = &mut r.dynamic_analysis;
        d.monthly_breakeven = finite_or_zero(d.monthly_breakeven);
        d.time_to_breakeven = sentinel(d.time_to_breakeven);
        d.required_growth = finite_or_zero(d.required_growth);
        d.monthly_profit = finite_or_zero(d.monthly_profit);
        d.months_to_breakeven = d.months_to_breakeven.filter(|m| m.is_finite());
        r
    }
}

// === Engine ===

/// Stage totals read once from the upstream results.
#[derive(Debug, Clone, Copy)]
struct Totals {
    revenue: f64,
    cost: f64,
    fixed: f64,
    /// Variable cost plus COGS
    variable: f64,
    investment: f64,
}

impl Totals {
    fn profit(&self) -> f64 {
        finite_or_zero(self.revenue - self.cost)
    }

    /// Variable cost rate, or `None` without revenue.
    fn variable_rate(&self) -> Option<f64> {
        (self.revenue > 0.0).then(|| safe_div(self.variable, self.revenue))
    }
}

impl BreakevenEngine {
    pub fn new(target_margins: Vec<f64>, stress_steps: Vec<f64>) -> Self {
        BreakevenEngine {
            target_margins,
            stress_steps,
        }
    }

    pub fn calculate(&self, revenue: &RevenueResult, cost: &CostResult, investment: &InvestmentResult) -> BreakevenResult {
        let totals = Totals {
            revenue: finite_or_zero(revenue.total),
            cost: finite_or_zero(cost.total),
            fixed: finite_or_zero(cost.fixed.total),
            variable: finite_or_zero(cost.variable.total + cost.cogs.total),
            investment: finite_or_zero(investment.total),
        };

        let current_margin = if totals.revenue > 0.0 {
            margin_pct(totals.profit(), totals.revenue)
        } else {
            0.0
        };

        let basic = basic_breakeven(&totals);
        let safety_margin = safety_margin(&totals);
        let risk_tolerance = risk_tolerance(&totals);
        let recommendations = recommendations(current_margin, &basic, &safety_margin, &risk_tolerance);

        let result = BreakevenResult {
            current_margin,
            target_analysis: self.target_analysis(&totals),
            sensitivity: self.stress_test(&totals, current_margin),
            dynamic_analysis: dynamic_breakeven(&totals),
            basic,
            safety_margin,
            risk_tolerance,
            recommendations,
        };

        tracing::debug!(margin = current_margin, status = ?result.basic.status, "break-even analysed");
        result
    }

    fn target_analysis(&self, totals: &Totals) -> TargetAnalysis {
        let targets: Vec<TargetRequirement> = self
            .target_margins
            .iter()
            .map(|&t| target_requirement(totals, t))
            .collect();

        let mut feasible: Vec<&TargetRequirement> = targets.iter().filter(|t| t.required_revenue.is_finite()).collect();
        feasible.sort_by(|a, b| a.required_revenue.total_cmp(&b.required_revenue));

        let summary = TargetSummary {
            feasible: !feasible.is_empty(),
            feasible_count: feasible.len(),
            total_targets: targets.len(),
            lowest_target: feasible.first().map(|t| (*t).clone()),
            highest_target: feasible.last().map(|t| (*t).clone()),
            avg_required_revenue: if feasible.is_empty() {
                0.0
            } else {
                finite_or_zero(feasible.iter().map(|t| t.required_revenue).sum::<f64>() / feasible.len() as f64)
            },
        };

        TargetAnalysis { targets, summary }
    }

    fn stress_test(&self, totals: &Totals, current_margin: f64) -> StressTest {
        let mut cases = Vec::with_capacity(self.stress_steps.len() * 4);
        for &step in &self.stress_steps {
            cases.push(stress(totals, 0.0, step));
        }
        for &step in &self.stress_steps {
            cases.push(stress(totals, 0.0, -step));
        }
        for &step in &self.stress_steps {
            cases.push(stress(totals, -step, 0.0));
        }
        for &step in &self.stress_steps {
            cases.push(stress(totals, step, 0.0));
        }

        let primary = self
            .stress_steps
            .first()
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_STRESS_STEPS[0]);
        let cost_up = stress(totals, 0.0, primary);
        let revenue_down = stress(totals, -primary, 0.0);
        let combined_worst_case = stress(totals, -primary, primary);

        let mut score = 0.0;
        score += if cost_up.margin < 0.0 {
            30.0
        } else if cost_up.margin < 5.0 {
            20.0
        } else if cost_up.margin < 10.0 {
            10.0
        } else {
            0.0
        };
        score += if revenue_down.margin < 0.0 {
            40.0
        } else if revenue_down.margin < 5.0 {
            30.0
        } else if revenue_down.margin < 10.0 {
            15.0
        } else {
            0.0
        };
        if !combined_worst_case.is_profitable {
            score += 30.0;
        }

        let summary = SensitivitySummary {
            cost_elasticity: finite_or_zero(((current_margin - cost_up.margin) / primary).abs()),
            revenue_elasticity: finite_or_zero(((current_margin - revenue_down.margin) / primary).abs()),
            worst_case_margin: combined_worst_case.margin,
            risk_score: f64::min(100.0, score),
        };

        StressTest {
            cases,
            combined_worst_case,
            summary,
        }
    }
}

fn basic_breakeven(totals: &Totals) -> BasicBreakeven {
    let revenue_gap = (totals.cost - totals.revenue).max(0.0);
    let margin = if totals.revenue > 0.0 {
        margin_pct(totals.profit(), totals.revenue)
    } else {
        0.0
    };
    let status = BreakevenStatus::from_margin(margin);

    BasicBreakeven {
        break_even_revenue: totals.cost,
        revenue_gap,
        revenue_gap_percent: if totals.revenue > 0.0 {
            margin_pct(revenue_gap, totals.revenue)
        } else {
            0.0
        },
        is_break_even: revenue_gap <= 0.0,
        status,
        status_description: status.description().to_string(),
    }
}

fn target_requirement(totals: &Totals, target: f64) -> TargetRequirement {
    let t = finite_or_zero(target) / 100.0;
    let required = match totals.variable_rate() {
        Some(vcr) => {
            let denominator = 1.0 - vcr - t;
            if denominator > 0.0 {
                totals.fixed / denominator
            } else {
                f64::INFINITY
            }
        }
        None => {
            if t < 1.0 {
                totals.cost / (1.0 - t)
            } else {
                f64::INFINITY
            }
        }
    };
    let required = sentinel(required);

    let revenue_gap = if required.is_finite() {
        (required - totals.revenue).max(0.0)
    } else {
        0.0
    };
    let increase_percent = if !required.is_finite() {
        f64::INFINITY
    } else if totals.revenue > 0.0 {
        finite_or_zero((required - totals.revenue) / totals.revenue * 100.0)
    } else if required > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    TargetRequirement {
        target_margin: finite_or_zero(target),
        required_revenue: required,
        required_profit: if required.is_finite() { finite_or_zero(required * t) } else { 0.0 },
        revenue_gap,
        increase_percent,
        is_achievable: required.is_finite() && increase_percent <= 100.0,
        difficulty: Difficulty::from_increase(increase_percent),
    }
}

fn safety_margin(totals: &Totals) -> SafetyMargin {
    if totals.revenue <= 0.0 {
        return SafetyMargin {
            safety_margin: 0.0,
            safety_margin_rate: 0.0,
            risk_level: RiskLevel::High,
        };
    }
    let amount = totals.profit();
    let rate = margin_pct(amount, totals.revenue);
    let risk_level = if rate > 20.0 {
        RiskLevel::Low
    } else if rate > 10.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };
    SafetyMargin {
        safety_margin: amount,
        safety_margin_rate: rate,
        risk_level,
    }
}

/// Label for the revenue decrease (percent) the business can absorb.
pub fn tolerance_label(max_decrease_pct: f64) -> &'static str {
    if max_decrease_pct >= 30.0 {
        "低风险"
    } else if max_decrease_pct >= 20.0 {
        "中低风险"
    } else if max_decrease_pct >= 10.0 {
        "中等风险"
    } else if max_decrease_pct >= 5.0 {
        "中高风险"
    } else {
        "高风险"
    }
}

fn risk_tolerance(totals: &Totals) -> RiskTolerance {
    let headroom = totals.profit().max(0.0);
    let cost_pct = if totals.cost > 0.0 { safe_div(headroom, totals.cost) * 100.0 } else { 0.0 };
    let revenue_pct = if totals.revenue > 0.0 { safe_div(headroom, totals.revenue) * 100.0 } else { 0.0 };

    RiskTolerance {
        max_cost_increase: headroom,
        max_cost_increase_percent: cost_pct,
        max_revenue_decrease: headroom,
        max_revenue_decrease_percent: revenue_pct,
        level: tolerance_label(revenue_pct).to_string(),
        is_high_risk: revenue_pct < 10.0,
    }
}

fn stress(totals: &Totals, revenue_change: f64, cost_change: f64) -> StressCase {
    let revenue = finite_or_zero(totals.revenue * (1.0 + revenue_change / 100.0));
    let cost = finite_or_zero(totals.cost * (1.0 + cost_change / 100.0));
    let profit = finite_or_zero(revenue - cost);

    let name = match (revenue_change != 0.0, cost_change != 0.0) {
        (true, true) => format!("收入{:+}%且成本{:+}%", revenue_change, cost_change),
        (true, false) => format!("收入{:+}%", revenue_change),
        _ => format!("成本{:+}%", cost_change),
    };

    StressCase {
        name,
        revenue_change_pct: revenue_change,
        cost_change_pct: cost_change,
        revenue,
        cost,
        profit,
        margin: if revenue > 0.0 { margin_pct(profit, revenue) } else { 0.0 },
        is_profitable: profit > 0.0,
    }
}

fn dynamic_breakeven(totals: &Totals) -> DynamicBreakeven {
    let profit = totals.profit();
    let monthly_profit = profit / 12.0;

    let monthly_breakeven = match totals.variable_rate() {
        Some(vcr) if vcr < 1.0 => finite_or_zero(totals.fixed / 12.0 / (1.0 - vcr)),
        _ => 0.0,
    };
    let required_growth = if totals.revenue > 0.0 {
        (safe_div(totals.cost - totals.revenue, totals.revenue) * 100.0).max(0.0)
    } else {
        0.0
    };
    let months_to_breakeven =
        (monthly_profit > 0.0 && totals.investment > 0.0).then(|| (totals.investment / monthly_profit).ceil());

    DynamicBreakeven {
        monthly_breakeven,
        time_to_breakeven: payback_years(totals.investment, profit),
        required_growth,
        monthly_profit,
        months_to_breakeven: months_to_breakeven.filter(|m| m.is_finite()),
    }
}

fn recommendations(
    current_margin: f64,
    basic: &BasicBreakeven,
    safety: &SafetyMargin,
    tolerance: &RiskTolerance,
) -> Vec<String> {
    let mut out = Vec::new();

    if current_margin < 0.0 || (basic.revenue_gap > 0.0 && current_margin == 0.0) {
        out.push("当前处于亏损状态，需要立即采取措施提高收入或降低成本".to_string());
        out.push(format!("需要增加收入 {:.0} 元才能达到盈亏平衡", basic.revenue_gap));
    } else if current_margin < 5.0 {
        out.push("目前微利经营，建议提高安全边际".to_string());
        out.push("关注成本控制，防止成本上涨导致亏损".to_string());
    } else if current_margin < 10.0 {
        out.push("盈利水平一般，有继续优化空间".to_string());
        out.push("可以考虑适度投资扩大规模".to_string());
    } else {
        out.push("盈利状况良好，可考虑扩张或提高分红".to_string());
    }

    if safety.safety_margin_rate < 10.0 {
        out.push("安全边际偏低，需要建立风险缓冲机制".to_string());
    }
    if tolerance.max_cost_increase_percent < 5.0 {
        out.push("成本控制空间有限，需要重点关注成本管理".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::cost::{CogsBreakdown, FixedCosts, VariableCosts};

    fn stage(rev: f64, fixed: f64, variable: f64, cogs: f64, invested: f64) -> (RevenueResult, CostResult, InvestmentResult) {
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
            ..Default::default()
        };
        let investment = InvestmentResult {
            total: invested,
            ..Default::default()
        };
        (revenue, cost, investment)
    }

    fn run(rev: f64, fixed: f64, variable: f64, cogs: f64, invested: f64) -> BreakevenResult {
        let (r, c, i) = stage(rev, fixed, variable, cogs, invested);
        BreakevenEngine::default().calculate(&r, &c, &i)
    }

    #[test]
    fn test_basic_profitable() {
        // margin 25%
        let result = run(1_000_000.0, 500_000.0, 150_000.0, 100_000.0, 1_000_000.0);
        assert!((result.current_margin - 25.0).abs() < 1e-9);
        assert_eq!(result.basic.break_even_revenue, 750_000.0);
        assert_eq!(result.basic.revenue_gap, 0.0);
        assert!(result.basic.is_break_even);
        assert_eq!(result.basic.status, BreakevenStatus::Profitable);
        assert_eq!(result.safety_margin.risk_level, RiskLevel::Low);
        assert_eq!(result.recommendations, vec!["盈利状况良好，可考虑扩张或提高分红".to_string()]);
    }

    #[test]
    fn test_basic_loss() {
        let result = run(1_000.0, 900.0, 200.0, 0.0, 0.0);
        assert!((result.basic.revenue_gap - 100.0).abs() < 1e-9);
        assert!((result.basic.revenue_gap_percent - 10.0).abs() < 1e-9);
        assert!(!result.basic.is_break_even);
        assert_eq!(result.basic.status, BreakevenStatus::Loss);
        assert!(result.recommendations.contains(&"需要增加收入 100 元才能达到盈亏平衡".to_string()));
        assert!(result.risk_tolerance.is_high_risk);
        assert_eq!(result.risk_tolerance.max_cost_increase, 0.0);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(BreakevenStatus::from_margin(12.0), BreakevenStatus::Profitable);
        assert_eq!(BreakevenStatus::from_margin(7.0), BreakevenStatus::MarginallyProfitable);
        assert_eq!(BreakevenStatus::from_margin(2.0), BreakevenStatus::Breakeven);
        assert_eq!(BreakevenStatus::from_margin(0.0), BreakevenStatus::NearBreakeven);
        assert_eq!(BreakevenStatus::from_margin(-8.0), BreakevenStatus::Loss);
    }

    #[test]
    fn test_target_requirement_hits_target() {
        let result = run(1_000_000.0, 500_000.0, 150_000.0, 100_000.0, 0.0);
        // vcr = 0.25
        let t10 = &result.target_analysis.targets[1];
        assert_eq!(t10.target_margin, 10.0);
        assert!((t10.required_revenue - 500_000.0 / 0.65).abs() < 1e-6);

        let r = t10.required_revenue;
        let margin = (r - 500_000.0 - 0.25 * r) / r * 100.0;
        assert!((margin - 10.0).abs() < 1e-9);
        assert_eq!(t10.difficulty, Difficulty::Achieved);
        assert!(t10.is_achievable);
        assert_eq!(t10.revenue_gap, 0.0);
    }

    #[test]
    fn test_target_unreachable_when_variable_rate_too_high() {
        let result = run(1_000.0, 100.0, 900.0, 0.0, 0.0);
        let t20 = &result.target_analysis.targets[3];
        assert_eq!(t20.required_revenue, f64::INFINITY);
        assert!(!t20.is_achievable);
        assert_eq!(t20.difficulty, Difficulty::Extreme);

        let summary = &result.target_analysis.summary;
        assert!(summary.feasible);
        assert_eq!(summary.total_targets, 4);
        assert_eq!(summary.feasible_count, 1);
        assert_eq!(summary.lowest_target.as_ref().map(|t| t.target_margin), Some(5.0));
    }

    #[test]
    fn test_target_without_revenue() {
        let result = run(0.0, 900.0, 100.0, 0.0, 0.0);
        let t5 = &result.target_analysis.targets[0];
        assert!((t5.required_revenue - 1_000.0 / 0.95).abs() < 1e-9);
        assert_eq!(t5.increase_percent, f64::INFINITY);
        assert!(!t5.is_achievable);
        assert_eq!(result.current_margin, 0.0);
        assert_eq!(result.safety_margin.risk_level, RiskLevel::High);
        assert_eq!(result.basic.status, BreakevenStatus::NearBreakeven);
    }

    #[test]
    fn test_difficulty_buckets() {
        assert_eq!(Difficulty::from_increase(-3.0), Difficulty::Achieved);
        assert_eq!(Difficulty::from_increase(15.0), Difficulty::Easy);
        assert_eq!(Difficulty::from_increase(40.0), Difficulty::Moderate);
        assert_eq!(Difficulty::from_increase(90.0), Difficulty::Hard);
        assert_eq!(Difficulty::from_increase(f64::INFINITY), Difficulty::Extreme);
    }

    #[test]
    fn test_risk_tolerance() {
        let result = run(1_000.0, 600.0, 150.0, 0.0, 0.0);
        let tol = &result.risk_tolerance;
        assert_eq!(tol.max_cost_increase, 250.0);
        assert!((tol.max_cost_increase_percent - 250.0 / 750.0 * 100.0).abs() < 1e-9);
        assert!((tol.max_revenue_decrease_percent - 25.0).abs() < 1e-9);
        assert_eq!(tol.level, "中低风险");
        assert!(!tol.is_high_risk);
    }

    #[test]
    fn test_stress_cases_and_score() {
        let result = run(1_000.0, 800.0, 0.0, 0.0, 0.0);
        let stress = &result.sensitivity;
        assert_eq!(stress.cases.len(), 8);
        assert_eq!(stress.cases[0].name, "成本+5%");
        assert!((stress.cases[0].profit - 160.0).abs() < 1e-9);
        assert_eq!(stress.cases[4].name, "收入-5%");

        let worst = &stress.combined_worst_case;
        assert!((worst.revenue - 950.0).abs() < 1e-9);
        assert!((worst.cost - 840.0).abs() < 1e-9);
        assert!(worst.is_profitable);

        // cost+5% margin 16 → 0; revenue-5% margin ≈ 15.8 → 0
        assert_eq!(stress.summary.risk_score, 0.0);
        assert!((stress.summary.cost_elasticity - (20.0 - 16.0) / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_stress_score_when_fragile() {
        let result = run(1_000.0, 980.0, 0.0, 0.0, 0.0);
        // cost+5% loses, revenue-5% loses, worst case loses
        assert_eq!(result.sensitivity.summary.risk_score, 100.0);
    }

    #[test]
    fn test_dynamic_analysis() {
        let result = run(1_200.0, 600.0, 300.0, 0.0, 600.0);
        let d = &result.dynamic_analysis;
        // vcr 0.25, monthly fixed 50
        assert!((d.monthly_breakeven - 50.0 / 0.75).abs() < 1e-9);
        assert!((d.time_to_breakeven - 2.0).abs() < 1e-12);
        assert_eq!(d.monthly_profit, 25.0);
        assert_eq!(d.months_to_breakeven, Some(24.0));
        assert_eq!(d.required_growth, 0.0);

        let loss = run(1_000.0, 1_200.0, 0.0, 0.0, 600.0);
        assert_eq!(loss.dynamic_analysis.time_to_breakeven, f64::INFINITY);
        assert_eq!(loss.dynamic_analysis.months_to_breakeven, None);
        assert!((loss.dynamic_analysis.required_growth - 20.0).abs() < 1e-9);
    }
}
