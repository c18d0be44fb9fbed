//! # Comprehensive Analysis
//!
//! Cross-stage judgement built from every engine's output: a 0-100 health
//! score, risk indicators, improvement suggestions, a key-figure summary and
//! an investment recommendation.
//!
//! Health score weights:
//!
//! | Component           | Points | Source                              |
//! |---------------------|--------|-------------------------------------|
//! | Profitability       | 40     | net margin >15 / >10 / >5 / >0      |
//! | Safety margin       | 30     | safety margin rate >20 / >10 / >5   |
//! | Scenario stability  | 30     | conservative profit > 0, margin > 5 |

use serde::{Deserialize, Serialize};

use crate::numeric::{finite_or_zero, safe_div, serde_sentinel};

use super::breakeven::BreakevenResult;
use super::cost::CostResult;
use super::investment::{InvestmentResult, InvestmentRisk};
use super::profitability::{ProfitLevel, ProfitabilityResult};
use super::revenue::RevenueResult;
use super::scenario::ScenarioResult;
use super::RiskLevel;

/// Borrowed view of every stage result.
#[derive(Debug, Clone, Copy)]
pub struct Stages<'a> {
    pub revenue: &'a RevenueResult,
    pub cost: &'a CostResult,
    pub investment: &'a InvestmentResult,
    pub profitability: &'a ProfitabilityResult,
    pub scenarios: &'a ScenarioResult,
    pub breakeven: &'a BreakevenResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    #[default]
    F,
}

impl HealthGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            HealthGrade::A
        } else if score >= 70.0 {
            HealthGrade::B
        } else if score >= 60.0 {
            HealthGrade::C
        } else if score >= 50.0 {
            HealthGrade::D
        } else {
            HealthGrade::F
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            HealthGrade::A => "财务状况优秀",
            HealthGrade::B => "财务状况良好",
            HealthGrade::C => "财务状况一般",
            HealthGrade::D => "财务状况需要改善",
            HealthGrade::F => "财务状况存在较大风险",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub grade: HealthGrade,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Profitability,
    Payback,
    Scenario,
    SafetyMargin,
    CashFlow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskIndicator {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub level: RiskLevel,
    pub message: String,
    /// The offending figure; payback may be Infinity
    #[serde(with = "serde_sentinel")]
    pub metric: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionCategory {
    Revenue,
    Cost,
    Investment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: SuggestionCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RevenueSource {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total: f64,
    pub monthly_average: f64,
    pub top_source: RevenueSource,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfitSummary {
    pub profit: f64,
    pub margin: f64,
    pub level: ProfitLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentSummary {
    pub total: f64,
    #[serde(with = "serde_sentinel")]
    pub payback_years: f64,
    pub roi: f64,
}

impl Default for InvestmentSummary {
    fn default() -> Self {
        InvestmentSummary {
            total: 0.0,
            payback_years: f64::INFINITY,
            roi: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskSummary {
    pub count: usize,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeySummary {
    pub revenue: RevenueSummary,
    pub profitability: ProfitSummary,
    pub investment: InvestmentSummary,
    pub risks: RiskSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Proceed,
    #[default]
    Hold,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentGuidance {
    pub recommendation: Recommendation,
    pub reasons: Vec<String>,
    pub conditions: Vec<String>,
    /// 50-100
    pub confidence_level: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveAnalysis {
    pub health_score: HealthScore,
    pub risk_indicators: Vec<RiskIndicator>,
    pub improvement_suggestions: Vec<Suggestion>,
    pub key_summary: KeySummary,
    pub investment_guidance: InvestmentGuidance,
    pub investment_risk: InvestmentRisk,
}

impl ComprehensiveAnalysis {
    pub fn build(stages: &Stages<'_>, investment_risk: InvestmentRisk) -> Self {
        let risk_indicators = risk_indicators(stages);
        ComprehensiveAnalysis {
            health_score: health_score(stages),
            improvement_suggestions: improvement_suggestions(stages),
            key_summary: key_summary(stages, &risk_indicators),
            investment_guidance: investment_guidance(stages),
            risk_indicators,
            investment_risk,
        }
    }

    /// Placeholder carried by an error result.
    pub fn failed() -> Self {
        ComprehensiveAnalysis {
            health_score: HealthScore {
                score: 0.0,
                grade: HealthGrade::F,
                description: "计算错误".to_string(),
            },
            investment_guidance: InvestmentGuidance {
                recommendation: Recommendation::Reject,
                reasons: vec!["计算出错".to_string()],
                conditions: Vec::new(),
                confidence_level: 0.0,
            },
            ..Default::default()
        }
    }
}

pub fn health_score(stages: &Stages<'_>) -> HealthScore {
    let margin = stages.profitability.margin;
    let safety = stages.breakeven.safety_margin.safety_margin_rate;
    let conservative = &stages.scenarios.conservative;

    let mut score = if margin > 15.0 {
        40.0
    } else if margin > 10.0 {
        30.0
    } else if margin > 5.0 {
        20.0
    } else if margin > 0.0 {
        10.0
    } else {
        0.0
    };

    score += if safety > 20.0 {
        30.0
    } else if safety > 10.0 {
        20.0
    } else if safety > 5.0 {
        10.0
    } else {
        0.0
    };

    if conservative.profit > 0.0 {
        score += 20.0;
        if conservative.margin > 5.0 {
            score += 10.0;
        }
    }

    let score = f64::min(100.0, score);
    let grade = HealthGrade::from_score(score);
    HealthScore {
        score,
        grade,
        description: grade.description().to_string(),
    }
}

pub fn risk_indicators(stages: &Stages<'_>) -> Vec<RiskIndicator> {
    let p = stages.profitability;
    let mut out = Vec::new();
    let mut push = |kind, level, message: &str, metric| {
        out.push(RiskIndicator {
            kind,
            level,
            message: message.to_string(),
            metric,
        })
    };

    if p.margin < 5.0 {
        push(IndicatorKind::Profitability, RiskLevel::High, "利润率过低，盈利能力不足", p.margin);
    }
    if p.payback_years > 5.0 {
        push(IndicatorKind::Payback, RiskLevel::High, "投资回本周期过长", p.payback_years);
    }
    if stages.scenarios.conservative.profit < 0.0 {
        push(
            IndicatorKind::Scenario,
            RiskLevel::High,
            "保守情景下出现亏损",
            stages.scenarios.conservative.profit,
        );
    }
    let safety = stages.breakeven.safety_margin.safety_margin_rate;
    if safety < 10.0 {
        push(IndicatorKind::SafetyMargin, RiskLevel::Medium, "安全边际不足，抗风险能力偏低", safety);
    }
    if p.monthly_cash_flow < 0.0 {
        push(IndicatorKind::CashFlow, RiskLevel::Critical, "月度现金流为负，运营资金紧张", p.monthly_cash_flow);
    }

    out
}

/// Overall level from the number of high or critical indicators.
pub fn overall_risk_level(indicators: &[RiskIndicator]) -> RiskLevel {
    let severe = indicators.iter().filter(|i| i.level >= RiskLevel::High).count();
    match severe {
        0 => RiskLevel::Low,
        1 => RiskLevel::Medium,
        _ => RiskLevel::High,
    }
}

/// Largest of the five built-in revenue lines; ties keep the earlier line.
pub fn top_revenue_source(revenue: &RevenueResult) -> RevenueSource {
    let lines = revenue.builtin_lines();
    let (name, value) = lines
        .iter()
        .skip(1)
        .fold(lines[0], |best, &line| if line.1 > best.1 { line } else { best });
    RevenueSource {
        name: name.to_string(),
        value,
    }
}

pub fn improvement_suggestions(stages: &Stages<'_>) -> Vec<Suggestion> {
    let top = top_revenue_source(stages.revenue);
    let mut out = vec![Suggestion {
        category: SuggestionCategory::Revenue,
        priority: Priority::High,
        title: "收入优化".to_string(),
        description: format!("重点优化{}业务板块", top.name),
    }];

    if stages.cost.total > 0.0 && safe_div(stages.cost.fixed.total, stages.cost.total) > 0.7 {
        out.push(Suggestion {
            category: SuggestionCategory::Cost,
            priority: Priority::Medium,
            title: "成本控制".to_string(),
            description: "固定成本占比较高，需要提高运营效率".to_string(),
        });
    }

    if stages.profitability.payback_years > 3.0 {
        out.push(Suggestion {
            category: SuggestionCategory::Investment,
            priority: Priority::High,
            title: "投资优化".to_string(),
            description: "回本周期较长，建议调整投资策略".to_string(),
        });
    }

    out
}

fn key_summary(stages: &Stages<'_>, indicators: &[RiskIndicator]) -> KeySummary {
    let p = stages.profitability;
    KeySummary {
        revenue: RevenueSummary {
            total: stages.revenue.total,
            monthly_average: finite_or_zero(stages.revenue.total / 12.0),
            top_source: top_revenue_source(stages.revenue),
        },
        profitability: ProfitSummary {
            profit: p.profit,
            margin: p.margin,
            level: p.profit_level,
        },
        investment: InvestmentSummary {
            total: stages.investment.total,
            payback_years: p.payback_years,
            roi: p.roi,
        },
        risks: RiskSummary {
            count: indicators.len(),
            level: overall_risk_level(indicators),
        },
    }
}

pub fn investment_guidance(stages: &Stages<'_>) -> InvestmentGuidance {
    let margin = stages.profitability.margin;
    let safety = stages.breakeven.safety_margin.safety_margin_rate;
    let conservative_profit = stages.scenarios.conservative.profit;

    let mut reasons = Vec::new();
    let mut conditions = Vec::new();

    let recommendation = if margin > 10.0 && conservative_profit > 0.0 {
        reasons.push("盈利能力强且风险可控".to_string());
        Recommendation::Proceed
    } else if margin > 5.0 && safety > 10.0 {
        reasons.push("盈利能力可接受且有安全边际".to_string());
        conditions.push("建议制定风险应对预案".to_string());
        Recommendation::Proceed
    } else if margin > 0.0 {
        reasons.push("盈利微薄，需要谨慎评估".to_string());
        conditions.push("建议优化成本结构后再决策".to_string());
        Recommendation::Hold
    } else {
        reasons.push("当前模型显示亏损风险较高".to_string());
        Recommendation::Reject
    };

    let mut confidence = 50.0;
    if conservative_profit > 0.0 {
        confidence += 20.0;
    }
    if margin > 10.0 {
        confidence += 15.0;
    }
    if safety > 15.0 {
        confidence += 15.0;
    }

    InvestmentGuidance {
        recommendation,
        reasons,
        conditions,
        confidence_level: f64::min(100.0, confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::breakeven::SafetyMargin;
    use crate::calculations::cost::FixedCosts;
    use crate::calculations::scenario::ScenarioOutcome;

    struct Fixture {
        revenue: RevenueResult,
        cost: CostResult,
        investment: InvestmentResult,
        profitability: ProfitabilityResult,
        scenarios: ScenarioResult,
        breakeven: BreakevenResult,
    }

    impl Fixture {
        fn new(margin: f64, safety: f64, conservative_profit: f64, conservative_margin: f64) -> Self {
            Fixture {
                revenue: RevenueResult {
                    member: 100.0,
                    medical: 300.0,
                    retail: 300.0,
                    total: 700.0,
                    ..Default::default()
                },
                cost: CostResult {
                    fixed: FixedCosts {
                        total: 80.0,
                        ..Default::default()
                    },
                    total: 100.0,
                    ..Default::default()
                },
                investment: InvestmentResult::default(),
                profitability: ProfitabilityResult {
                    margin,
                    payback_years: 2.0,
                    monthly_cash_flow: 10.0,
                    ..Default::default()
                },
                scenarios: ScenarioResult {
                    conservative: ScenarioOutcome {
                        profit: conservative_profit,
                        margin: conservative_margin,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                breakeven: BreakevenResult {
                    safety_margin: SafetyMargin {
                        safety_margin_rate: safety,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            }
        }

        fn stages(&self) -> Stages<'_> {
            Stages {
                revenue: &self.revenue,
                cost: &self.cost,
                investment: &self.investment,
                profitability: &self.profitability,
                scenarios: &self.scenarios,
                breakeven: &self.breakeven,
            }
        }
    }

    #[test]
    fn test_health_score_weights() {
        let healthy = Fixture::new(20.0, 25.0, 100.0, 8.0);
        let score = health_score(&healthy.stages());
        assert_eq!(score.score, 100.0);
        assert_eq!(score.grade, HealthGrade::A);

        let middling = Fixture::new(8.0, 12.0, 50.0, 3.0);
        let score = health_score(&middling.stages());
        assert_eq!(score.score, 60.0);
        assert_eq!(score.grade, HealthGrade::C);
        assert_eq!(score.description, "财务状况一般");

        let poor = Fixture::new(-5.0, 0.0, -10.0, -2.0);
        assert_eq!(health_score(&poor.stages()).grade, HealthGrade::F);
    }

    #[test]
    fn test_risk_indicators() {
        let mut f = Fixture::new(2.0, 5.0, -1.0, -1.0);
        f.profitability.payback_years = f64::INFINITY;
        f.profitability.monthly_cash_flow = -3.0;

        let indicators = risk_indicators(&f.stages());
        let kinds: Vec<IndicatorKind> = indicators.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IndicatorKind::Profitability,
                IndicatorKind::Payback,
                IndicatorKind::Scenario,
                IndicatorKind::SafetyMargin,
                IndicatorKind::CashFlow,
            ]
        );
        assert_eq!(indicators[1].metric, f64::INFINITY);
        assert_eq!(overall_risk_level(&indicators), RiskLevel::High);
    }

    #[test]
    fn test_overall_risk_level_counts_severe_only() {
        let f = Fixture::new(20.0, 5.0, 100.0, 10.0);
        let indicators = risk_indicators(&f.stages());
        assert_eq!(indicators.len(), 1);
        assert_eq!(overall_risk_level(&indicators), RiskLevel::Low);
    }

    #[test]
    fn test_top_source_keeps_first_on_tie() {
        let f = Fixture::new(0.0, 0.0, 0.0, 0.0);
        let top = top_revenue_source(&f.revenue);
        assert_eq!(top.name, "医疗收入");
        assert_eq!(top.value, 300.0);

        let empty = top_revenue_source(&RevenueResult::default());
        assert_eq!(empty.name, "会员收入");
    }

    #[test]
    fn test_suggestions() {
        let mut f = Fixture::new(10.0, 10.0, 10.0, 1.0);
        f.profitability.payback_years = 4.0;
        let suggestions = improvement_suggestions(&f.stages());
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].description, "重点优化医疗收入业务板块");
        assert_eq!(suggestions[1].category, SuggestionCategory::Cost);

        f.cost.total = 0.0;
        f.cost.fixed.total = 0.0;
        assert_eq!(improvement_suggestions(&f.stages()).len(), 2);
    }

    #[test]
    fn test_investment_guidance() {
        let strong = investment_guidance(&Fixture::new(12.0, 20.0, 50.0, 5.0).stages());
        assert_eq!(strong.recommendation, Recommendation::Proceed);
        assert_eq!(strong.confidence_level, 100.0);
        assert!(strong.conditions.is_empty());

        let cautious = investment_guidance(&Fixture::new(7.0, 12.0, -1.0, -1.0).stages());
        assert_eq!(cautious.recommendation, Recommendation::Proceed);
        assert_eq!(cautious.conditions, vec!["建议制定风险应对预案".to_string()]);
        assert_eq!(cautious.confidence_level, 50.0);

        let thin = investment_guidance(&Fixture::new(3.0, 3.0, 1.0, 0.5).stages());
        assert_eq!(thin.recommendation, Recommendation::Hold);

        let losing = investment_guidance(&Fixture::new(-1.0, 0.0, -5.0, -1.0).stages());
        assert_eq!(losing.recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_failed_placeholder() {
        let failed = ComprehensiveAnalysis::failed();
        assert_eq!(failed.health_score.grade, HealthGrade::F);
        assert_eq!(failed.health_score.description, "计算错误");
        assert_eq!(failed.investment_guidance.recommendation, Recommendation::Reject);
    }
}
