//! Text rendering for the CLI.

use calc_core::calculations::analysis::Recommendation;
use calc_core::calculations::profitability::WhatIf;
use calc_core::calculations::scenario::ScenarioOutcome;
use calc_core::formula::{AvailableVariables, FormulaDependencies, FormulaValidation};
use calc_core::{CalculationResult, ValidationReport};

const RULE: &str = "═══════════════════════════════════════";

fn banner(title: &str) {
    println!("{}", RULE);
    println!("  {}", title);
    println!("{}", RULE);
}

/// Years, or "never" for the unreachable sentinel.
fn years(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1} 年", value)
    } else {
        "无法回本".to_string()
    }
}

fn money(value: f64) -> String {
    format!("¥{:.0}", value)
}

pub fn print_calculation(result: &CalculationResult) {
    if result.error {
        banner("CALCULATION FAILED");
        println!("  {}", result.message.as_deref().unwrap_or("unknown error"));
        return;
    }

    let rev = &result.revenue;
    let cost = &result.cost;
    let inv = &result.investment;
    let prof = &result.profitability;

    banner("HOPEFUL FINANCIAL MODEL");
    println!();
    println!("Revenue (annual):");
    println!("  会员收入  {:>14}", money(rev.member));
    println!("  寄养收入  {:>14}", money(rev.boarding));
    println!("  医疗收入  {:>14}", money(rev.medical));
    println!("  零售收入  {:>14}", money(rev.retail));
    println!("  餐饮收入  {:>14}", money(rev.cafe));
    for item in &rev.custom_items {
        println!("  {}  {:>14}", item.name, money(item.amount));
    }
    println!("  合计      {:>14}", money(rev.total));
    println!();
    println!("Cost (annual):");
    println!("  固定成本  {:>14}", money(cost.fixed.total));
    println!("  变动成本  {:>14}", money(cost.variable.total));
    println!("  商品成本  {:>14}", money(cost.cogs.total));
    println!("  合计      {:>14}", money(cost.total));
    println!();
    println!("Investment:");
    println!("  装修      {:>14}", money(inv.fitout));
    println!("  医疗设备  {:>14}", money(inv.medical));
    println!("  其他      {:>14}", money(inv.custom));
    println!("  合计      {:>14}  ({:.0}/㎡)", money(inv.total), inv.fitout_per_sqm);
    println!();

    banner("PROFITABILITY");
    println!("  Profit:   {}", money(prof.profit));
    println!("  Margin:   {:.1}%  ({})", prof.margin, prof.profit_level.label());
    println!("  ROI:      {:.1}%", prof.roi);
    println!("  Payback:  {}", years(prof.payback_years));
    println!("  Monthly cash flow: {}", money(prof.monthly_cash_flow));
    println!();

    banner("SCENARIOS");
    let scenarios = &result.scenarios;
    for (name, outcome) in [
        ("乐观", &scenarios.optimistic),
        ("保守", &scenarios.conservative),
        ("悲观", &scenarios.pessimistic),
    ] {
        print_outcome(name, outcome);
    }
    let risk = &scenarios.comparison.risk_assessment;
    println!("  Risk: {}", risk.level.label());
    for factor in &risk.factors {
        println!("    - {}", factor);
    }
    println!();

    banner("BREAK-EVEN");
    let be = &result.breakeven;
    println!("  Break-even revenue: {}", money(be.basic.break_even_revenue));
    println!("  Status:  {}", be.basic.status_description);
    println!(
        "  Safety margin: {:.1}% ({})",
        be.safety_margin.safety_margin_rate,
        be.safety_margin.risk_level.label()
    );
    for rec in &be.recommendations {
        println!("    - {}", rec);
    }
    println!();

    banner("ANALYSIS");
    let analysis = &result.comprehensive;
    println!(
        "  Health: {:.0}/100 grade {:?} ({})",
        analysis.health_score.score, analysis.health_score.grade, analysis.health_score.description
    );
    for indicator in &analysis.risk_indicators {
        println!("  [{}] {}", indicator.level.label(), indicator.message);
    }
    for suggestion in &analysis.improvement_suggestions {
        println!("  * {}: {}", suggestion.title, suggestion.description);
    }
    let guidance = &analysis.investment_guidance;
    let verdict = match guidance.recommendation {
        Recommendation::Proceed => "PROCEED",
        Recommendation::Hold => "HOLD",
        Recommendation::Reject => "REJECT",
    };
    println!();
    println!("  Recommendation: {} (confidence {:.0}%)", verdict, guidance.confidence_level);
    for reason in &guidance.reasons {
        println!("    - {}", reason);
    }
    for condition in &guidance.conditions {
        println!("    ? {}", condition);
    }
}

fn print_outcome(name: &str, outcome: &ScenarioOutcome) {
    println!(
        "  {}  profit {:>12}  margin {:>6.1}%  payback {}",
        name,
        money(outcome.profit),
        outcome.margin,
        years(outcome.payback_years)
    );
}

pub fn print_what_if(cases: &[WhatIf]) {
    println!();
    banner("WHAT-IF");
    for case in cases {
        println!(
            "  {:<12} profit {:>12}  margin {:>6.1}%  payback {}",
            case.name,
            money(case.profit),
            case.margin,
            years(case.payback_years)
        );
    }
}

pub fn print_validation(report: &ValidationReport) {
    if report.is_valid && report.warnings.is_empty() {
        println!("✓ Document is valid");
        return;
    }
    if report.is_valid {
        println!("✓ Document is valid ({} warnings)", report.warnings.len());
    } else {
        println!("✗ Document has {} errors", report.errors.len());
    }
    for error in &report.errors {
        println!("  error:   {}", error);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
}

pub fn print_formula(
    formula: &str,
    value: f64,
    check: &FormulaValidation,
    deps: &FormulaDependencies,
    display: &str,
) {
    println!("Formula: {}", formula);
    match &check.error {
        None => println!("  = {}", value),
        Some(err) => println!("  invalid: {} (evaluates to {})", err, value),
    }
    println!("  Display: {}", display);
    if !deps.system_variables.is_empty() {
        println!("  System variables: {}", deps.system_variables.join(", "));
    }
    if !deps.custom_variables.is_empty() {
        let slots: Vec<String> = deps.custom_variables.iter().map(|s| format!("%{}", s)).collect();
        println!("  Placeholders: {}", slots.join(", "));
    }
    if !deps.functions.is_empty() {
        println!("  Functions: {}", deps.functions.join(", "));
    }
}

pub fn print_variables(available: &AvailableVariables) {
    println!("System variables:");
    for var in &available.system {
        match var.value {
            Some(v) => println!("  {:<18} {:<14} = {}", var.name, var.description, v),
            None => println!("  {:<18} {}", var.name, var.description),
        }
    }
    println!("Placeholders:");
    for var in &available.custom {
        println!("  {:<18} {}", var.name, var.description);
    }
    println!("Functions:");
    for var in &available.functions {
        println!("  {:<18} {}", var.name, var.description);
    }
}
