//! # Cost Engine
//!
//! Annual cost in three buckets:
//!
//! - **Fixed**: rent (area × rate × days), property fee (area × rate × 12),
//!   staff (count × salary × 12), cleaning/other (absolute), headquarters fee
//!   (percent of *total* revenue) and enabled fixed custom cost modules.
//! - **Variable**: utilities, miscellaneous and enabled variable custom cost
//!   modules.
//! - **COGS**: per revenue line, `revenue × (100 − gross margin) / 100`.
//!   Custom revenue modules carry their own margin.
//!
//! `total = fixed.total + variable.total + cogs.total`. Custom revenue modules
//! never add a variable cost; their cost side is the COGS share only.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::{cost::CostEngine, revenue::RevenueEngine};
//! use calc_core::document::Document;
//! use calc_core::formula::FormulaEngine;
//!
//! let doc = Document::sample();
//! let formula = FormulaEngine::from_document(&doc);
//! let revenue = RevenueEngine.calculate(&doc, &formula);
//! let cost = CostEngine.calculate(&doc, &revenue, &formula);
//!
//! assert_eq!(cost.total, cost.fixed.total + cost.variable.total + cost.cogs.total);
//! ```

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::formula::FormulaEngine;
use crate::numeric::{cost_share, finite_or_zero, pct_of, Sanitize};

use super::revenue::RevenueResult;

/// Cost calculator. Stateless.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostEngine;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedCosts {
    pub rent: f64,
    pub property: f64,
    pub staff: f64,
    pub cleaning: f64,
    pub hq_fee: f64,
    pub custom: f64,
    pub total: f64,
}

impl FixedCosts {
    fn sum_lines(&self) -> f64 {
        self.rent + self.property + self.staff + self.cleaning + self.hq_fee + self.custom
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableCosts {
    pub utilities: f64,
    pub misc: f64,
    pub custom: f64,
    pub total: f64,
}

impl VariableCosts {
    fn sum_lines(&self) -> f64 {
        self.utilities + self.misc + self.custom
    }
}

/// Cost of goods sold per revenue line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CogsBreakdown {
    pub members: f64,
    pub boarding: f64,
    pub medical: f64,
    pub retail: f64,
    pub cafe: f64,
    pub custom: f64,
    pub total: f64,
}

impl CogsBreakdown {
    fn sum_lines(&self) -> f64 {
        self.members + self.boarding + self.medical + self.retail + self.cafe + self.custom
    }
}

/// A custom cost module's contribution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLineItem {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub is_fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostResult {
    pub fixed: FixedCosts,
    pub variable: VariableCosts,
    pub cogs: CogsBreakdown,
    pub total: f64,
    /// One entry per enabled custom cost module
    pub custom_items: Vec<CostLineItem>,
}

impl Sanitize for CostResult {
    fn sanitize(self) -> Self {
        let mut fixed = FixedCosts {
            rent: self.fixed.rent.sanitize(),
            property: self.fixed.property.sanitize(),
            staff: self.fixed.staff.sanitize(),
            cleaning: self.fixed.cleaning.sanitize(),
            hq_fee: self.fixed.hq_fee.sanitize(),
            custom: self.fixed.custom.sanitize(),
            total: 0.0,
        };
        fixed.total = finite_or_zero(fixed.sum_lines());

        let mut variable = VariableCosts {
            utilities: self.variable.utilities.sanitize(),
            misc: self.variable.misc.sanitize(),
            custom: self.variable.custom.sanitize(),
            total: 0.0,
        };
        variable.total = finite_or_zero(variable.sum_lines());

        let mut cogs = CogsBreakdown {
            members: self.cogs.members.sanitize(),
            boarding: self.cogs.boarding.sanitize(),
            medical: self.cogs.medical.sanitize(),
            retail: self.cogs.retail.sanitize(),
            cafe: self.cogs.cafe.sanitize(),
            custom: self.cogs.custom.sanitize(),
            total: 0.0,
        };
        cogs.total = finite_or_zero(cogs.sum_lines());

        let total = finite_or_zero(fixed.total + variable.total + cogs.total);
        let custom_items = self
            .custom_items
            .into_iter()
            .map(|mut item| {
                item.amount = finite_or_zero(item.amount);
                item
            })
            .collect();

        CostResult {
            fixed,
            variable,
            cogs,
            total,
            custom_items,
        }
    }
}

impl CostEngine {
    pub fn calculate(&self, doc: &Document, revenue: &RevenueResult, formula: &FormulaEngine) -> CostResult {
        let custom_items: Vec<CostLineItem> = doc
            .cost
            .custom
            .iter()
            .filter(|m| m.enabled)
            .map(|m| CostLineItem {
                id: m.id.clone(),
                name: m.name.clone(),
                amount: finite_or_zero(formula.evaluate(&m.formula, &m.variables)),
                is_fixed: m.is_fixed(),
            })
            .collect();

        let fixed = self.fixed_costs(doc, revenue, &custom_items);
        let variable = self.variable_costs(doc, &custom_items);
        let cogs = self.cogs(doc, revenue);
        let total = finite_or_zero(fixed.total + variable.total + cogs.total);

        tracing::debug!(
            fixed = fixed.total,
            variable = variable.total,
            cogs = cogs.total,
            total,
            "cost calculated"
        );

        CostResult {
            fixed,
            variable,
            cogs,
            total,
            custom_items,
        }
    }

    fn fixed_costs(&self, doc: &Document, revenue: &RevenueResult, custom: &[CostLineItem]) -> FixedCosts {
        let f = &doc.cost.fixed;
        let area = finite_or_zero(doc.basic.area_sqm);

        let mut fixed = FixedCosts {
            rent: finite_or_zero(area * finite_or_zero(f.rent_per_sqm_per_day) * doc.effective_days_per_year()),
            property: finite_or_zero(area * finite_or_zero(f.property_per_sqm_per_month) * 12.0),
            staff: finite_or_zero(finite_or_zero(f.staff_count) * finite_or_zero(f.staff_salary_per_month) * 12.0),
            cleaning: finite_or_zero(f.cleaning_other_fixed),
            hq_fee: pct_of(revenue.total, f.hq_fee_pct_of_revenue),
            custom: sum_custom(custom, true),
            total: 0.0,
        };
        fixed.total = finite_or_zero(fixed.sum_lines());
        fixed
    }

    fn variable_costs(&self, doc: &Document, custom: &[CostLineItem]) -> VariableCosts {
        let v = &doc.cost.variable;
        let mut variable = VariableCosts {
            utilities: finite_or_zero(v.utilities_per_year),
            misc: finite_or_zero(v.misc_variable_annual),
            custom: sum_custom(custom, false),
            total: 0.0,
        };
        variable.total = finite_or_zero(variable.sum_lines());
        variable
    }

    fn cogs(&self, doc: &Document, revenue: &RevenueResult) -> CogsBreakdown {
        let m = &doc.cost.margins;

        // revenue.custom_items holds one amount per enabled module, in module order;
        // each is costed at its module's margin, no margin means all cost
        let custom: f64 = doc
            .revenue
            .custom
            .iter()
            .filter(|module| module.enabled)
            .zip(&revenue.custom_items)
            .map(|(module, item)| cost_share(item.amount, module.margin.unwrap_or(0.0)))
            .sum();

        let mut cogs = CogsBreakdown {
            members: cost_share(revenue.member, m.members),
            boarding: cost_share(revenue.boarding, m.boarding),
            medical: cost_share(revenue.medical, m.medical),
            retail: cost_share(revenue.retail, m.retail),
            cafe: cost_share(revenue.cafe, m.cafe),
            custom: finite_or_zero(custom),
            total: 0.0,
        };
        cogs.total = finite_or_zero(cogs.sum_lines());
        cogs
    }
}

fn sum_custom(items: &[CostLineItem], fixed: bool) -> f64 {
    finite_or_zero(items.iter().filter(|i| i.is_fixed == fixed).map(|i| i.amount).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::revenue::RevenueEngine;
    use crate::document::CustomModule;

    fn run(doc: &Document) -> (RevenueResult, CostResult) {
        let formula = FormulaEngine::from_document(doc);
        let revenue = RevenueEngine.calculate(doc, &formula);
        let cost = CostEngine.calculate(doc, &revenue, &formula);
        (revenue, cost)
    }

    #[test]
    fn test_sample_fixed_costs() {
        let (_, cost) = run(&Document::sample());
        assert!((cost.fixed.rent - 273_750.0).abs() < 1e-6);
        assert!((cost.fixed.property - 140_400.0).abs() < 1e-6);
        assert!((cost.fixed.staff - 1_296_000.0).abs() < 1e-6);
        assert!((cost.fixed.cleaning - 49_275.0).abs() < 1e-6);
        // 8% of total revenue 4,751,100
        assert!((cost.fixed.hq_fee - 380_088.0).abs() < 1e-6);
        assert!((cost.fixed.total - 2_139_513.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_variable_and_cogs() {
        let (_, cost) = run(&Document::sample());
        assert!((cost.variable.total - 288_300.0).abs() < 1e-6);
        assert!((cost.cogs.members - 71_235.0).abs() < 1e-6);
        assert!((cost.cogs.boarding - 122_640.0).abs() < 1e-6);
        assert!((cost.cogs.medical - 432_000.0).abs() < 1e-6);
        assert!((cost.cogs.retail - 231_000.0).abs() < 1e-6);
        assert!((cost.cogs.cafe - 156_000.0).abs() < 1e-6);
        assert!((cost.cogs.total - 1_012_875.0).abs() < 1e-6);
        assert!((cost.total - 3_440_688.0).abs() < 1e-6);
    }

    #[test]
    fn test_member_cogs_from_margin() {
        let mut doc = Document::default();
        doc.revenue.member.count = 1000.0;
        doc.revenue.member.base_pct = 60.0;
        doc.revenue.member.base_price = 2499.0;
        doc.revenue.member.pro_pct = 40.0;
        doc.revenue.member.pro_price = 4999.0;
        doc.cost.margins.members = 95.0;

        let (_, cost) = run(&doc);
        assert!((cost.cogs.members - 174_950.0).abs() < 1e-6);
    }

    #[test]
    fn test_custom_cost_modules_split_fixed_and_variable() {
        let mut doc = Document::default();
        doc.cost.custom.push(CustomModule::cost("保险", true).with_formula("12000"));
        doc.cost.custom.push(CustomModule::cost("耗材", false).with_formula("%1 * 12").with_variable(1, "月耗材", 500.0));
        doc.cost.custom.push(CustomModule::cost("停用", true).with_formula("99999").with_enabled(false));

        let (_, cost) = run(&doc);
        assert_eq!(cost.fixed.custom, 12_000.0);
        assert_eq!(cost.variable.custom, 6_000.0);
        assert_eq!(cost.custom_items.len(), 2);
        assert_eq!(cost.total, 18_000.0);
    }

    #[test]
    fn test_custom_revenue_cogs_uses_module_margin() {
        let mut doc = Document::default();
        doc.revenue.custom.push(CustomModule::revenue("训练").with_formula("100000").with_margin(60.0));
        let mut no_margin = CustomModule::revenue("寄售").with_formula("5000");
        no_margin.margin = None;
        doc.revenue.custom.push(no_margin);
        doc.revenue.custom.push(CustomModule::revenue("停用").with_formula("777").with_enabled(false));

        let (revenue, cost) = run(&doc);
        assert_eq!(revenue.custom, 105_000.0);
        assert!((cost.cogs.custom - 45_000.0).abs() < 1e-9);
        // custom revenue never creates variable cost
        assert_eq!(cost.variable.total, 0.0);
    }

    #[test]
    fn test_custom_revenue_cogs_follows_revenue_amounts() {
        let mut doc = Document::default();
        doc.revenue.custom.push(CustomModule::revenue("停用").with_formula("1").with_enabled(false));
        doc.revenue.custom.push(CustomModule::revenue("美容").with_formula("%1 * 12").with_variable(1, "月收入", 5000.0).with_margin(50.0));

        let formula = FormulaEngine::from_document(&doc);
        let mut revenue = RevenueEngine.calculate(&doc, &formula);
        assert_eq!(revenue.custom_items.len(), 1);
        assert_eq!(revenue.custom_items[0].amount, 60_000.0);

        revenue.custom_items[0].amount = 10_000.0;
        let cost = CostEngine.calculate(&doc, &revenue, &formula);
        assert!((cost.cogs.custom - 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_hq_fee_uses_total_revenue() {
        let mut doc = Document::default();
        doc.revenue.medical.monthly_revenue = 1000.0;
        doc.revenue.retail.monthly_revenue = 1000.0;
        doc.cost.fixed.hq_fee_pct_of_revenue = 10.0;
        let (_, cost) = run(&doc);
        assert!((cost.fixed.hq_fee - 2_400.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_document_costs_zero() {
        let (_, cost) = run(&Document::default());
        assert_eq!(cost, CostResult::default());
    }
}
