//! # Document Validation
//!
//! Advisory checks run by callers before or after an edit. Validation never
//! blocks a calculation; the pipeline always proceeds with whatever values are
//! present. Only import rejects a document whose report carries errors.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::document::Document;
//! use calc_core::validation::validate;
//!
//! let mut doc = Document::sample();
//! doc.revenue.member.base_pct = 90.0;
//!
//! let report = validate(&doc);
//! assert!(!report.is_valid);
//! assert!(report.errors[0].contains("会员类型占比"));
//! ```

use serde::{Deserialize, Serialize};

use crate::document::{CustomModule, Document};
use crate::formula::FormulaEngine;

/// Outcome of [`validate`]. `is_valid` is false only when `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

const PCT_TOLERANCE: f64 = 1e-9;

/// Check a document for impossible or suspicious values.
pub fn validate(doc: &Document) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let pct_sum = doc.revenue.member.pct_sum();
    if pct_sum > 100.0 + PCT_TOLERANCE {
        errors.push(format!("会员类型占比总和不能超过100%（当前 {:.1}%）", pct_sum));
    } else if pct_sum < 100.0 - PCT_TOLERANCE && doc.revenue.member.count > 0.0 {
        warnings.push(format!("会员类型占比总和不足100%（当前 {:.1}%）", pct_sum));
    }

    let non_negative = [
        ("basic.areaSqm", "门店面积", doc.basic.area_sqm),
        ("basic.daysPerYear", "年营业天数", doc.basic.days_per_year),
        ("revenue.member.count", "会员数量", doc.revenue.member.count),
        ("revenue.boarding.rooms", "寄养房间数", doc.revenue.boarding.rooms),
        ("cost.fixed.staffCount", "员工人数", doc.cost.fixed.staff_count),
    ];
    for (path, label, value) in non_negative {
        if !value.is_finite() {
            errors.push(format!("{}（{}）不是有效数字", label, path));
        } else if value < 0.0 {
            errors.push(format!("{}（{}）不能为负数", label, path));
        }
    }

    let occ = doc.revenue.boarding.occ;
    if !(0.0..=100.0).contains(&occ) {
        warnings.push(format!("寄养入住率应在0-100%之间（当前 {}）", occ));
    }

    let m = &doc.cost.margins;
    let margins = [
        ("会员", m.members),
        ("寄养", m.boarding),
        ("医疗", m.medical),
        ("零售", m.retail),
        ("餐饮", m.cafe),
    ];
    for (label, margin) in margins {
        if !(0.0..=100.0).contains(&margin) {
            warnings.push(format!("{}毛利率应在0-100%之间（当前 {}）", label, margin));
        }
    }

    let formula = FormulaEngine::from_document(doc);
    check_modules(&formula, "收入", &doc.revenue.custom, &mut warnings);
    check_modules(&formula, "成本", &doc.cost.custom, &mut warnings);

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), warnings = warnings.len(), "document failed validation");
    }
    ValidationReport::from_findings(errors, warnings)
}

fn check_modules(formula: &FormulaEngine, kind: &str, modules: &[CustomModule], warnings: &mut Vec<String>) {
    for module in modules.iter().filter(|m| m.enabled) {
        let check = formula.validate_formula(&module.formula, &module.variables);
        if !check.is_valid {
            warnings.push(format!(
                "自定义{}模块「{}」公式无效：{}",
                kind,
                module.name,
                check.error.unwrap_or_default()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_is_valid() {
        let report = validate(&Document::sample());
        assert_eq!(
            report,
            ValidationReport {
                is_valid: true,
                errors: vec![],
                warnings: vec![],
            }
        );
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate(&Document::default()).is_valid);
    }

    #[test]
    fn test_percentage_sum() {
        let mut doc = Document::sample();
        doc.revenue.member.base_pct = 10.0;
        doc.revenue.member.pro_pct = 10.0;
        doc.revenue.member.vip_pct = 10.0;
        let report = validate(&doc);
        assert!(report.is_valid);
        assert!(report.warnings[0].contains("不足100%"));
    }

    #[test]
    fn test_negative_and_non_finite_fields() {
        let mut doc = Document::sample();
        doc.basic.area_sqm = -1.0;
        doc.cost.fixed.staff_count = f64::NAN;
        let report = validate(&doc);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("basic.areaSqm"));
        assert!(report.errors[1].contains("cost.fixed.staffCount"));
    }

    #[test]
    fn test_ranges_are_warnings() {
        let mut doc = Document::sample();
        doc.revenue.boarding.occ = 120.0;
        doc.cost.margins.cafe = -5.0;
        let report = validate(&doc);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_invalid_formula_warns_only_when_enabled() {
        let mut doc = Document::sample();
        doc.revenue.custom.push(CustomModule::revenue("坏公式").with_formula("1 + unknownVar"));
        doc.cost.custom.push(CustomModule::cost("停用", true).with_formula("((").with_enabled(false));
        let report = validate(&doc);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("坏公式"));
        assert!(report.warnings[0].contains("unknownVar"));
    }
}
