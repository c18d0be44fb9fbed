//! # Revenue Engine
//!
//! Annual revenue per business line:
//!
//! | Line     | Formula                                                  |
//! |----------|----------------------------------------------------------|
//! | member   | Σ tier (count × pct / 100) × price                       |
//! | boarding | rooms × adr × daysPerYear × clamp(occ, 0, 100) / 100     |
//! | medical  | monthlyRevenue × 12 (same for retail and cafe)           |
//! | custom   | Σ enabled custom modules, each priced by its formula     |
//!
//! Tier percentages are used literally; they are not normalized to 100.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculations::revenue::RevenueEngine;
//! use calc_core::document::Document;
//! use calc_core::formula::FormulaEngine;
//!
//! let mut doc = Document::default();
//! doc.revenue.boarding.rooms = 20.0;
//! doc.revenue.boarding.adr = 400.0;
//! doc.revenue.boarding.occ = 70.0;
//!
//! let result = RevenueEngine.calculate(&doc, &FormulaEngine::from_document(&doc));
//! assert!((result.boarding - 2_044_000.0).abs() < 1e-6);
//! assert_eq!(result.total, result.boarding);
//! ```

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::formula::FormulaEngine;
use crate::numeric::{finite_or_zero, pct_of, Sanitize};

/// Revenue calculator. Stateless.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevenueEngine;

/// Annual revenue by line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueResult {
    pub member: f64,
    pub boarding: f64,
    pub medical: f64,
    pub retail: f64,
    pub cafe: f64,
    /// Sum of enabled custom revenue modules
    pub custom: f64,
    pub total: f64,
    /// One entry per enabled custom module
    pub custom_items: Vec<LineItem>,
}

/// A custom module's contribution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub amount: f64,
}

impl RevenueResult {
    /// `(label, amount)` for the five built-in lines, in display order.
    pub fn builtin_lines(&self) -> [(&'static str, f64); 5] {
        [
            ("会员收入", self.member),
            ("寄养收入", self.boarding),
            ("医疗收入", self.medical),
            ("零售收入", self.retail),
            ("餐饮收入", self.cafe),
        ]
    }

    fn sum_lines(&self) -> f64 {
        self.member + self.boarding + self.medical + self.retail + self.cafe + self.custom
    }
}

impl Sanitize for LineItem {
    fn sanitize(mut self) -> Self {
        self.amount = finite_or_zero(self.amount);
        self
    }
}

impl Sanitize for RevenueResult {
    fn sanitize(self) -> Self {
        let mut r = RevenueResult {
            member: self.member.sanitize(),
            boarding: self.boarding.sanitize(),
            medical: self.medical.sanitize(),
            retail: self.retail.sanitize(),
            cafe: self.cafe.sanitize(),
            custom: self.custom.sanitize(),
            total: 0.0,
            custom_items: self.custom_items.sanitize(),
        };
        r.total = finite_or_zero(r.sum_lines());
        r
    }
}

impl RevenueEngine {
    pub fn calculate(&self, doc: &Document, formula: &FormulaEngine) -> RevenueResult {
        let member = self.member_revenue(doc);
        let boarding = self.boarding_revenue(doc);
        let medical = annualize(doc.revenue.medical.monthly_revenue);
        let retail = annualize(doc.revenue.retail.monthly_revenue);
        let cafe = annualize(doc.revenue.cafe.monthly_revenue);

        let custom_items: Vec<LineItem> = doc
            .revenue
            .custom
            .iter()
            .filter(|m| m.enabled)
            .map(|m| LineItem {
                id: m.id.clone(),
                name: m.name.clone(),
                amount: finite_or_zero(formula.evaluate(&m.formula, &m.variables)),
            })
            .collect();
        let custom = finite_or_zero(custom_items.iter().map(|i| i.amount).sum());

        let mut result = RevenueResult {
            member,
            boarding,
            medical,
            retail,
            cafe,
            custom,
            total: 0.0,
            custom_items,
        };
        result.total = finite_or_zero(result.sum_lines());

        tracing::debug!(total = result.total, custom = result.custom, "revenue calculated");
        result
    }

    /// Σ over tiers of `(count × pct / 100) × price`.
    pub fn member_revenue(&self, doc: &Document) -> f64 {
        let m = &doc.revenue.member;
        let tiers = [
            (m.base_pct, m.base_price),
            (m.pro_pct, m.pro_price),
            (m.vip_pct, m.vip_price),
        ];
        let total: f64 = tiers
            .iter()
            .map(|&(pct, price)| finite_or_zero(pct_of(m.count, pct) * finite_or_zero(price)))
            .sum();
        finite_or_zero(total)
    }

    /// Rooms × ADR × operating days × occupancy, with occupancy clamped to 0-100.
    pub fn boarding_revenue(&self, doc: &Document) -> f64 {
        let b = &doc.revenue.boarding;
        let occupancy = finite_or_zero(b.occ).clamp(0.0, 100.0);
        let room_nights = finite_or_zero(b.rooms) * finite_or_zero(b.adr) * doc.effective_days_per_year();
        pct_of(room_nights, occupancy)
    }
}

fn annualize(monthly: f64) -> f64 {
    finite_or_zero(finite_or_zero(monthly) * 12.0)
}
