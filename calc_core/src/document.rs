//! # Document Data Structures
//!
//! The [`Document`] is the complete set of user-editable business assumptions.
//! It serializes to camelCase JSON so files exported by the browser version of
//! the model load unchanged.
//!
//! ## Structure
//!
//! ```text
//! Document
//! ├── basic: BasicInfo (currency, project name, area, operating days)
//! ├── revenue: RevenueParams (member, boarding, medical, retail, cafe, custom[])
//! ├── cost: CostParams (fixed, variable, margins, custom[])
//! ├── investment: InvestmentParams (fit-out, medical equipment, customInvestments[])
//! └── scenario: ScenarioFactors (revenue/cost multipliers, in percent)
//! ```
//!
//! ## Lenient input
//!
//! Deserialization never rejects a JSON object. Missing fields take the
//! `Default` value, numeric leaves accept numbers, numeric strings and
//! booleans (anything else becomes 0), and a block of the wrong shape is
//! replaced by its default.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::document::Document;
//! use serde_json::json;
//!
//! let doc = Document::sample();
//! let edited = doc.with_value("revenue.member.count", json!(450)).unwrap();
//!
//! assert_eq!(doc.revenue.member.count, 300.0); // original untouched
//! assert_eq!(edited.revenue.member.count, 450.0);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{CalcError, CalcResult};
use crate::numeric::finite_or_zero;

/// Operating days used when `basic.daysPerYear` is missing, zero or invalid.
pub const DEFAULT_DAYS_PER_YEAR: f64 = 365.0;

/// Number of positional variables (`%1`..`%4`) a custom module carries.
pub const CUSTOM_VARIABLE_SLOTS: usize = 4;

/// Root input document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Document {
    #[serde(deserialize_with = "lenient::section")]
    pub basic: BasicInfo,

    #[serde(deserialize_with = "lenient::section")]
    pub revenue: RevenueParams,

    #[serde(deserialize_with = "lenient::section")]
    pub cost: CostParams,

    #[serde(deserialize_with = "lenient::section")]
    pub investment: InvestmentParams,

    #[serde(deserialize_with = "lenient::section")]
    pub scenario: ScenarioFactors,
}

impl Document {
    /// The shipped example business, used to back-fill stored and imported
    /// documents.
    pub fn sample() -> Self {
        Document {
            basic: BasicInfo {
                currency: "¥".to_string(),
                project_name: "Hopeful 宠物综合体（示例）".to_string(),
                area_sqm: 300.0,
                days_per_year: 365.0,
            },
            revenue: RevenueParams {
                member: MemberParams {
                    count: 300.0,
                    base_pct: 60.0,
                    base_price: 2499.0,
                    pro_pct: 35.0,
                    pro_price: 4999.0,
                    vip_pct: 5.0,
                    vip_price: 29999.0,
                    note: String::new(),
                },
                boarding: BoardingParams {
                    rooms: 12.0,
                    adr: 400.0,
                    occ: 70.0,
                    note: String::new(),
                },
                medical: MonthlyRevenue::new(120_000.0),
                retail: MonthlyRevenue::new(35_000.0),
                cafe: MonthlyRevenue::new(20_000.0),
                custom: Vec::new(),
            },
            cost: CostParams {
                fixed: FixedCostParams {
                    rent_per_sqm_per_day: 2.5,
                    property_per_sqm_per_month: 39.0,
                    cleaning_other_fixed: 49_275.0,
                    staff_count: 9.0,
                    staff_salary_per_month: 12_000.0,
                    hq_fee_pct_of_revenue: 8.0,
                },
                variable: VariableCostParams {
                    utilities_per_year: 240_000.0,
                    misc_variable_annual: 48_300.0,
                },
                margins: GrossMargins {
                    members: 95.0,
                    boarding: 90.0,
                    medical: 70.0,
                    retail: 45.0,
                    cafe: 35.0,
                },
                custom: Vec::new(),
            },
            investment: InvestmentParams {
                fitout_standard: 7000.0,
                medical_initial: 600_000.0,
                custom_investments: Vec::new(),
            },
            scenario: ScenarioFactors::default(),
        }
    }

    /// Build a document from arbitrary JSON, sanitizing numeric leaves.
    ///
    /// Fails only when `value` is not a JSON object.
    pub fn from_value(value: Value) -> CalcResult<Self> {
        if !value.is_object() {
            return Err(CalcError::invalid_input(
                "document",
                value_kind(&value),
                "Document must be a JSON object",
            ));
        }
        let doc: Document = serde_json::from_value(value)?;
        Ok(doc.sanitized())
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> CalcResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Read the leaf (or subtree) at a dotted path such as
    /// `"cost.fixed.staffCount"` or `"revenue.custom.0.formula"`.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        let mut current = serde_json::to_value(self).ok()?;
        for key in path.split('.') {
            current = match current {
                Value::Object(mut map) => map.remove(key)?,
                Value::Array(mut items) => {
                    let index: usize = key.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Return a new document with the leaf at `path` replaced by `value`.
    ///
    /// Missing intermediate objects are created. `self` is never modified.
    pub fn with_value(&self, path: &str, value: Value) -> CalcResult<Document> {
        let keys: Vec<&str> = path.split('.').collect();
        if path.trim().is_empty() || keys.iter().any(|k| k.is_empty()) {
            return Err(CalcError::invalid_input("path", path, "Path must be a dotted field name"));
        }

        let mut root = self.to_value()?;
        let (last, parents) = keys
            .split_last()
            .ok_or_else(|| CalcError::invalid_input("path", path, "Path is empty"))?;

        let mut current = &mut root;
        for key in parents {
            current = match current {
                Value::Object(map) => map
                    .entry((*key).to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let index = parse_index(path, key, items.len())?;
                    &mut items[index]
                }
                other => {
                    return Err(CalcError::invalid_input(
                        "path",
                        path,
                        format!("'{}' is a {}, not a container", key, value_kind(other)),
                    ))
                }
            };
        }

        match current {
            Value::Object(map) => {
                map.insert((*last).to_string(), value);
            }
            Value::Array(items) => {
                let index = parse_index(path, last, items.len())?;
                items[index] = value;
            }
            other => {
                return Err(CalcError::invalid_input(
                    "path",
                    path,
                    format!("parent of '{}' is a {}", last, value_kind(other)),
                ))
            }
        }

        Document::from_value(root)
    }

    /// Copy with every non-finite numeric leaf replaced by 0.
    pub fn sanitized(&self) -> Document {
        let mut doc = self.clone();

        let b = &mut doc.basic;
        b.area_sqm = finite_or_zero(b.area_sqm);
        b.days_per_year = finite_or_zero(b.days_per_year);

        let m = &mut doc.revenue.member;
        for v in [
            &mut m.count,
            &mut m.base_pct,
            &mut m.base_price,
            &mut m.pro_pct,
            &mut m.pro_price,
            &mut m.vip_pct,
            &mut m.vip_price,
        ] {
            *v = finite_or_zero(*v);
        }
        let bd = &mut doc.revenue.boarding;
        for v in [&mut bd.rooms, &mut bd.adr, &mut bd.occ] {
            *v = finite_or_zero(*v);
        }
        for line in [
            &mut doc.revenue.medical,
            &mut doc.revenue.retail,
            &mut doc.revenue.cafe,
        ] {
            line.monthly_revenue = finite_or_zero(line.monthly_revenue);
        }

        let f = &mut doc.cost.fixed;
        for v in [
            &mut f.rent_per_sqm_per_day,
            &mut f.property_per_sqm_per_month,
            &mut f.cleaning_other_fixed,
            &mut f.staff_count,
            &mut f.staff_salary_per_month,
            &mut f.hq_fee_pct_of_revenue,
        ] {
            *v = finite_or_zero(*v);
        }
        let vc = &mut doc.cost.variable;
        vc.utilities_per_year = finite_or_zero(vc.utilities_per_year);
        vc.misc_variable_annual = finite_or_zero(vc.misc_variable_annual);
        let mg = &mut doc.cost.margins;
        for v in [
            &mut mg.members,
            &mut mg.boarding,
            &mut mg.medical,
            &mut mg.retail,
            &mut mg.cafe,
        ] {
            *v = finite_or_zero(*v);
        }

        for module in doc.revenue.custom.iter_mut().chain(doc.cost.custom.iter_mut()) {
            for var in &mut module.variables {
                var.value = finite_or_zero(var.value);
            }
            module.margin = module.margin.map(finite_or_zero);
        }

        let inv = &mut doc.investment;
        inv.fitout_standard = finite_or_zero(inv.fitout_standard);
        inv.medical_initial = finite_or_zero(inv.medical_initial);
        for item in &mut inv.custom_investments {
            item.value = finite_or_zero(item.value);
        }

        let s = &mut doc.scenario;
        for v in [
            &mut s.optimistic_revenue_factor,
            &mut s.optimistic_cost_factor,
            &mut s.conservative_revenue_factor,
            &mut s.conservative_cost_factor,
            &mut s.pessimistic_revenue_factor,
            &mut s.pessimistic_cost_factor,
        ] {
            *v = finite_or_zero(*v);
        }

        doc
    }

    /// Operating days with the 365 fallback applied.
    pub fn effective_days_per_year(&self) -> f64 {
        crate::numeric::positive_or(self.basic.days_per_year, DEFAULT_DAYS_PER_YEAR)
    }

    /// Counts of custom revenue/cost modules and investment items.
    pub fn module_stats(&self) -> ModuleStats {
        let revenue = &self.revenue.custom;
        let cost = &self.cost.custom;
        let enabled_revenue = revenue.iter().filter(|m| m.enabled).count();
        let enabled_cost = cost.iter().filter(|m| m.enabled).count();
        let fixed_cost = cost.iter().filter(|m| m.is_fixed()).count();

        ModuleStats {
            revenue_total: revenue.len(),
            revenue_enabled: enabled_revenue,
            revenue_disabled: revenue.len() - enabled_revenue,
            cost_total: cost.len(),
            cost_enabled: enabled_cost,
            cost_disabled: cost.len() - enabled_cost,
            cost_fixed: fixed_cost,
            cost_variable: cost.len() - fixed_cost,
            investment_items: self.investment.custom_investments.len(),
        }
    }
}

fn parse_index(path: &str, key: &str, len: usize) -> CalcResult<usize> {
    match key.parse::<usize>() {
        Ok(index) if index < len => Ok(index),
        _ => Err(CalcError::invalid_input(
            "path",
            path,
            format!("'{}' is not a valid index (length {})", key, len),
        )),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Project-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BasicInfo {
    /// Currency symbol (display label only)
    #[serde(deserialize_with = "lenient::string")]
    pub currency: String,

    #[serde(deserialize_with = "lenient::string")]
    pub project_name: String,

    /// Operating area in ㎡
    #[serde(deserialize_with = "lenient::number")]
    pub area_sqm: f64,

    /// Operating days per year (365 when zero or missing)
    #[serde(deserialize_with = "lenient::number")]
    pub days_per_year: f64,
}

impl Default for BasicInfo {
    fn default() -> Self {
        BasicInfo {
            currency: "¥".to_string(),
            project_name: String::new(),
            area_sqm: 0.0,
            days_per_year: DEFAULT_DAYS_PER_YEAR,
        }
    }
}

/// Revenue assumptions per business line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RevenueParams {
    #[serde(deserialize_with = "lenient::section")]
    pub member: MemberParams,
    #[serde(deserialize_with = "lenient::section")]
    pub boarding: BoardingParams,
    #[serde(deserialize_with = "lenient::section")]
    pub medical: MonthlyRevenue,
    #[serde(deserialize_with = "lenient::section")]
    pub retail: MonthlyRevenue,
    #[serde(deserialize_with = "lenient::section")]
    pub cafe: MonthlyRevenue,
    /// User-defined revenue line items
    #[serde(deserialize_with = "lenient::list")]
    pub custom: Vec<CustomModule>,
}

/// Membership tiers. Percentages are 0-100 of `count` and are not required
/// to sum to 100.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberParams {
    #[serde(deserialize_with = "lenient::number")]
    pub count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub base_pct: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub base_price: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub pro_pct: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub pro_price: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub vip_pct: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub vip_price: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
}

impl MemberParams {
    /// Sum of the three tier percentages.
    pub fn pct_sum(&self) -> f64 {
        finite_or_zero(self.base_pct) + finite_or_zero(self.pro_pct) + finite_or_zero(self.vip_pct)
    }
}

/// Pet boarding rooms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoardingParams {
    #[serde(deserialize_with = "lenient::number")]
    pub rooms: f64,
    /// Average daily rate per room
    #[serde(deserialize_with = "lenient::number")]
    pub adr: f64,
    /// Occupancy percent (clamped to 0-100 when used)
    #[serde(deserialize_with = "lenient::number")]
    pub occ: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
}

/// A business line modelled as a flat monthly revenue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonthlyRevenue {
    #[serde(deserialize_with = "lenient::number")]
    pub monthly_revenue: f64,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
}

impl MonthlyRevenue {
    pub fn new(monthly_revenue: f64) -> Self {
        MonthlyRevenue {
            monthly_revenue,
            note: String::new(),
        }
    }
}

/// Cost assumptions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostParams {
    #[serde(deserialize_with = "lenient::section")]
    pub fixed: FixedCostParams,
    #[serde(deserialize_with = "lenient::section")]
    pub variable: VariableCostParams,
    #[serde(deserialize_with = "lenient::section")]
    pub margins: GrossMargins,
    /// User-defined cost line items (fixed or variable via `isFixed`)
    #[serde(deserialize_with = "lenient::list")]
    pub custom: Vec<CustomModule>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixedCostParams {
    #[serde(deserialize_with = "lenient::number")]
    pub rent_per_sqm_per_day: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub property_per_sqm_per_month: f64,
    /// Annual cleaning and other fixed overhead (absolute)
    #[serde(deserialize_with = "lenient::number")]
    pub cleaning_other_fixed: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub staff_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub staff_salary_per_month: f64,
    /// Headquarters fee as a percent of total revenue
    #[serde(deserialize_with = "lenient::number")]
    pub hq_fee_pct_of_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariableCostParams {
    #[serde(deserialize_with = "lenient::number")]
    pub utilities_per_year: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub misc_variable_annual: f64,
}

/// Gross margin percent (0-100) retained by each revenue line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrossMargins {
    #[serde(deserialize_with = "lenient::number")]
    pub members: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub boarding: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub medical: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub retail: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub cafe: f64,
}

/// Capital investment assumptions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestmentParams {
    /// Fit-out cost per ㎡
    #[serde(deserialize_with = "lenient::number")]
    pub fitout_standard: f64,
    /// Initial medical equipment outlay (absolute)
    #[serde(deserialize_with = "lenient::number")]
    pub medical_initial: f64,
    #[serde(deserialize_with = "lenient::list")]
    pub custom_investments: Vec<CustomInvestment>,
}

/// A named one-off investment. `value` is in units of 10,000 currency.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomInvestment {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::number")]
    pub value: f64,
}

impl CustomInvestment {
    pub fn new(name: impl Into<String>, value_10k: f64) -> Self {
        CustomInvestment {
            name: name.into(),
            value: value_10k,
        }
    }
}

/// Scenario multipliers, in percent (120 = ×1.20). Applied to total revenue
/// and to variable cost only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioFactors {
    #[serde(deserialize_with = "lenient::number")]
    pub optimistic_revenue_factor: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub optimistic_cost_factor: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub conservative_revenue_factor: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub conservative_cost_factor: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub pessimistic_revenue_factor: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub pessimistic_cost_factor: f64,
}

impl Default for ScenarioFactors {
    fn default() -> Self {
        ScenarioFactors {
            optimistic_revenue_factor: 120.0,
            optimistic_cost_factor: 95.0,
            conservative_revenue_factor: 90.0,
            conservative_cost_factor: 105.0,
            pessimistic_revenue_factor: 80.0,
            pessimistic_cost_factor: 110.0,
        }
    }
}

impl ScenarioFactors {
    /// Replace every zero or non-finite factor with the matching one from
    /// `defaults`.
    pub fn resolved_against(&self, defaults: &ScenarioFactors) -> ScenarioFactors {
        let pick = |value: f64, fallback: f64| {
            if value.is_finite() && value != 0.0 {
                value
            } else {
                fallback
            }
        };
        ScenarioFactors {
            optimistic_revenue_factor: pick(self.optimistic_revenue_factor, defaults.optimistic_revenue_factor),
            optimistic_cost_factor: pick(self.optimistic_cost_factor, defaults.optimistic_cost_factor),
            conservative_revenue_factor: pick(self.conservative_revenue_factor, defaults.conservative_revenue_factor),
            conservative_cost_factor: pick(self.conservative_cost_factor, defaults.conservative_cost_factor),
            pessimistic_revenue_factor: pick(self.pessimistic_revenue_factor, defaults.pessimistic_revenue_factor),
            pessimistic_cost_factor: pick(self.pessimistic_cost_factor, defaults.pessimistic_cost_factor),
        }
    }
}

/// A positional variable bound to `%1`..`%4` in a custom formula.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaVariable {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::number")]
    pub value: f64,
}

impl FormulaVariable {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        FormulaVariable {
            name: name.into(),
            value,
        }
    }
}

/// A user-authored revenue or cost line item.
///
/// `is_fixed` only matters for cost modules and `margin` (gross margin %)
/// only for revenue modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomModule {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub formula: String,
    #[serde(deserialize_with = "lenient::list")]
    pub variables: Vec<FormulaVariable>,
    /// Anything but an explicit `false` counts as enabled
    #[serde(deserialize_with = "lenient::enabled")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient::string")]
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::optional_flag")]
    pub is_fixed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient::optional_number")]
    pub margin: Option<f64>,
}

impl Default for CustomModule {
    fn default() -> Self {
        CustomModule {
            id: String::new(),
            name: String::new(),
            formula: String::new(),
            variables: default_variables(),
            enabled: true,
            note: String::new(),
            is_fixed: None,
            margin: None,
        }
    }
}

fn default_variables() -> Vec<FormulaVariable> {
    (1..=CUSTOM_VARIABLE_SLOTS)
        .map(|i| FormulaVariable::new(format!("变量{}", i), 0.0))
        .collect()
}

impl CustomModule {
    /// New custom revenue module with an 80% gross margin.
    pub fn revenue(name: impl Into<String>) -> Self {
        CustomModule {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            margin: Some(80.0),
            ..CustomModule::default()
        }
    }

    /// New custom cost module.
    pub fn cost(name: impl Into<String>, is_fixed: bool) -> Self {
        CustomModule {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            is_fixed: Some(is_fixed),
            ..CustomModule::default()
        }
    }

    /// Set the formula (builder style).
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    /// Bind positional slot `slot` (1-based, `%slot`) to `value`.
    ///
    /// Slots beyond the current list are padded with zero-valued variables.
    pub fn with_variable(mut self, slot: usize, name: impl Into<String>, value: f64) -> Self {
        if slot == 0 {
            return self;
        }
        while self.variables.len() < slot {
            let n = self.variables.len() + 1;
            self.variables.push(FormulaVariable::new(format!("变量{}", n), 0.0));
        }
        self.variables[slot - 1] = FormulaVariable::new(name, value);
        self
    }

    /// Set the gross margin percent (revenue modules).
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Enable or disable the module.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether a cost module is a fixed cost (defaults to variable).
    pub fn is_fixed(&self) -> bool {
        self.is_fixed.unwrap_or(false)
    }
}

/// Module counts reported to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStats {
    pub revenue_total: usize,
    pub revenue_enabled: usize,
    pub revenue_disabled: usize,
    pub cost_total: usize,
    pub cost_enabled: usize,
    pub cost_disabled: usize,
    pub cost_fixed: usize,
    pub cost_variable: usize,
    pub investment_items: usize,
}

/// Deserializers that never reject a leaf.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn coerce_number(value: &Value) -> f64 {
        let n = match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Value::Bool(true) => 1.0,
            _ => 0.0,
        };
        if n.is_finite() {
            n
        } else {
            0.0
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(coerce_number(&value))
    }

    pub fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Null => None,
            other => Some(coerce_number(&other)),
        })
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    pub fn enabled<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(!matches!(value, Value::Bool(false)))
    }

    pub fn optional_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Null => None,
            Value::Bool(b) => Some(b),
            Value::Number(n) => Some(n.as_f64().map_or(false, |f| f != 0.0)),
            Value::String(s) => Some(!s.is_empty()),
            _ => Some(true),
        })
    }

    pub fn section<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(d)?;
        match value {
            Value::Object(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
            _ => Ok(T::default()),
        }
    }

    /// Non-arrays become empty; elements that are not objects are dropped.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(d)?;
        let Value::Array(items) = value else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sample_document() {
        let doc = Document::sample();
        assert_eq!(doc.basic.area_sqm, 300.0);
        assert_eq!(doc.revenue.member.pct_sum(), 100.0);
        assert_eq!(doc.cost.margins.members, 95.0);
        assert_eq!(doc.scenario, ScenarioFactors::default());
    }

    #[test]
    fn test_camel_case_serialization() {
        let json = serde_json::to_string(&Document::sample()).unwrap();
        assert!(json.contains("\"areaSqm\":300.0"));
        assert!(json.contains("\"hqFeePctOfRevenue\":8.0"));
        assert!(json.contains("\"customInvestments\":[]"));
        assert!(json.contains("\"optimisticRevenueFactor\":120.0"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let doc: Document = serde_json::from_value(json!({
            "basic": { "areaSqm": 120 },
            "revenue": { "member": { "count": 10 } }
        }))
        .unwrap();
        assert_eq!(doc.basic.area_sqm, 120.0);
        assert_eq!(doc.basic.days_per_year, 365.0);
        assert_eq!(doc.revenue.member.count, 10.0);
        assert_eq!(doc.revenue.member.base_price, 0.0);
        assert_eq!(doc.scenario.pessimistic_cost_factor, 110.0);
    }

    #[test]
    fn test_lenient_leaves() {
        let doc: Document = serde_json::from_value(json!({
            "basic": { "areaSqm": "250.5", "daysPerYear": null, "projectName": 42 },
            "revenue": {
                "member": "not an object",
                "boarding": { "rooms": true, "adr": "abc", "occ": [1, 2] },
                "custom": "nope"
            },
            "cost": { "custom": [null, 3, { "formula": "1+1" }] }
        }))
        .unwrap();
        assert_eq!(doc.basic.area_sqm, 250.5);
        assert_eq!(doc.basic.days_per_year, 0.0);
        assert_eq!(doc.effective_days_per_year(), 365.0);
        assert_eq!(doc.basic.project_name, "42");
        assert_eq!(doc.revenue.member, MemberParams::default());
        assert_eq!(doc.revenue.boarding.rooms, 1.0);
        assert_eq!(doc.revenue.boarding.adr, 0.0);
        assert_eq!(doc.revenue.boarding.occ, 0.0);
        assert!(doc.revenue.custom.is_empty());
        assert_eq!(doc.cost.custom.len(), 1);
        assert!(doc.cost.custom[0].enabled);
    }

    #[test]
    fn test_nan_string_is_zero() {
        let doc: Document = serde_json::from_value(json!({ "basic": { "areaSqm": "NaN" } })).unwrap();
        assert_eq!(doc.basic.area_sqm, 0.0);
    }

    #[test]
    fn test_custom_module_flags() {
        let module: CustomModule = serde_json::from_value(json!({
            "name": "洗护",
            "formula": "%1 * %2",
            "enabled": 0,
            "isFixed": 1,
            "margin": "60"
        }))
        .unwrap();
        // only a literal false disables
        assert!(module.enabled);
        assert!(module.is_fixed());
        assert_eq!(module.margin, Some(60.0));

        let off: CustomModule = serde_json::from_value(json!({ "enabled": false })).unwrap();
        assert!(!off.enabled);
        assert!(!off.is_fixed());
    }

    #[test]
    fn test_with_value_is_immutable() {
        let doc = Document::sample();
        let edited = doc.with_value("cost.fixed.staffCount", json!(12)).unwrap();
        assert_eq!(doc.cost.fixed.staff_count, 9.0);
        assert_eq!(edited.cost.fixed.staff_count, 12.0);
        assert_eq!(edited.value_at("cost.fixed.staffCount"), Some(json!(12.0)));
    }

    #[test]
    fn test_with_value_array_index() {
        let mut doc = Document::sample();
        doc.revenue.custom.push(CustomModule::revenue("美容"));
        let edited = doc.with_value("revenue.custom.0.formula", json!("%1 * 12")).unwrap();
        assert_eq!(edited.revenue.custom[0].formula, "%1 * 12");

        let err = doc.with_value("revenue.custom.5.formula", json!("1")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_with_value_rejects_bad_paths() {
        let doc = Document::sample();
        assert!(doc.with_value("", json!(1)).is_err());
        assert!(doc.with_value("basic..areaSqm", json!(1)).is_err());
        assert!(doc.with_value("basic.areaSqm.inner", json!(1)).is_err());
    }

    #[test]
    fn test_with_value_creates_missing_objects() {
        let doc = Document::default();
        let edited = doc.with_value("scenario.optimisticRevenueFactor", json!(130)).unwrap();
        assert_eq!(edited.scenario.optimistic_revenue_factor, 130.0);
    }

    #[test]
    fn test_sanitized_clears_non_finite() {
        let mut doc = Document::sample();
        doc.basic.area_sqm = f64::NAN;
        doc.cost.fixed.staff_count = f64::INFINITY;
        doc.revenue.custom.push(CustomModule::revenue("x").with_variable(1, "a", f64::NAN));
        let clean = doc.sanitized();
        assert_eq!(clean.basic.area_sqm, 0.0);
        assert_eq!(clean.cost.fixed.staff_count, 0.0);
        assert_eq!(clean.revenue.custom[0].variables[0].value, 0.0);
    }

    #[test]
    fn test_custom_module_builders() {
        let module = CustomModule::revenue("训练课").with_formula("%1 * %2").with_variable(2, "单价", 300.0);
        assert_eq!(module.variables.len(), 4);
        assert_eq!(module.variables[1].value, 300.0);
        assert_eq!(module.margin, Some(80.0));
        assert!(!module.id.is_empty());

        let cost = CustomModule::cost("保险", true);
        assert!(cost.is_fixed());
        assert!(cost.margin.is_none());
    }

    #[test]
    fn test_module_stats() {
        let mut doc = Document::sample();
        doc.revenue.custom.push(CustomModule::revenue("a"));
        doc.revenue.custom.push(CustomModule::revenue("b").with_enabled(false));
        doc.cost.custom.push(CustomModule::cost("c", true));
        doc.investment.custom_investments.push(CustomInvestment::new("设备", 5.0));

        let stats = doc.module_stats();
        assert_eq!(stats.revenue_total, 2);
        assert_eq!(stats.revenue_enabled, 1);
        assert_eq!(stats.revenue_disabled, 1);
        assert_eq!(stats.cost_fixed, 1);
        assert_eq!(stats.cost_variable, 0);
        assert_eq!(stats.investment_items, 1);
    }

    #[test]
    fn test_scenario_factor_fallback() {
        let factors = ScenarioFactors {
            optimistic_revenue_factor: 0.0,
            conservative_cost_factor: f64::NAN,
            ..ScenarioFactors::default()
        };
        let resolved = factors.resolved_against(&ScenarioFactors::default());
        assert_eq!(resolved.optimistic_revenue_factor, 120.0);
        assert_eq!(resolved.conservative_cost_factor, 105.0);
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(Document::from_value(json!([1, 2])).is_err());
        assert!(Document::from_value(json!({})).is_ok());
    }
}
