//! # Custom Formula Evaluator
//!
//! Custom revenue and cost modules are priced by short arithmetic formulas
//! such as `memberCount * %1 + Math.max(%2, 10000)`. A formula may use:
//!
//! - positional placeholders `%1`..`%4`, bound by position to the module's
//!   variables
//! - the whitelisted system variables in [`SYSTEM_VARIABLES`], read from a
//!   [`SystemContext`] snapshot of the document
//! - numeric literals, `+ - * / ** ( )` and the functions
//!   `max min round ceil floor pow sqrt abs` (optionally `Math.`-prefixed),
//!   plus `Math.PI` and `Math.E`
//!
//! Evaluation fails closed: any parse error, unresolved name or non-finite
//! result yields `0.0` and a `tracing` warning.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::document::{Document, FormulaVariable};
//! use calc_core::formula::FormulaEngine;
//!
//! let engine = FormulaEngine::from_document(&Document::sample());
//! let vars = vec![FormulaVariable::new("单价", 50.0)];
//!
//! assert_eq!(engine.evaluate("memberCount * %1", &vars), 15_000.0);
//! assert_eq!(engine.evaluate("1 / 0", &vars), 0.0);
//! assert!(!engine.validate_formula("unknownThing * 2", &vars).is_valid);
//! ```

pub mod parser;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Document, FormulaVariable};
use crate::numeric::finite_or_zero;

use parser::{Function, Scope, Spanned, Token};

/// Errors raised while parsing or evaluating a formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },

    #[error("invalid number '{text}' at {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unexpected '{found}' at {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("未识别的变量: {name}")]
    UnresolvedVariable { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("{function}() expects {expected} argument(s), found {found}")]
    ArityMismatch {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("formula nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    #[error("formula has more than {limit} operators")]
    TooManyOperators { limit: usize },

    #[error("formula result is not a finite number")]
    NonFinite,
}

/// A whitelisted system variable.
pub struct SystemVariable {
    pub name: &'static str,
    pub description: &'static str,
    read: fn(&Document) -> f64,
}

/// Whitelisted system variables, in display order.
pub static SYSTEM_VARIABLES: [SystemVariable; 14] = [
    SystemVariable { name: "memberCount", description: "会员总数", read: |d| d.revenue.member.count },
    SystemVariable { name: "areaSqm", description: "营业面积(㎡)", read: |d| d.basic.area_sqm },
    SystemVariable { name: "daysPerYear", description: "年营业天数", read: Document::effective_days_per_year },
    SystemVariable { name: "boardingRooms", description: "寄养房间数", read: |d| d.revenue.boarding.rooms },
    SystemVariable { name: "boardingADR", description: "平均房价/天", read: |d| d.revenue.boarding.adr },
    SystemVariable { name: "boardingOcc", description: "平均入住率(%)", read: |d| d.revenue.boarding.occ },
    SystemVariable { name: "staffCount", description: "员工数量", read: |d| d.cost.fixed.staff_count },
    SystemVariable {
        name: "staffSalaryPerMonth",
        description: "人均月薪",
        read: |d| d.cost.fixed.staff_salary_per_month,
    },
    SystemVariable {
        name: "medicalMonthlyRevenue",
        description: "月度医疗营收",
        read: |d| d.revenue.medical.monthly_revenue,
    },
    SystemVariable {
        name: "retailMonthlyRevenue",
        description: "月度零售营收",
        read: |d| d.revenue.retail.monthly_revenue,
    },
    SystemVariable {
        name: "cafeMonthlyRevenue",
        description: "月度餐饮/社交营收",
        read: |d| d.revenue.cafe.monthly_revenue,
    },
    SystemVariable {
        name: "rentPerSqmPerDay",
        description: "租金(元/㎡/天)",
        read: |d| d.cost.fixed.rent_per_sqm_per_day,
    },
    SystemVariable {
        name: "propertyPerSqmPerMonth",
        description: "物业费(元/㎡/月)",
        read: |d| d.cost.fixed.property_per_sqm_per_month,
    },
    SystemVariable {
        name: "utilitiesPerYear",
        description: "年度水电费",
        read: |d| d.cost.variable.utilities_per_year,
    },
];

static SYSTEM_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    SYSTEM_VARIABLES
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name, i))
        .collect()
});

/// Description of a system variable, or the name itself when unknown.
pub fn variable_description(name: &str) -> &str {
    SYSTEM_INDEX
        .get(name)
        .map(|&i| SYSTEM_VARIABLES[i].description)
        .unwrap_or(name)
}

/// Snapshot of system variable values taken from one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemContext {
    values: [f64; 14],
}

impl Default for SystemContext {
    fn default() -> Self {
        SystemContext::from_document(&Document::default())
    }
}

impl SystemContext {
    pub fn from_document(doc: &Document) -> Self {
        let mut values = [0.0; 14];
        for (slot, var) in values.iter_mut().zip(SYSTEM_VARIABLES.iter()) {
            *slot = finite_or_zero((var.read)(doc));
        }
        SystemContext { values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        SYSTEM_INDEX.get(name).map(|&i| self.values[i])
    }

    /// `(name, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        SYSTEM_VARIABLES.iter().map(|v| v.name).zip(self.values.iter().copied())
    }
}

/// Outcome of [`FormulaEngine::validate_formula`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaValidation {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl FormulaValidation {
    fn ok() -> Self {
        FormulaValidation { is_valid: true, error: None }
    }

    fn fail(error: impl Into<String>) -> Self {
        FormulaValidation {
            is_valid: false,
            error: Some(error.into()),
        }
    }
}

/// Names a formula refers to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDependencies {
    /// System variable names, in display order
    pub system_variables: Vec<String>,
    /// Placeholder slots, ascending
    pub custom_variables: Vec<usize>,
    /// Functions as `Math.<name>`
    pub functions: Vec<String>,
}

/// One entry of [`FormulaEngine::available_variables`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableInfo {
    pub name: String,
    pub description: String,
    pub value: Option<f64>,
}

/// Everything a formula may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableVariables {
    pub system: Vec<VariableInfo>,
    pub custom: Vec<VariableInfo>,
    pub functions: Vec<VariableInfo>,
}

struct EvalScope<'a> {
    context: &'a SystemContext,
    placeholders: &'a [f64],
}

impl Scope for EvalScope<'_> {
    fn placeholder(&self, slot: usize) -> Option<f64> {
        slot.checked_sub(1).and_then(|i| self.placeholders.get(i)).copied()
    }

    fn variable(&self, name: &str) -> Option<f64> {
        self.context.get(name)
    }
}

/// Evaluates custom module formulas against a system-variable snapshot.
///
/// Build one per calculation with [`FormulaEngine::from_document`]; the
/// engine holds no other state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaEngine {
    context: SystemContext,
}

impl FormulaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: &Document) -> Self {
        FormulaEngine {
            context: SystemContext::from_document(doc),
        }
    }

    /// Refresh the system-variable snapshot from `doc`.
    pub fn update_system_context(&mut self, doc: &Document) {
        self.context = SystemContext::from_document(doc);
    }

    pub fn context(&self) -> &SystemContext {
        &self.context
    }

    /// Evaluate `formula`, failing closed to `0.0`.
    pub fn evaluate(&self, formula: &str, variables: &[FormulaVariable]) -> f64 {
        if formula.trim().is_empty() {
            return 0.0;
        }
        match self.try_evaluate(formula, variables) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(formula, error = %e, "formula evaluation failed, using 0");
                0.0
            }
        }
    }

    /// Evaluate `formula`, reporting why it failed. A blank formula is `Ok(0.0)`.
    pub fn try_evaluate(&self, formula: &str, variables: &[FormulaVariable]) -> Result<f64, FormulaError> {
        if formula.trim().is_empty() {
            return Ok(0.0);
        }
        let placeholders: Vec<f64> = variables.iter().map(|v| finite_or_zero(v.value)).collect();
        let value = parser::parse(formula)?.eval(&EvalScope {
            context: &self.context,
            placeholders: &placeholders,
        })?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FormulaError::NonFinite)
        }
    }

    /// Check a formula for editor feedback. Every variable is substituted
    /// with `1`; a non-finite result is not an error.
    pub fn validate_formula(&self, formula: &str, variables: &[FormulaVariable]) -> FormulaValidation {
        if formula.trim().is_empty() {
            return FormulaValidation::ok();
        }
        let tokens = match parser::tokenize(formula) {
            Ok(tokens) => tokens,
            Err(e) => return FormulaValidation::fail(e.to_string()),
        };

        let unresolved = self.unresolved_names(&tokens, variables.len());
        if !unresolved.is_empty() {
            return FormulaValidation::fail(format!("未识别的变量: {}", unresolved.join(", ")));
        }

        let expr = match parser::parse_tokens(&tokens) {
            Ok(expr) => expr,
            Err(e) => return FormulaValidation::fail(e.to_string()),
        };
        let ones = vec![1.0; variables.len()];
        let probe = SystemContext {
            values: [1.0; 14],
        };
        match expr.eval(&EvalScope {
            context: &probe,
            placeholders: &ones,
        }) {
            Ok(_) => FormulaValidation::ok(),
            Err(e) => FormulaValidation::fail(e.to_string()),
        }
    }

    /// Identifiers and placeholders that nothing binds, in order of first use.
    fn unresolved_names(&self, tokens: &[Spanned], slots: usize) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (i, spanned) in tokens.iter().enumerate() {
            let name = match &spanned.token {
                Token::Placeholder(slot) if *slot == 0 || *slot > slots => format!("%{}", slot),
                Token::Ident(ident) => {
                    let is_call = matches!(tokens.get(i + 1), Some(Spanned { token: Token::LParen, .. }));
                    if is_call || parser::constant(ident).is_some() || self.context.get(ident).is_some() {
                        continue;
                    }
                    ident.clone()
                }
                _ => continue,
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// System variables, placeholders and functions referenced by `formula`.
    /// Unparseable input yields whatever tokenized cleanly, or nothing.
    pub fn dependencies(&self, formula: &str) -> FormulaDependencies {
        let mut deps = FormulaDependencies::default();
        let Ok(tokens) = parser::tokenize(formula) else {
            return deps;
        };

        for var in SYSTEM_VARIABLES.iter() {
            let used = tokens
                .iter()
                .any(|s| matches!(&s.token, Token::Ident(name) if name == var.name));
            if used {
                deps.system_variables.push(var.name.to_string());
            }
        }

        let mut slots: Vec<usize> = tokens
            .iter()
            .filter_map(|s| match s.token {
                Token::Placeholder(slot) => Some(slot),
                _ => None,
            })
            .collect();
        slots.sort_unstable();
        slots.dedup();
        deps.custom_variables = slots;

        for (i, spanned) in tokens.iter().enumerate() {
            if let Token::Ident(name) = &spanned.token {
                let is_call = matches!(tokens.get(i + 1), Some(Spanned { token: Token::LParen, .. }));
                if let (true, Some(function)) = (is_call, Function::lookup(name)) {
                    let label = format!("Math.{}", function.name());
                    if !deps.functions.contains(&label) {
                        deps.functions.push(label);
                    }
                }
            }
        }

        deps
    }

    /// Human-readable formula: placeholders become variable names and system
    /// variables their descriptions. Unparseable input is returned as is.
    pub fn format_display(&self, formula: &str, variables: &[FormulaVariable]) -> String {
        if formula.trim().is_empty() {
            return String::new();
        }
        let Ok(tokens) = parser::tokenize(formula) else {
            return formula.to_string();
        };

        let mut out = String::with_capacity(formula.len());
        let mut cursor = 0;
        for spanned in &tokens {
            let replacement = match &spanned.token {
                Token::Placeholder(slot) => slot
                    .checked_sub(1)
                    .and_then(|i| variables.get(i))
                    .filter(|v| !v.name.is_empty())
                    .map(|v| v.name.as_str()),
                Token::Ident(name) if self.context.get(name).is_some() => Some(variable_description(name)),
                _ => None,
            };
            if let Some(text) = replacement {
                out.push_str(&formula[cursor..spanned.start]);
                out.push_str(text);
                cursor = spanned.end;
            }
        }
        out.push_str(&formula[cursor..]);
        out
    }

    /// System variables with current values, the four placeholders and the
    /// supported functions.
    pub fn available_variables(&self) -> AvailableVariables {
        let system = self
            .context
            .iter()
            .map(|(name, value)| VariableInfo {
                name: name.to_string(),
                description: variable_description(name).to_string(),
                value: Some(value),
            })
            .collect();
        let custom = (1..=crate::document::CUSTOM_VARIABLE_SLOTS)
            .map(|slot| VariableInfo {
                name: format!("%{}", slot),
                description: format!("自定义变量{}", slot),
                value: None,
            })
            .collect();
        let functions = Function::ALL
            .iter()
            .map(|f| VariableInfo {
                name: format!("Math.{}", f.name()),
                description: f.description().to_string(),
                value: None,
            })
            .collect();

        AvailableVariables { system, custom, functions }
    }
}
