//! # calc_core - Pet-Care Complex Financial Model
//!
//! `calc_core` is the calculation engine behind the Hopeful financial model: a
//! single [`Document`] of business assumptions goes in, a complete
//! [`CalculationResult`] comes out (revenue, cost, investment, profitability,
//! scenarios, break-even and a comprehensive analysis).
//!
//! ## Design Philosophy
//!
//! - **Total**: [`MainCalculator::calculate`] never fails; malformed input
//!   degrades to zeros and unrecoverable failures become an `error: true`
//!   result
//! - **Pure**: engines hold configuration only and perform no I/O
//! - **JSON-First**: every document and result type implements
//!   Serialize/Deserialize with camelCase keys
//! - **Sentinels**: periods that can never be reached are `f64::INFINITY`
//!   (written as `null` in JSON), never NaN
//!
//! ## Quick Start
//!
//! ```rust
//! use calc_core::{Document, MainCalculator};
//!
//! let mut doc = Document::sample();
//! doc.revenue.boarding.rooms = 20.0;
//!
//! let result = MainCalculator::default().calculate(&doc);
//! println!(
//!     "profit {:.0}, margin {:.1}%, grade {:?}",
//!     result.profitability.profit,
//!     result.profitability.margin,
//!     result.comprehensive.health_score.grade,
//! );
//! ```
//!
//! ## Modules
//!
//! - [`document`] - the input model, defaults and dotted-path edits
//! - [`formula`] - safe evaluator for custom module formulas
//! - [`calculations`] - the engines and the orchestrator
//! - [`validation`] - advisory document checks
//! - [`storage`] - persistence, export and import
//! - [`numeric`] - safe arithmetic and stage-boundary sanitization
//! - [`errors`] - structured error types

pub mod calculations;
pub mod document;
pub mod errors;
pub mod formula;
pub mod numeric;
pub mod storage;
pub mod validation;

// Re-export commonly used types at crate root for convenience
pub use calculations::{CalculationResult, MainCalculator};
pub use document::{CustomModule, Document, FormulaVariable};
pub use errors::{CalcError, CalcResult};
pub use formula::FormulaEngine;
pub use storage::{MemoryStorage, Storage};
pub use validation::{validate, ValidationReport};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
