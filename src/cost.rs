//! Cost model: money arithmetic, per-model formulas and pipeline estimates.

pub mod calculator;
pub mod formula;
pub mod money;

pub use calculator::{CostCalculator, CostEstimate, CostLine};
pub use formula::{CostFormula, FormulaValue};
pub use money::Money;
