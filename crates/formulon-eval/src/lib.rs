//! The tree-walking evaluator and the function registry it dispatches
//! into. This crate knows nothing about a
//! workbook's storage or dependency graph — it only ever talks to
//! whatever implements `EvalContext`, which is provided by
//! `formulon-workbook`'s evaluation manager.

pub mod context;
pub mod evaluator;
pub mod function;
pub mod registry;
pub mod result;

pub use context::EvalContext;
pub use evaluator::eval_node;
pub use function::{ArgumentHandle, Function};
pub use registry::{get, register_function};
pub use result::{EvalResult, SpillFn, SpillResult};
