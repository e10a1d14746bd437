//! The seam between the tree-walking evaluator and whatever owns cell
//! content, named expressions, tables and spill state. The evaluator only
//! ever talks to this trait; the evaluation manager (a separate crate) is
//! the one concrete implementer.

use std::sync::Arc;

use formulon_common::{NodeKey, SheetSelector};
use formulon_parse::parser::TableReference;

use crate::function::Function;
use crate::result::EvalResult;

/// Every evaluation call carries one of these. Implementations are
/// expected to append to their own `dependencies` / `frontierDependencies`
/// bookkeeping as references are resolved — the evaluator itself never
/// touches those sets directly.
pub trait EvalContext {
    /// Resolve a single cell, recording it as a concrete dependency.
    fn resolve_cell(&mut self, sheet: Option<&str>, row: u32, col: u32) -> EvalResult;

    /// Resolve a range for the purposes of generic scalar-operator lifting
    /// (e.g. `=A1:A3*2`). Ranges that collapse to a single cell delegate to
    /// `resolve_cell`; multi-cell bounded ranges become a `Spilled` result.
    /// Unbounded (whole row/column) ranges are only meaningful to
    /// functions that consult `iter_range_values` instead, so this returns
    /// `ErrKind::Value` for them.
    fn resolve_range(
        &mut self,
        sheet: Option<&str>,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> EvalResult;

    /// Iterate the sparse set of occupied cells intersecting a range,
    /// recording each as a concrete dependency. Used by reduction
    /// functions (`SUM`, `COUNT`, `AVERAGE`, …) which can consume a
    /// whole-column reference without materializing it.
    fn iter_range_values(
        &mut self,
        sheet: Option<&str>,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> Vec<EvalResult>;

    /// Resolve a 3-D reference (a rectangular range read across every sheet
    /// a [`SheetSelector`] names, e.g. `Sheet1:Sheet3!A1:B2`) as a scalar
    /// operand. Excel itself never lets a 3-D reference stand alone as an
    /// arithmetic operand — only as a whole function argument — so this
    /// always yields `ErrKind::Value`; it still records the touched cells
    /// as dependencies before doing so.
    fn resolve_multi_sheet_range(
        &mut self,
        selector: &SheetSelector,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> EvalResult;

    /// Iterate the sparse set of occupied cells intersecting a range,
    /// across every sheet the selector names, in selector order. Used by
    /// reduction functions the same way `iter_range_values` is.
    fn iter_multi_sheet_range_values(
        &mut self,
        selector: &SheetSelector,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> Vec<EvalResult>;

    /// Resolve a named expression by (optional sheet scope, name).
    fn resolve_named(&mut self, scope: Option<&str>, name: &str) -> EvalResult;

    /// Resolve a structured (table) reference down to the range it
    /// denotes and evaluate it exactly as `resolve_range` would.
    fn resolve_table(&mut self, table_ref: &TableReference) -> EvalResult;

    /// Same as `resolve_table`, but for use by reduction functions that
    /// want the sparse cell iterator instead of a lifted `Spilled` value.
    fn iter_table_values(&mut self, table_ref: &TableReference) -> Vec<EvalResult>;

    /// Look up a registered function by case-insensitive name.
    fn lookup_function(&self, name: &str) -> Option<Arc<dyn Function>>;

    /// The node key of the cell currently being evaluated; used as the
    /// spill anchor when a formula's result turns out to be rectangular.
    fn current_cell(&self) -> NodeKey;
}
