//! The tree-walking evaluator. `eval_node` is the single recursive entry
//! point: every `ASTNodeType` variant maps to exactly one
//! arm, operators dispatch through `formulon_common::value`'s primitives,
//! and any operand that turns out to be `Spilled` lifts the operator across
//! the whole shape instead of collapsing it first.

use std::sync::Arc;

use formulon_common::{value, ErrKind, Value};
use formulon_parse::parser::{ASTNode, ASTNodeType, ReferenceType};

use crate::context::EvalContext;
use crate::function::ArgumentHandle;
use crate::result::{EvalResult, SpillResult};

/// Evaluate `node` against `ctx`, returning one of the three `EvalResult`
/// shapes. Errors never short-circuit the whole tree on their own — they
/// propagate upward exactly as Excel errors do, through arithmetic and
/// function calls alike, until something (e.g. `IFERROR`, not built in
/// here) chooses to catch them.
pub fn eval_node(node: &ASTNode, ctx: &mut dyn EvalContext) -> EvalResult {
    match &node.node_type {
        ASTNodeType::Literal(v) => EvalResult::Value(v.clone()),
        ASTNodeType::LiteralError(kind) => EvalResult::error(*kind),
        ASTNodeType::Reference { reference, .. } => eval_reference(reference, ctx),
        ASTNodeType::UnaryOp { op, expr } => eval_unary(op, expr, ctx),
        ASTNodeType::BinaryOp { op, left, right } => eval_binary(op, left, right, ctx),
        ASTNodeType::Function { name, args } => eval_function(name, args, ctx),
        ASTNodeType::Array(rows) => eval_array(rows, ctx),
    }
}

fn eval_reference(reference: &ReferenceType, ctx: &mut dyn EvalContext) -> EvalResult {
    match reference {
        ReferenceType::Cell { sheet, row, col } => ctx.resolve_cell(sheet.as_deref(), *row, *col),
        ReferenceType::Range {
            sheet,
            start_row,
            start_col,
            end_row,
            end_col,
        } => ctx.resolve_range(sheet.as_deref(), *start_row, *start_col, *end_row, *end_col),
        ReferenceType::NamedRange(name) => ctx.resolve_named(None, name),
        ReferenceType::Table(table_ref) => ctx.resolve_table(table_ref),
        ReferenceType::MultiSheetRange {
            selector,
            start_row,
            start_col,
            end_row,
            end_col,
        } => ctx.resolve_multi_sheet_range(selector, *start_row, *start_col, *end_row, *end_col),
    }
}

fn eval_unary(op: &str, expr: &ASTNode, ctx: &mut dyn EvalContext) -> EvalResult {
    let operand = eval_node(expr, ctx);
    lift_unary(operand, op, ctx)
}

fn apply_unary(op: &str, v: &Value) -> Result<Value, ErrKind> {
    match op {
        "-" => value::negate(v, true),
        "+" => value::negate(v, false),
        "%" => value::percent(v),
        _ => Err(ErrKind::Error),
    }
}

/// Apply `op` to `operand`, lifting across a spilled shape element-wise
/// when the operand didn't collapse to a plain scalar.
fn lift_unary(operand: EvalResult, op: &str, _ctx: &mut dyn EvalContext) -> EvalResult {
    match operand {
        EvalResult::Error(e) => EvalResult::Error(e),
        EvalResult::Value(v) => apply_unary(op, &v).into(),
        EvalResult::Spilled(s) => {
            let op = op.to_string();
            let rows = s.rows();
            let cols = s.cols();
            let origin = apply_unary(&op, s.origin_result());
            let origin_value = match &origin {
                Ok(v) => v.clone(),
                Err(k) => return EvalResult::error(*k),
            };
            let inner = Arc::new(s);
            let at_fn = Arc::new(move |r: u32, c: u32, ctx: &mut dyn EvalContext| -> EvalResult {
                match inner.at(r, c, ctx) {
                    EvalResult::Value(v) => apply_unary(&op, &v).into(),
                    EvalResult::Error(e) => EvalResult::Error(e),
                    EvalResult::Spilled(_) => EvalResult::error(ErrKind::Value),
                }
            });
            EvalResult::Spilled(SpillResult::new(rows, cols, origin_value, "unary", at_fn))
        }
    }
}

fn apply_binary(op: &str, a: &Value, b: &Value) -> Result<Value, ErrKind> {
    match op {
        "+" => value::add(a, b),
        "-" => value::subtract(a, b),
        "*" => value::multiply(a, b),
        "/" => value::divide(a, b),
        "^" => value::power(a, b),
        "&" => value::concatenate(a, b),
        "=" => value::equals(a, b),
        "<>" => value::not_equals(a, b),
        "<" => value::less_than(a, b),
        "<=" => value::less_equal(a, b),
        ">" => value::greater_than(a, b),
        ">=" => value::greater_equal(a, b),
        _ => Err(ErrKind::Error),
    }
}

fn eval_binary(op: &str, left: &ASTNode, right: &ASTNode, ctx: &mut dyn EvalContext) -> EvalResult {
    let lhs = eval_node(left, ctx);
    if let EvalResult::Error(e) = lhs {
        return EvalResult::Error(e);
    }
    let rhs = eval_node(right, ctx);
    if let EvalResult::Error(e) = rhs {
        return EvalResult::Error(e);
    }
    lift_binary(op, lhs, rhs)
}

/// Lift a scalar binary operator across operands that may be `Spilled`.
/// A scalar paired with a spill broadcasts against every cell; two spills
/// combine cell-by-cell, clamped to the smaller shape's edges exactly as
/// `SpillResult::at` already clamps individual offsets.
fn lift_binary(op: &str, lhs: EvalResult, rhs: EvalResult) -> EvalResult {
    match (lhs, rhs) {
        (EvalResult::Value(a), EvalResult::Value(b)) => apply_binary(op, &a, &b).into(),
        (EvalResult::Value(a), EvalResult::Spilled(b)) => {
            let op = op.to_string();
            let rows = b.rows();
            let cols = b.cols();
            let origin = match apply_binary(&op, &a, b.origin_result()) {
                Ok(v) => v,
                Err(k) => return EvalResult::error(k),
            };
            let b = Arc::new(b);
            let at_fn = Arc::new(move |r: u32, c: u32, ctx: &mut dyn EvalContext| -> EvalResult {
                match b.at(r, c, ctx) {
                    EvalResult::Value(v) => apply_binary(&op, &a, &v).into(),
                    EvalResult::Error(e) => EvalResult::Error(e),
                    EvalResult::Spilled(_) => EvalResult::error(ErrKind::Value),
                }
            });
            EvalResult::Spilled(SpillResult::new(rows, cols, origin, "binary", at_fn))
        }
        (EvalResult::Spilled(a), EvalResult::Value(b)) => {
            let op = op.to_string();
            let rows = a.rows();
            let cols = a.cols();
            let origin = match apply_binary(&op, a.origin_result(), &b) {
                Ok(v) => v,
                Err(k) => return EvalResult::error(k),
            };
            let a = Arc::new(a);
            let at_fn = Arc::new(move |r: u32, c: u32, ctx: &mut dyn EvalContext| -> EvalResult {
                match a.at(r, c, ctx) {
                    EvalResult::Value(v) => apply_binary(&op, &v, &b).into(),
                    EvalResult::Error(e) => EvalResult::Error(e),
                    EvalResult::Spilled(_) => EvalResult::error(ErrKind::Value),
                }
            });
            EvalResult::Spilled(SpillResult::new(rows, cols, origin, "binary", at_fn))
        }
        (EvalResult::Spilled(a), EvalResult::Spilled(b)) => {
            let op = op.to_string();
            let rows = a.rows().max(b.rows());
            let cols = a.cols().max(b.cols());
            let origin = match apply_binary(&op, a.origin_result(), b.origin_result()) {
                Ok(v) => v,
                Err(k) => return EvalResult::error(k),
            };
            let a = Arc::new(a);
            let b = Arc::new(b);
            let at_fn = Arc::new(move |r: u32, c: u32, ctx: &mut dyn EvalContext| -> EvalResult {
                let av = match a.at(r, c, ctx) {
                    EvalResult::Value(v) => v,
                    EvalResult::Error(e) => return EvalResult::Error(e),
                    EvalResult::Spilled(_) => return EvalResult::error(ErrKind::Value),
                };
                let bv = match b.at(r, c, ctx) {
                    EvalResult::Value(v) => v,
                    EvalResult::Error(e) => return EvalResult::Error(e),
                    EvalResult::Spilled(_) => return EvalResult::error(ErrKind::Value),
                };
                apply_binary(&op, &av, &bv).into()
            });
            EvalResult::Spilled(SpillResult::new(rows, cols, origin, "binary", at_fn))
        }
        (EvalResult::Error(e), _) | (_, EvalResult::Error(e)) => EvalResult::Error(e),
    }
}

fn eval_function(name: &str, args: &[ASTNode], ctx: &mut dyn EvalContext) -> EvalResult {
    let Some(func) = ctx.lookup_function(name) else {
        return EvalResult::error(ErrKind::Name);
    };
    if args.len() < func.min_args() || (!func.variadic() && args.len() > func.arg_schema().len().max(func.min_args())) {
        return EvalResult::error(ErrKind::Value);
    }
    let handles: Vec<ArgumentHandle<'_>> = args.iter().map(ArgumentHandle::new).collect();
    func.eval(&handles, ctx)
}

/// A `{1,2;3,4}` array literal evaluates every cell eagerly (no spill
/// laziness is needed here — the whole shape is already in the formula
/// text) and becomes a `Spilled` result anchored at whatever cell hosts it.
fn eval_array(rows: &[Vec<ASTNode>], ctx: &mut dyn EvalContext) -> EvalResult {
    if rows.is_empty() || rows[0].is_empty() {
        return EvalResult::error(ErrKind::Value);
    }
    let row_count = rows.len() as u32;
    let col_count = rows[0].len() as u32;

    let mut grid: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() as u32 != col_count {
            return EvalResult::error(ErrKind::Value);
        }
        let mut out_row = Vec::with_capacity(row.len());
        for cell in row {
            match eval_node(cell, ctx) {
                EvalResult::Value(v) => out_row.push(v),
                EvalResult::Error(e) => return EvalResult::Error(e),
                EvalResult::Spilled(s) => out_row.push(s.origin_result().clone()),
            }
        }
        grid.push(out_row);
    }

    let origin = grid[0][0].clone();
    let grid = Arc::new(grid);
    let at_fn = Arc::new(move |r: u32, c: u32, _ctx: &mut dyn EvalContext| -> EvalResult {
        EvalResult::Value(grid[r as usize][c as usize].clone())
    });
    EvalResult::Spilled(SpillResult::new(row_count, col_count, origin, "array", at_fn))
}
