//! The global function table. Drops the namespace dimension — this core
//! has no add-in or custom-namespace concept — and registers a small
//! fixed set of built-ins eagerly rather than through a separate
//! plugin-loading step.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use formulon_common::{ErrKind, Value};
use formulon_macros::excel_fn;

use crate::context::EvalContext;
use crate::function::{ArgumentHandle, Function};
use crate::result::EvalResult;

static REGISTRY: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(|| {
    let map: DashMap<String, Arc<dyn Function>> = DashMap::new();
    for f in builtins() {
        map.insert(f.name().to_ascii_uppercase(), f);
    }
    map
});

fn builtins() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(Sum),
        Arc::new(Average),
        Arc::new(Count),
        Arc::new(If),
        Arc::new(Concatenate),
        Arc::new(__FnNOT),
    ]
}

/// Register a function, overwriting any existing entry with the same
/// (case-insensitive) name. Exposed so embedders can add user-defined
/// functions without forking this crate.
pub fn register_function(f: Arc<dyn Function>) {
    REGISTRY.insert(f.name().to_ascii_uppercase(), f);
}

pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    REGISTRY.get(&name.to_ascii_uppercase()).map(|v| Arc::clone(v.value()))
}

/// Flatten one argument's evaluated shape into a list of scalars, used by
/// the reduction functions (`SUM`, `AVERAGE`, `COUNT`). Ranges report
/// through `EvalContext::iter_range_values`/`iter_table_values` rather than
/// a materialized `Spilled` grid, since a reduction never needs a cell's
/// absolute position.
fn reduce_args(args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> Result<Vec<Value>, EvalResult> {
    use formulon_parse::parser::{ASTNodeType, ReferenceType};

    let mut values = Vec::new();
    for arg in args {
        match &arg.ast().node_type {
            ASTNodeType::Reference {
                reference: ReferenceType::Range {
                    sheet,
                    start_row,
                    start_col,
                    end_row,
                    end_col,
                },
                ..
            } => {
                for cell in ctx.iter_range_values(
                    sheet.as_deref(),
                    *start_row,
                    *start_col,
                    *end_row,
                    *end_col,
                ) {
                    match cell {
                        EvalResult::Value(v) => values.push(v),
                        EvalResult::Error(e) => return Err(EvalResult::Error(e)),
                        EvalResult::Spilled(s) => values.push(s.origin_result().clone()),
                    }
                }
            }
            ASTNodeType::Reference {
                reference: ReferenceType::Table(table_ref),
                ..
            } => {
                for cell in ctx.iter_table_values(table_ref) {
                    match cell {
                        EvalResult::Value(v) => values.push(v),
                        EvalResult::Error(e) => return Err(EvalResult::Error(e)),
                        EvalResult::Spilled(s) => values.push(s.origin_result().clone()),
                    }
                }
            }
            ASTNodeType::Reference {
                reference:
                    ReferenceType::MultiSheetRange {
                        selector,
                        start_row,
                        start_col,
                        end_row,
                        end_col,
                    },
                ..
            } => {
                for cell in ctx.iter_multi_sheet_range_values(
                    selector,
                    *start_row,
                    *start_col,
                    *end_row,
                    *end_col,
                ) {
                    match cell {
                        EvalResult::Value(v) => values.push(v),
                        EvalResult::Error(e) => return Err(EvalResult::Error(e)),
                        EvalResult::Spilled(s) => values.push(s.origin_result().clone()),
                    }
                }
            }
            _ => match arg.value(ctx) {
                EvalResult::Value(v) => values.push(v),
                EvalResult::Error(e) => return Err(EvalResult::Error(e)),
                EvalResult::Spilled(s) => values.push(s.origin_result().clone()),
            },
        }
    }
    Ok(values)
}

fn as_number(v: &Value) -> Result<f64, ErrKind> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        _ => Err(ErrKind::Value),
    }
}

struct Sum;
impl Function for Sum {
    fn name(&self) -> &'static str {
        "SUM"
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult {
        let values = match reduce_args(args, ctx) {
            Ok(v) => v,
            Err(e) => return e,
        };
        let mut total = 0.0;
        for v in &values {
            match v {
                Value::Number(n) => total += n,
                Value::Infinity(_) => return EvalResult::Value(v.clone()),
                Value::Boolean(_) | Value::String(_) => {}
            }
        }
        EvalResult::Value(Value::Number(total))
    }
}

struct Average;
impl Function for Average {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }
    fn variadic(&self) -> bool {
        true
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult {
        let values = match reduce_args(args, ctx) {
            Ok(v) => v,
            Err(e) => return e,
        };
        let numeric: Vec<f64> = values
            .iter()
            .filter(|v| matches!(v, Value::Number(_)))
            .map(|v| as_number(v).unwrap())
            .collect();
        if numeric.is_empty() {
            return EvalResult::error(ErrKind::Div0);
        }
        let total: f64 = numeric.iter().sum();
        EvalResult::Value(Value::Number(total / numeric.len() as f64))
    }
}

struct Count;
impl Function for Count {
    fn name(&self) -> &'static str {
        "COUNT"
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult {
        let values = match reduce_args(args, ctx) {
            Ok(v) => v,
            Err(e) => return e,
        };
        let n = values.iter().filter(|v| matches!(v, Value::Number(_))).count();
        EvalResult::Value(Value::Number(n as f64))
    }
}

/// `IF(condition, true_value, [false_value])`. Lazy by construction: only
/// the branch actually taken is ever passed to `ArgumentHandle::value`.
struct If;
impl Function for If {
    fn name(&self) -> &'static str {
        "IF"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult {
        let cond = match args[0].value_scalar(ctx) {
            EvalResult::Value(Value::Boolean(b)) => b,
            EvalResult::Value(Value::Number(n)) => n != 0.0,
            EvalResult::Error(e) => return EvalResult::Error(e),
            _ => return EvalResult::error(ErrKind::Value),
        };
        if cond {
            args[1].value(ctx)
        } else if let Some(else_arg) = args.get(2) {
            else_arg.value(ctx)
        } else {
            EvalResult::Value(Value::Boolean(false))
        }
    }
}

/// `CONCATENATE` coerces every argument to text — unlike `&`, which
/// rejects booleans and infinities outright. The asymmetry is intentional,
/// not an oversight.
struct Concatenate;
impl Function for Concatenate {
    fn name(&self) -> &'static str {
        "CONCATENATE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult {
        let mut out = String::new();
        for arg in args {
            match arg.value_scalar(ctx) {
                EvalResult::Value(v) => out.push_str(&v.to_string()),
                EvalResult::Error(e) => return EvalResult::Error(e),
                EvalResult::Spilled(_) => unreachable!("value_scalar never returns Spilled"),
            }
        }
        EvalResult::Value(Value::String(out))
    }
}

/// `NOT(logical)`, authored through the attribute macro rather than a
/// hand-written `impl Function` — the simplest built-ins don't need
/// anything `#[excel_fn]` can't generate.
#[excel_fn(name = "NOT", min = 1, arg_types = "logical")]
fn not(args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult {
    match args[0].value_scalar(ctx) {
        EvalResult::Value(Value::Boolean(b)) => EvalResult::Value(Value::Boolean(!b)),
        EvalResult::Error(e) => EvalResult::Error(e),
        _ => EvalResult::error(ErrKind::Value),
    }
}
