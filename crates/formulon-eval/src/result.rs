//! The evaluator's result algebra: every AST walk ends in one of exactly
//! three shapes. `Spilled` carries a lazy `at(offset)` slice
//! rather than a materialized grid — only the (row, col) a caller actually
//! asks for ever runs the underlying primitive.

use std::fmt;
use std::sync::Arc;

use formulon_common::{EngineError, ErrKind, Value};

use crate::context::EvalContext;

/// `(row_offset, col_offset, ctx) -> EvalResult`, invoked lazily by
/// `SpillResult::at`.
pub type SpillFn = Arc<dyn Fn(u32, u32, &mut dyn EvalContext) -> EvalResult + Send + Sync>;

/// A rectangular result anchored at the formula's own cell. `rows`/`cols`
/// describe the shape relative to that anchor; the evaluation manager is
/// the one that turns this into an absolute `Range` when it commits a
/// spill record.
#[derive(Clone)]
pub struct SpillResult {
    rows: u32,
    cols: u32,
    origin_result: Box<Value>,
    source: String,
    at_fn: SpillFn,
}

impl SpillResult {
    pub fn new(rows: u32, cols: u32, origin_result: Value, source: impl Into<String>, at_fn: SpillFn) -> Self {
        debug_assert!(rows >= 1 && cols >= 1);
        Self {
            rows,
            cols,
            origin_result: Box::new(origin_result),
            source: source.into(),
            at_fn,
        }
    }

    /// A 1x1 "spill" wrapping a plain scalar, used so scalar operands can
    /// broadcast uniformly against genuinely spilled ones during lifting.
    pub fn scalar(value: Value) -> Self {
        let v = value.clone();
        Self::new(1, 1, value, "scalar", Arc::new(move |_, _, _| EvalResult::Value(v.clone())))
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn origin_result(&self) -> &Value {
        &self.origin_result
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the single cell at `(row_offset, col_offset)` relative to
    /// the anchor. Offsets outside `rows`/`cols` clamp to the nearest edge
    /// so a 1x1 scalar broadcasts against any shape.
    pub fn at(&self, row_offset: u32, col_offset: u32, ctx: &mut dyn EvalContext) -> EvalResult {
        let r = row_offset.min(self.rows.saturating_sub(1));
        let c = col_offset.min(self.cols.saturating_sub(1));
        (self.at_fn)(r, c, ctx)
    }
}

impl fmt::Debug for SpillResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpillResult")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("origin_result", &self.origin_result)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum EvalResult {
    Value(Value),
    Spilled(SpillResult),
    Error(EngineError),
}

impl EvalResult {
    pub fn error(kind: ErrKind) -> Self {
        EvalResult::Error(EngineError::new(kind))
    }

    pub fn error_with(kind: ErrKind, message: impl Into<String>) -> Self {
        EvalResult::Error(EngineError::with_message(kind, message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EvalResult::Error(_))
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, EvalResult::Spilled(_))
    }

    /// Collapse to a scalar `Value`, taking the top-left cell of a spill.
    /// Used where a function argument or operator operand needs a plain
    /// scalar (e.g. a condition in `IF`).
    pub fn collapse(&self, ctx: &mut dyn EvalContext) -> EvalResult {
        match self {
            EvalResult::Spilled(s) => s.at(0, 0, ctx),
            other => other.clone(),
        }
    }

    pub fn into_value_result(self) -> Result<Value, EngineError> {
        match self {
            EvalResult::Value(v) => Ok(v),
            EvalResult::Error(e) => Err(e),
            EvalResult::Spilled(s) => Ok(s.origin_result().clone()),
        }
    }
}

impl From<Value> for EvalResult {
    fn from(v: Value) -> Self {
        EvalResult::Value(v)
    }
}

impl From<Result<Value, ErrKind>> for EvalResult {
    fn from(r: Result<Value, ErrKind>) -> Self {
        match r {
            Ok(v) => EvalResult::Value(v),
            Err(k) => EvalResult::error(k),
        }
    }
}

impl From<ErrKind> for EvalResult {
    fn from(kind: ErrKind) -> Self {
        EvalResult::error(kind)
    }
}

impl From<EngineError> for EvalResult {
    fn from(e: EngineError) -> Self {
        EvalResult::Error(e)
    }
}
