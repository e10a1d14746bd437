//! The callable surface functions implement and the lazy argument wrapper
//! passed to them. `EvalContext` is threaded explicitly through every call
//! instead of being captured by an interpreter, so `ArgumentHandle` only
//! ever borrows the AST node and re-enters `evaluator::eval_node` on
//! demand.

use formulon_common::ArgSpec;

use crate::context::EvalContext;
use crate::result::EvalResult;
use formulon_parse::parser::ASTNode;

/// One not-yet-evaluated function argument. Holding the node rather than a
/// pre-computed value lets functions like `IF` skip evaluating the branch
/// they don't take.
pub struct ArgumentHandle<'a> {
    node: &'a ASTNode,
}

impl<'a> ArgumentHandle<'a> {
    pub fn new(node: &'a ASTNode) -> Self {
        Self { node }
    }

    /// The raw AST node, for functions that need to inspect its shape
    /// (e.g. to tell a literal array apart from a reference).
    pub fn ast(&self) -> &'a ASTNode {
        self.node
    }

    /// Evaluate this argument, forwarding the three-shape `EvalResult`
    /// algebra (`Value` / `Spilled` / `Error`) as-is.
    pub fn value(&self, ctx: &mut dyn EvalContext) -> EvalResult {
        crate::evaluator::eval_node(self.node, ctx)
    }

    /// Evaluate and collapse to a scalar, taking the top-left cell of a
    /// spilled result. Most functions want this rather than `value`.
    pub fn value_scalar(&self, ctx: &mut dyn EvalContext) -> EvalResult {
        let result = self.value(ctx);
        result.collapse(ctx)
    }
}

/// Excel-style callable. Object-safe so the registry can store
/// `Arc<dyn Function>` uniformly.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;

    /// Functions outside the quantified invariants (e.g. `NOW`, `RAND`) would
    /// report `true` here; none of the built-ins registered by this crate
    /// are volatile, but the hook exists for the evaluation manager's
    /// dependency bookkeeping to consult later.
    fn volatile(&self) -> bool {
        false
    }

    fn min_args(&self) -> usize {
        0
    }

    fn variadic(&self) -> bool {
        false
    }

    fn arg_schema(&self) -> &'static [ArgSpec] {
        &[]
    }

    fn eval(&self, args: &[ArgumentHandle<'_>], ctx: &mut dyn EvalContext) -> EvalResult;
}
