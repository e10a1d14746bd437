use crate::{CellAddress, SerializedValue, Engine};

/// Evaluate a formula in a minimal one-sheet workbook and return the
/// resulting scalar value. Intended for documentation examples, to avoid
/// repeating engine/workbook/sheet setup in every doc comment.
///
/// # Example
///
/// ```rust
/// # use formulon::doc_examples::eval_scalar;
/// let value = eval_scalar("=SUM(1,2,3)")?;
/// assert_eq!(value, formulon::SerializedValue::Number(6.0));
/// # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
/// ```
pub fn eval_scalar(formula: &str) -> Result<SerializedValue, Box<dyn std::error::Error + Send + Sync>> {
    let mut engine = Engine::build_empty();
    engine.add_workbook("doc")?;
    engine.add_sheet("doc", "Sheet1")?;

    let addr = CellAddress::new("doc", "Sheet1", 0, 0);
    engine.set_cell_content(&addr, formula.to_string())?;
    Ok(engine.get_cell_value(&addr)?)
}
