//! The engine facade: the one surface a host actually depends on. It
//! wraps `EvaluationManager` — the dependency graph and spill engine —
//! with workbook/sheet lifecycle, synchronous event notification, and
//! the scalar serialization a host gets back from `get_cell_value`.

use formulon_common::{CellAddress, EngineError, ErrKind, RelativeCoord, Sign, Value};
use formulon_eval::EvalResult;

use crate::config::EngineConfig;
use crate::error::WorkbookError;
use crate::events::{Event, EventKind, Listeners};
use crate::manager::EvaluationManager;
use crate::raw::RawContent;
use crate::table::TableDef;

/// A cell's evaluated result in the shape a host actually consumes.
/// Every evaluation collapses to exactly one of these; `serialize`/
/// `Display` render the documented textual forms for each.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedValue {
    Number(f64),
    Boolean(bool),
    Text(String),
    Infinity(Sign),
    Error(EngineError),
}

impl SerializedValue {
    fn from_value(v: Value) -> Self {
        match v {
            Value::Number(n) => SerializedValue::Number(n),
            Value::Boolean(b) => SerializedValue::Boolean(b),
            Value::String(s) => SerializedValue::Text(s),
            Value::Infinity(s) => SerializedValue::Infinity(s),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SerializedValue::Error(_))
    }

    pub fn error_kind(&self) -> Option<ErrKind> {
        match self {
            SerializedValue::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The textual rendering a host sees from `get_cell_value`: a bare
    /// error code normally, `#KIND: message` when `debug` is set.
    pub fn serialize(&self, debug: bool) -> String {
        match self {
            SerializedValue::Number(n) => Value::canonical_number_string(*n),
            SerializedValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SerializedValue::Text(s) => s.clone(),
            SerializedValue::Infinity(sign) => sign.to_string(),
            SerializedValue::Error(e) => e.serialize(debug),
        }
    }
}

impl std::fmt::Display for SerializedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.serialize(false))
    }
}

fn eval_result_to_serialized_value(result: EvalResult) -> SerializedValue {
    match result {
        EvalResult::Value(v) => SerializedValue::from_value(v),
        EvalResult::Error(e) => SerializedValue::Error(e),
        // `get_cell_evaluation_result` always resolves a cell to its own
        // slice of a spill before returning; a bare `Spilled` reaching
        // here would mean a node was queried directly rather than through
        // a cell address, which the public API never does.
        EvalResult::Spilled(s) => SerializedValue::from_value(s.origin_result().clone()),
    }
}

/// The top-level engine: owns every workbook, the shared evaluation
/// manager, and the synchronous listener registry.
pub struct Engine {
    manager: EvaluationManager,
    listeners: Listeners,
}

impl Default for Engine {
    fn default() -> Self {
        Self::build_empty()
    }
}

impl Engine {
    pub fn build_empty() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            manager: EvaluationManager::new(config),
            listeners: Listeners::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.manager.config()
    }

    /* ----- workbook / sheet lifecycle ----- */

    pub fn add_workbook(&mut self, name: impl Into<String>) -> Result<(), WorkbookError> {
        let name = name.into();
        if !self.manager.add_workbook(name.clone()) {
            return Err(WorkbookError::WorkbookAlreadyExists(name));
        }
        Ok(())
    }

    pub fn remove_workbook(&mut self, name: &str) -> Result<(), WorkbookError> {
        if !self.manager.remove_workbook(name) {
            return Err(WorkbookError::UnknownWorkbook(name.to_string()));
        }
        Ok(())
    }

    pub fn has_workbook(&self, name: &str) -> bool {
        self.manager.has_workbook(name)
    }

    fn workbook_mut(&mut self, name: &str) -> Result<&mut crate::workbook::Workbook, WorkbookError> {
        self.manager
            .workbook_mut(name)
            .ok_or_else(|| WorkbookError::UnknownWorkbook(name.to_string()))
    }

    pub fn add_sheet(&mut self, workbook: &str, sheet: impl Into<String>) -> Result<(), WorkbookError> {
        let sheet = sheet.into();
        let wb = self.workbook_mut(workbook)?;
        if !wb.add_sheet(sheet.clone()) {
            return Err(WorkbookError::SheetAlreadyExists(workbook.to_string(), sheet));
        }
        self.listeners.emit(Event::SheetAdded {
            workbook: workbook.to_string(),
            sheet,
        });
        Ok(())
    }

    pub fn remove_sheet(&mut self, workbook: &str, sheet: &str) -> Result<(), WorkbookError> {
        let wb = self.workbook_mut(workbook)?;
        if !wb.remove_sheet(sheet) {
            return Err(WorkbookError::UnknownSheet(workbook.to_string(), sheet.to_string()));
        }
        // A removed sheet can invalidate any formula that referenced it;
        // clearing the whole cache is the simplest sound response rather
        // than chasing every dependent transitively.
        self.manager.clear_evaluation_cache();
        self.listeners.emit(Event::SheetRemoved {
            workbook: workbook.to_string(),
            sheet: sheet.to_string(),
        });
        Ok(())
    }

    pub fn rename_sheet(&mut self, workbook: &str, old: &str, new: &str) -> Result<(), WorkbookError> {
        let wb = self.workbook_mut(workbook)?;
        if !wb.rename_sheet(old, new) {
            return Err(WorkbookError::UnknownSheet(workbook.to_string(), old.to_string()));
        }
        self.manager.clear_evaluation_cache();
        Ok(())
    }

    /* ----- cell content ----- */

    pub fn set_cell_content(&mut self, addr: &CellAddress, content: impl Into<RawContent>) -> Result<(), WorkbookError> {
        let workbook = addr.workbook.clone();
        let sheet_name = addr.sheet.clone();
        let sheet = self
            .workbook_mut(&workbook)?
            .sheet_mut(&sheet_name)
            .ok_or_else(|| WorkbookError::UnknownSheet(workbook.clone(), sheet_name.clone()))?;
        sheet.set(addr.row, addr.col, content.into());
        self.manager.on_cell_content_changed(&workbook, &sheet_name, addr.row, addr.col);
        self.listeners.emit(Event::CellChanged {
            workbook,
            sheet: sheet_name,
            row: addr.row,
            col: addr.col,
        });
        Ok(())
    }

    /// Bulk-write a sheet from `(A1 reference, content)` pairs.
    pub fn set_sheet_content<I>(&mut self, workbook: &str, sheet: &str, values: I) -> Result<(), WorkbookError>
    where
        I: IntoIterator<Item = (String, RawContent)>,
    {
        for (a1, content) in values {
            let coord = RelativeCoord::try_from_a1(&a1).map_err(|e| WorkbookError::InvalidReference(e.to_string()))?;
            let addr = CellAddress::new(workbook, sheet, coord.row(), coord.col());
            self.set_cell_content(&addr, content)?;
        }
        Ok(())
    }

    pub fn get_cell_content(&self, addr: &CellAddress) -> RawContent {
        self.manager
            .workbook(&addr.workbook)
            .and_then(|w| w.sheet(&addr.sheet))
            .map(|s| s.get_raw_content(addr.row, addr.col))
            .unwrap_or(RawContent::Empty)
    }

    /* ----- evaluation ----- */

    pub fn get_cell_value(&mut self, addr: &CellAddress) -> Result<SerializedValue, WorkbookError> {
        if self.manager.is_evaluating() {
            return Err(WorkbookError::ReentrantEvaluation);
        }
        let result = self
            .manager
            .get_cell_evaluation_result(&addr.workbook, &addr.sheet, addr.row, addr.col);
        Ok(eval_result_to_serialized_value(result))
    }

    /// `get_cell_value` rendered to its host-facing string form: a bare
    /// error code, or `#KIND: message` when `debug` is set and the error
    /// carries a message.
    pub fn get_cell_value_serialized(&mut self, addr: &CellAddress, debug: bool) -> Result<String, WorkbookError> {
        Ok(self.get_cell_value(addr)?.serialize(debug))
    }

    pub fn clear_evaluation_cache(&mut self) {
        self.manager.clear_evaluation_cache();
    }

    /* ----- named expressions ----- */

    pub fn add_named_expression(
        &mut self,
        workbook: &str,
        scope: Option<&str>,
        name: &str,
        expression: &str,
    ) -> Result<(), WorkbookError> {
        let wb = self.workbook_mut(workbook)?;
        if wb.named.contains(scope, name) {
            return Err(WorkbookError::NamedExpressionAlreadyExists(
                name.to_string(),
                scope.map(str::to_string),
            ));
        }
        wb.named.insert(scope.map(str::to_string), name.to_string(), expression);
        self.manager.on_named_expression_changed(workbook, scope, name);
        self.listeners.emit(Event::GlobalNamedExpressionsUpdated);
        Ok(())
    }

    pub fn remove_named_expression(&mut self, workbook: &str, scope: Option<&str>, name: &str) -> Result<(), WorkbookError> {
        let wb = self.workbook_mut(workbook)?;
        if !wb.named.remove(scope, name) {
            return Err(WorkbookError::UnknownNamedExpression(
                name.to_string(),
                scope.map(str::to_string),
            ));
        }
        self.manager.on_named_expression_changed(workbook, scope, name);
        self.listeners.emit(Event::GlobalNamedExpressionsUpdated);
        Ok(())
    }

    /* ----- tables ----- */

    pub fn add_table(&mut self, workbook: &str, table: TableDef) -> Result<(), WorkbookError> {
        let wb = self.workbook_mut(workbook)?;
        if wb.tables.contains_key(&table.name) {
            return Err(WorkbookError::TableAlreadyExists(table.name));
        }
        let name = table.name.clone();
        let sheet = table.sheet.clone();
        wb.tables.insert(name.clone(), table);
        self.manager.on_table_changed(workbook, &sheet, &name);
        self.listeners.emit(Event::TablesUpdated);
        Ok(())
    }

    pub fn remove_table(&mut self, workbook: &str, name: &str) -> Result<(), WorkbookError> {
        let wb = self.workbook_mut(workbook)?;
        let removed = wb.tables.remove(name).ok_or_else(|| WorkbookError::UnknownTable(name.to_string()))?;
        self.manager.on_table_changed(workbook, &removed.sheet, name);
        self.listeners.emit(Event::TablesUpdated);
        Ok(())
    }

    /* ----- observation ----- */

    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&Event) + 'static) {
        self.listeners.add(kind, Box::new(listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(row: u32, col: u32) -> CellAddress {
        CellAddress::new("wb", "Sheet1", row, col)
    }

    #[test]
    fn arithmetic_and_references_resolve() {
        let mut engine = Engine::build_empty();
        engine.add_workbook("wb").unwrap();
        engine.add_sheet("wb", "Sheet1").unwrap();
        engine.set_cell_content(&addr(0, 0), 10.0).unwrap();
        engine.set_cell_content(&addr(0, 1), 15.0).unwrap();
        engine.set_cell_content(&addr(0, 2), "=A1+B1").unwrap();
        assert_eq!(engine.get_cell_value(&addr(0, 2)).unwrap(), SerializedValue::Number(25.0));
    }

    #[test]
    fn unknown_workbook_is_reported() {
        let mut engine = Engine::build_empty();
        let err = engine.add_sheet("missing", "Sheet1").unwrap_err();
        assert_eq!(err, WorkbookError::UnknownWorkbook("missing".to_string()));
    }

    #[test]
    fn removing_a_sheet_invalidates_its_dependents() {
        let mut engine = Engine::build_empty();
        engine.add_workbook("wb").unwrap();
        engine.add_sheet("wb", "Sheet1").unwrap();
        engine.add_sheet("wb", "Sheet2").unwrap();
        engine.set_cell_content(&addr(0, 0), 3.0).unwrap();
        engine
            .set_cell_content(&CellAddress::new("wb", "Sheet2", 0, 0), "=Sheet1!A1*2")
            .unwrap();
        assert_eq!(
            engine.get_cell_value(&CellAddress::new("wb", "Sheet2", 0, 0)).unwrap(),
            SerializedValue::Number(6.0)
        );
        engine.remove_sheet("wb", "Sheet1").unwrap();
        let result = engine.get_cell_value(&CellAddress::new("wb", "Sheet2", 0, 0)).unwrap();
        assert_eq!(result.error_kind(), Some(ErrKind::Ref));
    }

    #[test]
    fn listeners_observe_cell_changes() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut engine = Engine::build_empty();
        engine.add_workbook("wb").unwrap();
        engine.add_sheet("wb", "Sheet1").unwrap();

        let seen = Rc::new(RefCell::new(0u32));
        let seen_clone = seen.clone();
        engine.on(EventKind::CellChanged, move |_event| {
            *seen_clone.borrow_mut() += 1;
        });
        engine.set_cell_content(&addr(0, 0), 1.0).unwrap();
        engine.set_cell_content(&addr(0, 1), 2.0).unwrap();
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn debug_mode_surfaces_error_message() {
        let mut engine = Engine::build_empty();
        engine.add_workbook("wb").unwrap();
        engine.add_sheet("wb", "Sheet1").unwrap();
        // A malformed formula carries a diagnostic message; an arithmetic
        // error like `0/0` only carries a bare kind.
        engine.set_cell_content(&addr(0, 0), "=1+").unwrap();
        let value = engine.get_cell_value(&addr(0, 0)).unwrap();
        assert_eq!(value.error_kind(), Some(ErrKind::Error));
        assert_eq!(value.serialize(false), "#ERROR!");
        assert!(value.serialize(true).starts_with("#ERROR!: "));
    }
}
