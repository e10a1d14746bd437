//! The evaluation manager: the single `EvalContext` implementation that
//! threads workbook storage, the dependency graph and spill state through
//! the tree-walking evaluator in `formulon-eval`.
//!
//! `formulon-parse`'s `ReferenceType` carries 1-based row/col (matching A1
//! notation); every other piece of this crate — `Sheet`, `NodeKey`,
//! `CellAddress` — is 0-based. This module is the seam where that
//! conversion happens; nowhere else in the crate should see a 1-based
//! index.
//!
//! Cycle detection does not build the dependency graph up front and run
//! Tarjan over it. Evaluation is already recursive (a cell's formula pulls
//! its precedents on demand), so cycles are caught the cheap way: a stack
//! of node keys currently being evaluated. Asking to resolve a key already
//! on that stack is a live, runtime-confirmed cycle — not a possibility
//! inferred from static structure — which also sidesteps false positives
//! from `IF` branches that were never taken. See `DESIGN.md` for the
//! tradeoff against an upfront two-phase build-then-run design.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use formulon_common::{range::RangeEnd, EngineError, ErrKind, MultiSheetRange, NodeKey, Range, SheetSelector, Value};
use formulon_eval::{EvalContext, EvalResult, Function, SpillFn, SpillResult};
use formulon_parse::parser::TableReference;

use crate::config::EngineConfig;
use crate::raw::RawContent;
use crate::sheet::{CellSlot, FormulaSlot, Sheet};
use crate::workbook::Workbook;

/// Cached state for one graph node (a cell or a named expression). Ranges,
/// tables and multi-sheet ranges are never cached on their own — they are
/// resolved inline while some cell or named expression is being evaluated,
/// and the *concrete* cells they touch are what gets recorded as `deps`.
#[derive(Clone)]
struct EvaluatedNode {
    deps: FxHashSet<NodeKey>,
    frontier_dependencies: FxHashSet<NodeKey>,
    #[allow(dead_code)]
    discarded_frontier_dependencies: FxHashSet<NodeKey>,
    result: EvalResult,
}

#[derive(Clone)]
struct SpillRecord {
    workbook: String,
    sheet: String,
    start_row: u32,
    start_col: u32,
    rows: u32,
    cols: u32,
}

impl SpillRecord {
    fn covers(&self, row: u32, col: u32) -> bool {
        row >= self.start_row
            && row < self.start_row + self.rows
            && col >= self.start_col
            && col < self.start_col + self.cols
    }
}

/// One frame of the currently-running evaluation: which node is being
/// computed, and the concrete/frontier dependencies it has accumulated so
/// far via ctx-threaded calls (including calls made several spill
/// redirections deep — `resolve_cell` always records against whichever
/// frame is on top when it is invoked, regardless of how many `SpillFn`
/// closures are on the Rust call stack in between).
struct Frame {
    key: NodeKey,
    workbook: String,
    sheet: String,
    deps: FxHashSet<NodeKey>,
    frontier: FxHashSet<NodeKey>,
}

/// Bound used when deciding whether to materialize a bounded range cell by
/// cell (correct in the presence of spills) or fall back to the sparse
/// occupied-cell iterator (cheap, but blind to spill redirection outside
/// the occupied set — acceptable for the pathologically large ranges this
/// guards against, see `DESIGN.md`).
const MAX_MATERIALIZED_RANGE_CELLS: u64 = 200_000;

pub struct EvaluationManager {
    workbooks: FxHashMap<String, Workbook>,
    evaluated_nodes: FxHashMap<NodeKey, EvaluatedNode>,
    reverse_deps: FxHashMap<NodeKey, FxHashSet<NodeKey>>,
    spills: FxHashMap<NodeKey, SpillRecord>,
    spill_cover: FxHashMap<NodeKey, NodeKey>,
    cycle_participants: FxHashSet<NodeKey>,
    eval_stack: Vec<Frame>,
    pass_touched: FxHashSet<NodeKey>,
    requires_rerun: bool,
    is_evaluating: bool,
    config: EngineConfig,
}

impl EvaluationManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            workbooks: FxHashMap::default(),
            evaluated_nodes: FxHashMap::default(),
            reverse_deps: FxHashMap::default(),
            spills: FxHashMap::default(),
            spill_cover: FxHashMap::default(),
            cycle_participants: FxHashSet::default(),
            eval_stack: Vec::new(),
            pass_touched: FxHashSet::default(),
            requires_rerun: false,
            is_evaluating: false,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_evaluating(&self) -> bool {
        self.is_evaluating
    }

    pub fn workbooks(&self) -> &FxHashMap<String, Workbook> {
        &self.workbooks
    }

    pub fn workbook(&self, name: &str) -> Option<&Workbook> {
        self.workbooks.get(name)
    }

    pub fn workbook_mut(&mut self, name: &str) -> Option<&mut Workbook> {
        self.workbooks.get_mut(name)
    }

    pub fn has_workbook(&self, name: &str) -> bool {
        self.workbooks.contains_key(name)
    }

    pub fn add_workbook(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.workbooks.contains_key(&name) {
            return false;
        }
        self.workbooks.insert(name, Workbook::new());
        true
    }

    pub fn remove_workbook(&mut self, name: &str) -> bool {
        if self.workbooks.remove(name).is_none() {
            return false;
        }
        self.evaluated_nodes.retain(|k, _| node_workbook(k) != Some(name));
        self.reverse_deps.retain(|k, _| node_workbook(k) != Some(name));
        self.spills.retain(|k, _| node_workbook(k) != Some(name));
        self.spill_cover.retain(|k, v| node_workbook(k) != Some(name) && node_workbook(v) != Some(name));
        true
    }

    /// Drop every cached evaluation result and spill record. Raw content is
    /// untouched; the next read of any cell re-runs its formula from
    /// scratch.
    pub fn clear_evaluation_cache(&mut self) {
        self.evaluated_nodes.clear();
        self.reverse_deps.clear();
        self.spills.clear();
        self.spill_cover.clear();
        self.cycle_participants.clear();
    }

    /// Entry point for a host write to a cell's raw content. Reparsing and
    /// storage happen in `Sheet::set`; this is responsible for the
    /// dependency-graph side effects — dropping the node's own cache entry
    /// (if it had one), tearing down any spill it used to own, and
    /// cascading invalidation to everything that read it.
    pub fn on_cell_content_changed(&mut self, workbook: &str, sheet: &str, row: u32, col: u32) {
        let key = NodeKey::Cell {
            workbook: workbook.to_string(),
            sheet: sheet.to_string(),
            row,
            col,
        };
        // A write into a cell that is itself covered by an *existing*
        // spill forces the spill's origin to recompute, where it will
        // detect the conflict during placement and surface #SPILL! (spec
        // §8 seed scenario "spill blocked by a later write").
        if let Some(origin) = self.spill_cover.get(&key).cloned() {
            if origin != key {
                self.drop_cache_entry(&origin);
                self.invalidate_transitive(&origin);
            }
        }
        self.drop_cache_entry(&key);
        self.invalidate_transitive(&key);
    }

    pub fn on_named_expression_changed(&mut self, workbook: &str, scope: Option<&str>, name: &str) {
        let key = NodeKey::Named {
            workbook: workbook.to_string(),
            scope: scope.map(str::to_string),
            name: name.to_string(),
        };
        self.drop_cache_entry(&key);
        self.invalidate_transitive(&key);
    }

    /// Invalidate everything that read through a structured reference into
    /// `table`, used when a table's header row, column set or bounds
    /// change shape (adding/removing a sheet underneath it has the same
    /// effect as a content change on every cell the table covers).
    pub fn on_table_changed(&mut self, workbook: &str, sheet: &str, name: &str) {
        let keys: Vec<NodeKey> = self
            .evaluated_nodes
            .keys()
            .filter(|k| matches!(k, NodeKey::Table { workbook: w, sheet: s, name: n, .. } if w == workbook && s == sheet && n == name))
            .cloned()
            .collect();
        for key in keys {
            self.invalidate_transitive(&key);
        }
    }

    /// Returns the evaluated result for a single cell, triggering
    /// evaluation (and the bounded re-run loop) as needed.
    pub fn get_cell_evaluation_result(&mut self, workbook: &str, sheet: &str, row: u32, col: u32) -> EvalResult {
        let key = NodeKey::Cell {
            workbook: workbook.to_string(),
            sheet: sheet.to_string(),
            row,
            col,
        };
        if let Some(origin) = self.spill_cover.get(&key).cloned() {
            if self.is_evaluating {
                return EvalResult::error(ErrKind::Error);
            }
            self.is_evaluating = true;
            self.run_with_rerun(&origin);
            let result = match self.evaluated_nodes.get(&origin).map(|n| n.result.clone()) {
                Some(EvalResult::Spilled(s)) => {
                    let (origin_row, origin_col) = match &origin {
                        NodeKey::Cell { row, col, .. } => (*row, *col),
                        _ => (0, 0),
                    };
                    s.at(row.saturating_sub(origin_row), col.saturating_sub(origin_col), self)
                }
                Some(other) => other,
                None => EvalResult::error(ErrKind::Ref),
            };
            self.is_evaluating = false;
            return result;
        }
        let raw_empty = self
            .workbooks
            .get(workbook)
            .and_then(|w| w.sheet(sheet))
            .map(|s| s.is_empty_at(row, col))
            .unwrap_or(true);
        // A genuinely empty, un-spilled cell never enters evaluation:
        // it serializes as the empty string, distinct from the `0` a
        // *formula* sees when it dereferences a blank cell.
        if raw_empty {
            return EvalResult::Value(Value::String(String::new()));
        }
        if self.is_evaluating {
            return EvalResult::error(ErrKind::Error);
        }
        self.is_evaluating = true;
        let result = self.run_with_rerun(&key);
        self.is_evaluating = false;
        result
    }

    fn run_with_rerun(&mut self, key: &NodeKey) -> EvalResult {
        let mut iterations: u32 = 0;
        loop {
            iterations += 1;
            self.pass_touched.clear();
            self.requires_rerun = false;
            self.ensure_evaluated(key);
            if !self.requires_rerun {
                break;
            }
            if iterations >= self.config.max_rerun_iterations {
                #[cfg(feature = "tracing")]
                tracing::warn!(cell = %key.encode(), iterations, "requiresReRun bound exceeded, giving up");
                self.drop_cache_entry(key);
                self.write_node(key.clone(), Default::default(), Default::default(), EvalResult::error(ErrKind::Error));
                break;
            }
            self.drop_cache_entry(key);
        }
        self.cached_result_as_scalar(key)
    }

    /* ───────────────────────── cache / invalidation plumbing ───────────────────────── */

    fn record_dep(&mut self, key: NodeKey) {
        if let Some(frame) = self.eval_stack.last_mut() {
            frame.deps.insert(key);
        }
    }

    fn record_frontier(&mut self, key: NodeKey) {
        if let Some(frame) = self.eval_stack.last_mut() {
            frame.frontier.insert(key);
        }
    }

    fn current_home(&self) -> (String, String) {
        match self.eval_stack.last() {
            Some(frame) => (frame.workbook.clone(), frame.sheet.clone()),
            None => (String::new(), String::new()),
        }
    }

    fn write_node(&mut self, key: NodeKey, deps: FxHashSet<NodeKey>, frontier: FxHashSet<NodeKey>, result: EvalResult) {
        for d in deps.iter().chain(frontier.iter()) {
            self.reverse_deps.entry(d.clone()).or_default().insert(key.clone());
        }
        let discarded = frontier.difference(&deps).cloned().collect();
        self.evaluated_nodes.insert(
            key,
            EvaluatedNode {
                deps,
                frontier_dependencies: frontier,
                discarded_frontier_dependencies: discarded,
                result,
            },
        );
    }

    fn drop_cache_entry(&mut self, key: &NodeKey) {
        if let Some(old) = self.evaluated_nodes.remove(key) {
            for d in old.deps.iter().chain(old.frontier_dependencies.iter()) {
                if let Some(set) = self.reverse_deps.get_mut(d) {
                    set.remove(key);
                }
            }
            if self.pass_touched.contains(key) {
                self.requires_rerun = true;
            }
        }
        self.remove_spill_record(key);
    }

    fn invalidate_transitive(&mut self, key: &NodeKey) {
        let mut queue: VecDeque<NodeKey> = self.reverse_deps.get(key).cloned().unwrap_or_default().into_iter().collect();
        let mut seen: FxHashSet<NodeKey> = FxHashSet::default();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node.clone()) {
                continue;
            }
            if self.evaluated_nodes.contains_key(&node) {
                for further in self.reverse_deps.get(&node).cloned().unwrap_or_default() {
                    queue.push_back(further);
                }
                self.drop_cache_entry(&node);
            }
        }
    }

    fn remove_spill_record(&mut self, origin: &NodeKey) {
        if let Some(rec) = self.spills.remove(origin) {
            for r in 0..rec.rows {
                for c in 0..rec.cols {
                    if r == 0 && c == 0 {
                        continue;
                    }
                    let ck = NodeKey::Cell {
                        workbook: rec.workbook.clone(),
                        sheet: rec.sheet.clone(),
                        row: rec.start_row + r,
                        col: rec.start_col + c,
                    };
                    self.spill_cover.remove(&ck);
                    self.drop_cache_entry(&ck);
                    self.invalidate_transitive(&ck);
                }
            }
        }
    }

    fn commit_spill_record(&mut self, origin: NodeKey, workbook: String, sheet: String, row0: u32, col0: u32, rows: u32, cols: u32) {
        self.remove_spill_record(&origin);
        let mut newly_covered = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                if r == 0 && c == 0 {
                    continue;
                }
                let ck = NodeKey::Cell {
                    workbook: workbook.clone(),
                    sheet: sheet.clone(),
                    row: row0 + r,
                    col: col0 + c,
                };
                self.spill_cover.insert(ck.clone(), origin.clone());
                newly_covered.push(ck);
            }
        }
        self.spills.insert(origin, SpillRecord { workbook, sheet, start_row: row0, start_col: col0, rows, cols });
        for ck in &newly_covered {
            self.invalidate_transitive(ck);
        }
    }

    /* ───────────────────────── cell/named node evaluation ───────────────────────── */

    fn ensure_evaluated(&mut self, key: &NodeKey) {
        if self.evaluated_nodes.contains_key(key) {
            return;
        }
        if let Some(pos) = self.eval_stack.iter().position(|f| &f.key == key) {
            for f in &self.eval_stack[pos..] {
                self.cycle_participants.insert(f.key.clone());
            }
            return;
        }
        match key {
            NodeKey::Cell { .. } => self.evaluate_cell_node(key),
            NodeKey::Named { .. } => self.evaluate_named_node(key),
            _ => {}
        }
    }

    fn evaluate_cell_node(&mut self, key: &NodeKey) {
        let (workbook, sheet, row0, col0) = match key.clone() {
            NodeKey::Cell { workbook, sheet, row, col } => (workbook, sheet, row, col),
            _ => return,
        };
        self.pass_touched.insert(key.clone());
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("evaluate_cell", cell = %key.encode()).entered();

        let slot = self
            .workbooks
            .get(&workbook)
            .and_then(|w| w.sheet(&sheet))
            .and_then(|s| s.slot(row0, col0))
            .cloned();

        self.eval_stack.push(Frame {
            key: key.clone(),
            workbook: workbook.clone(),
            sheet: sheet.clone(),
            deps: Default::default(),
            frontier: Default::default(),
        });
        let raw_result = match slot {
            None => EvalResult::Value(Value::Number(0.0)),
            Some(CellSlot::Literal(raw)) => literal_to_eval_result(raw),
            Some(CellSlot::Formula { parsed: FormulaSlot::ParseError(msg), .. }) => EvalResult::error_with(ErrKind::Error, msg),
            Some(CellSlot::Formula { parsed: FormulaSlot::Parsed(ast), .. }) => formulon_eval::eval_node(&ast, self),
        };
        let frame = self.eval_stack.pop().expect("frame pushed above");

        let is_cycle = self.cycle_participants.remove(key);
        let result = if is_cycle { EvalResult::error(ErrKind::Cycle) } else { raw_result };
        let result = self.apply_spill_placement(key, &workbook, &sheet, row0, col0, result);

        self.write_node(key.clone(), frame.deps, frame.frontier, result);
    }

    fn evaluate_named_node(&mut self, key: &NodeKey) {
        let (workbook, scope, name) = match key.clone() {
            NodeKey::Named { workbook, scope, name } => (workbook, scope, name),
            _ => return,
        };
        self.pass_touched.insert(key.clone());

        let (ast, resolved_scope) = match self.workbooks.get(&workbook).and_then(|w| w.named.resolve(scope.as_deref(), &name)) {
            Some((crate::named::NamedFormula::Parsed(ast), scope)) => (Some(ast.clone()), scope),
            Some((crate::named::NamedFormula::ParseError(msg), scope)) => {
                self.write_node(key.clone(), Default::default(), Default::default(), EvalResult::error_with(ErrKind::Error, msg.clone()));
                let _ = scope;
                return;
            }
            None => {
                self.write_node(key.clone(), Default::default(), Default::default(), EvalResult::error(ErrKind::Ref));
                return;
            }
        };
        let home_sheet = resolved_scope.unwrap_or_default();
        self.eval_stack.push(Frame {
            key: key.clone(),
            workbook: workbook.clone(),
            sheet: home_sheet,
            deps: Default::default(),
            frontier: Default::default(),
        });
        let raw_result = match ast {
            Some(ast) => formulon_eval::eval_node(&ast, self),
            None => EvalResult::error(ErrKind::Ref),
        };
        let frame = self.eval_stack.pop().expect("frame pushed above");

        let is_cycle = self.cycle_participants.remove(key);
        let result = if is_cycle { EvalResult::error(ErrKind::Cycle) } else { raw_result };
        self.write_node(key.clone(), frame.deps, frame.frontier, result);
    }

    fn apply_spill_placement(&mut self, key: &NodeKey, workbook: &str, sheet: &str, row0: u32, col0: u32, result: EvalResult) -> EvalResult {
        match &result {
            EvalResult::Spilled(sr) if sr.rows() * sr.cols() > 1 => {
                let rows = sr.rows();
                let cols = sr.cols();
                let mut conflict = false;
                'scan: for r in 0..rows {
                    for c in 0..cols {
                        if r == 0 && c == 0 {
                            continue;
                        }
                        let rr = row0 + r;
                        let cc = col0 + c;
                        let occupied = self
                            .workbooks
                            .get(workbook)
                            .and_then(|w| w.sheet(sheet))
                            .map(|s| !s.is_empty_at(rr, cc))
                            .unwrap_or(false);
                        if occupied {
                            conflict = true;
                            break 'scan;
                        }
                        let ck = NodeKey::Cell { workbook: workbook.to_string(), sheet: sheet.to_string(), row: rr, col: cc };
                        if self.spilled_cell_belongs_to_other(&ck, key) {
                            conflict = true;
                            break 'scan;
                        }
                    }
                }
                if conflict {
                    self.remove_spill_record(key);
                    EvalResult::error(ErrKind::Spill)
                } else {
                    self.commit_spill_record(key.clone(), workbook.to_string(), sheet.to_string(), row0, col0, rows, cols);
                    result
                }
            }
            _ => {
                self.remove_spill_record(key);
                result
            }
        }
    }

    fn spilled_cell_belongs_to_other(&self, ck: &NodeKey, key: &NodeKey) -> bool {
        if let Some(owner) = self.spill_cover.get(ck) {
            return owner != key;
        }
        self.spills.contains_key(ck)
    }

    /* ───────────────────────── reading through spill redirection ───────────────────────── */

    fn read_cell_value(&mut self, workbook: &str, sheet: &str, row0: u32, col0: u32) -> EvalResult {
        let key = NodeKey::Cell { workbook: workbook.to_string(), sheet: sheet.to_string(), row: row0, col: col0 };
        self.record_dep(key.clone());
        if let Some(origin) = self.spill_cover.get(&key).cloned() {
            self.ensure_evaluated(&origin);
            if self.cycle_participants.contains(&origin) && !self.evaluated_nodes.contains_key(&origin) {
                return EvalResult::error(ErrKind::Cycle);
            }
            let spill = match self.evaluated_nodes.get(&origin).map(|n| n.result.clone()) {
                Some(EvalResult::Spilled(s)) => s,
                Some(other) => return other,
                None => return EvalResult::error(ErrKind::Ref),
            };
            let (origin_row, origin_col) = match &origin {
                NodeKey::Cell { row, col, .. } => (*row, *col),
                _ => (0, 0),
            };
            return spill.at(row0.saturating_sub(origin_row), col0.saturating_sub(origin_col), self);
        }
        self.ensure_evaluated(&key);
        if self.cycle_participants.contains(&key) && !self.evaluated_nodes.contains_key(&key) {
            return EvalResult::error(ErrKind::Cycle);
        }
        self.cached_result_as_scalar(&key)
    }

    fn cached_result_as_scalar(&mut self, key: &NodeKey) -> EvalResult {
        let cloned = match self.evaluated_nodes.get(key) {
            Some(n) => n.result.clone(),
            None => return EvalResult::error(ErrKind::Ref),
        };
        match cloned {
            EvalResult::Spilled(s) => s.at(0, 0, self),
            other => other,
        }
    }

    /* ───────────────────────── bounded-range / used-range support ───────────────────────── */

    fn resolve_bounds(&self, workbook: &str, sheet: &str, sr: Option<u32>, sc: Option<u32>, er: Option<u32>, ec: Option<u32>) -> Option<(u32, u32, u32, u32)> {
        let sheet_ref = self.workbooks.get(workbook).and_then(|w| w.sheet(sheet));
        let row_lo = sr.unwrap_or(0);
        let col_lo = sc.unwrap_or(0);
        let row_hi = match er {
            Some(r) => r,
            None => sheet_ref.and_then(|s| s.max_used_row_in_col_range(col_lo, ec.unwrap_or(col_lo))).unwrap_or(row_lo),
        };
        let col_hi = match ec {
            Some(c) => c,
            None => sheet_ref.and_then(|s| s.max_used_col_in_row_range(row_lo, er.unwrap_or(row_lo))).unwrap_or(col_lo),
        };
        Some((row_lo.min(row_hi), col_lo.min(col_hi), row_lo.max(row_hi), col_lo.max(col_hi)))
    }

    fn iter_bounded(&mut self, workbook: &str, sheet: &str, row_lo: u32, col_lo: u32, row_hi: u32, col_hi: u32) -> Vec<EvalResult> {
        let total = (row_hi - row_lo + 1) as u64 * (col_hi - col_lo + 1) as u64;
        if total <= MAX_MATERIALIZED_RANGE_CELLS {
            let mut out = Vec::with_capacity(total as usize);
            for r in row_lo..=row_hi {
                for c in col_lo..=col_hi {
                    out.push(self.read_cell_value(workbook, sheet, r, c));
                }
            }
            out
        } else {
            let mut coords: FxHashSet<(u32, u32)> = self
                .workbooks
                .get(workbook)
                .and_then(|w| w.sheet(sheet))
                .map(|s| s.occupied_in(row_lo, col_lo, row_hi, col_hi).collect())
                .unwrap_or_default();
            for (origin_key, rec) in self.spills.iter() {
                if rec.workbook != workbook || rec.sheet != sheet {
                    continue;
                }
                let (origin_row, origin_col) = match origin_key {
                    NodeKey::Cell { row, col, .. } => (*row, *col),
                    _ => continue,
                };
                if origin_row >= row_lo && origin_row <= row_hi && origin_col >= col_lo && origin_col <= col_hi {
                    coords.insert((origin_row, origin_col));
                }
            }
            let mut coords: Vec<(u32, u32)> = coords.into_iter().collect();
            coords.sort_unstable();
            coords.into_iter().map(|(r, c)| self.read_cell_value(workbook, sheet, r, c)).collect()
        }
    }
}

fn node_workbook(key: &NodeKey) -> Option<&str> {
    match key {
        NodeKey::Cell { workbook, .. }
        | NodeKey::Range { workbook, .. }
        | NodeKey::MultiRangeList { workbook, .. }
        | NodeKey::MultiRangeRange { workbook, .. }
        | NodeKey::Named { workbook, .. }
        | NodeKey::Table { workbook, .. } => Some(workbook),
    }
}

fn literal_to_eval_result(raw: RawContent) -> EvalResult {
    match raw {
        RawContent::Empty => EvalResult::Value(Value::Number(0.0)),
        RawContent::Number(n) => EvalResult::Value(Value::Number(n)),
        RawContent::Boolean(b) => EvalResult::Value(Value::Boolean(b)),
        RawContent::String(s) => match ErrKind::parse(&s) {
            Some(kind) => EvalResult::error(kind),
            None => EvalResult::Value(Value::String(s)),
        },
    }
}

fn range_area_string(start_row: u32, start_col: u32, end_row: Option<u32>, end_col: u32) -> String {
    let end_row_s = end_row.map(|r| r.to_string()).unwrap_or_else(|| "INFINITY".to_string());
    format!("{start_row}:{start_col}:{end_row_s}:{end_col}")
}

impl EvalContext for EvaluationManager {
    fn resolve_cell(&mut self, sheet: Option<&str>, row: u32, col: u32) -> EvalResult {
        let (workbook, home_sheet) = self.current_home();
        let sheet_name = sheet.map(str::to_string).unwrap_or(home_sheet);
        if row == 0 || col == 0 {
            return EvalResult::error(ErrKind::Ref);
        }
        self.read_cell_value(&workbook, &sheet_name, row - 1, col - 1)
    }

    fn resolve_range(
        &mut self,
        sheet: Option<&str>,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> EvalResult {
        let (workbook, home_sheet) = self.current_home();
        let sheet_name = sheet.map(str::to_string).unwrap_or(home_sheet);
        let (sr, sc, er, ec) = match (start_row, start_col, end_row, end_col) {
            (Some(sr), Some(sc), Some(er), Some(ec)) if sr >= 1 && sc >= 1 && er >= 1 && ec >= 1 => (sr - 1, sc - 1, er - 1, ec - 1),
            _ => return EvalResult::error(ErrKind::Value),
        };
        let row_lo = sr.min(er);
        let row_hi = sr.max(er);
        let col_lo = sc.min(ec);
        let col_hi = sc.max(ec);
        if row_lo == row_hi && col_lo == col_hi {
            return self.read_cell_value(&workbook, &sheet_name, row_lo, col_lo);
        }
        let range_key = NodeKey::Range {
            workbook: workbook.clone(),
            sheet: sheet_name.clone(),
            range: Range::new(row_lo, col_lo, RangeEnd::Number(row_hi), RangeEnd::Number(col_hi)),
        };
        self.record_frontier(range_key);

        let origin = match self.read_cell_value(&workbook, &sheet_name, row_lo, col_lo).into_value_result() {
            Ok(v) => v,
            Err(e) => return EvalResult::Error(e),
        };
        let rows = row_hi - row_lo + 1;
        let cols = col_hi - col_lo + 1;
        let sheet_for_fn = sheet_name.clone();
        let at_fn: SpillFn = Arc::new(move |ro, co, ctx| ctx.resolve_cell(Some(&sheet_for_fn), row_lo + ro + 1, col_lo + co + 1));
        EvalResult::Spilled(SpillResult::new(rows, cols, origin, format!("range:{sheet_name}"), at_fn))
    }

    fn iter_range_values(
        &mut self,
        sheet: Option<&str>,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> Vec<EvalResult> {
        let (workbook, home_sheet) = self.current_home();
        let sheet_name = sheet.map(str::to_string).unwrap_or(home_sheet);
        let sr0 = start_row.map(|r| r - 1);
        let sc0 = start_col.map(|c| c - 1);
        let er0 = end_row.map(|r| r - 1);
        let ec0 = end_col.map(|c| c - 1);

        if er0.is_none() || ec0.is_none() {
            let area = range_area_string(sr0.unwrap_or(0), sc0.unwrap_or(0), er0, ec0.unwrap_or(0));
            let range_key = NodeKey::Range { workbook: workbook.clone(), sheet: sheet_name.clone(), range: open_range(sr0, sc0, er0, ec0) };
            let _ = area;
            self.record_frontier(range_key);
        }

        let Some((row_lo, col_lo, row_hi, col_hi)) = self.resolve_bounds(&workbook, &sheet_name, sr0, sc0, er0, ec0) else {
            return Vec::new();
        };
        self.iter_bounded(&workbook, &sheet_name, row_lo, col_lo, row_hi, col_hi)
    }

    fn resolve_multi_sheet_range(
        &mut self,
        selector: &SheetSelector,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> EvalResult {
        let (workbook, _) = self.current_home();
        let (sr, sc, er, ec) = match (start_row, start_col, end_row, end_col) {
            (Some(sr), Some(sc), Some(er), Some(ec)) if sr >= 1 && sc >= 1 && er >= 1 && ec >= 1 => {
                (sr - 1, sc - 1, er - 1, ec - 1)
            }
            _ => return EvalResult::error(ErrKind::Value),
        };
        let range = Range::new(
            sr.min(er),
            sc.min(ec),
            RangeEnd::Number(sr.max(er)),
            RangeEnd::Number(sc.max(ec)),
        );
        let msr = MultiSheetRange { workbook: workbook.clone(), selector: selector.clone(), range };
        let key = NodeKey::for_multi_sheet_range(workbook, &msr);
        self.record_frontier(key);
        // Excel restricts 3-D references to function arguments (`SUM(Sheet1:Sheet3!A1)`);
        // used as a bare operand it never collapses to a scalar.
        EvalResult::error(ErrKind::Value)
    }

    fn iter_multi_sheet_range_values(
        &mut self,
        selector: &SheetSelector,
        start_row: Option<u32>,
        start_col: Option<u32>,
        end_row: Option<u32>,
        end_col: Option<u32>,
    ) -> Vec<EvalResult> {
        let (workbook, _) = self.current_home();
        let sheets = match self.workbooks.get(&workbook).map(|w| w.resolve_sheet_selector(selector)) {
            Some(Ok(sheets)) => sheets,
            _ => return vec![EvalResult::error(ErrKind::Ref)],
        };
        let mut out = Vec::new();
        for sheet in sheets {
            out.extend(self.iter_range_values(Some(&sheet), start_row, start_col, end_row, end_col));
        }
        out
    }

    fn resolve_named(&mut self, scope: Option<&str>, name: &str) -> EvalResult {
        let (workbook, _) = self.current_home();
        let exists = self.workbooks.get(&workbook).map(|w| w.named.resolve(scope, name).is_some()).unwrap_or(false);
        if !exists {
            return EvalResult::error(ErrKind::Ref);
        }
        let resolved_scope = self
            .workbooks
            .get(&workbook)
            .and_then(|w| w.named.resolve(scope, name))
            .and_then(|(_, s)| s);
        let key = NodeKey::Named { workbook: workbook.clone(), scope: resolved_scope, name: name.to_string() };
        self.record_dep(key.clone());
        self.ensure_evaluated(&key);
        if self.cycle_participants.contains(&key) && !self.evaluated_nodes.contains_key(&key) {
            return EvalResult::error(ErrKind::Cycle);
        }
        self.cached_result_as_scalar(&key)
    }

    fn resolve_table(&mut self, table_ref: &TableReference) -> EvalResult {
        let (workbook, sheet_name) = self.current_home();
        let bounds = match self.table_bounds(&workbook, &table_ref.name, table_ref.specifier.as_ref()) {
            Ok(b) => b,
            Err(e) => return EvalResult::error(e),
        };
        let (start_row, start_col, end_row, end_col, table_sheet) = bounds;
        match end_row {
            Some(er) => self.resolve_range(Some(&table_sheet), Some(start_row + 1), Some(start_col + 1), Some(er + 1), Some(end_col + 1)),
            None => {
                let area = range_area_string(start_row, start_col, None, end_col);
                let key = NodeKey::Table { workbook: workbook.clone(), sheet: table_sheet.clone(), name: table_ref.name.clone(), area };
                self.record_frontier(key);
                self.resolve_range(Some(&table_sheet), Some(start_row + 1), Some(start_col + 1), None, Some(end_col + 1))
            }
        }
        .tap_sheet(&sheet_name)
    }

    fn iter_table_values(&mut self, table_ref: &TableReference) -> Vec<EvalResult> {
        let (workbook, _) = self.current_home();
        let bounds = match self.table_bounds(&workbook, &table_ref.name, table_ref.specifier.as_ref()) {
            Ok(b) => b,
            Err(e) => return vec![EvalResult::error(e)],
        };
        let (start_row, start_col, end_row, end_col, table_sheet) = bounds;
        if end_row.is_none() {
            let area = range_area_string(start_row, start_col, None, end_col);
            let key = NodeKey::Table { workbook: workbook.clone(), sheet: table_sheet.clone(), name: table_ref.name.clone(), area };
            self.record_frontier(key);
        }
        self.iter_range_values(
            Some(&table_sheet),
            Some(start_row + 1),
            Some(start_col + 1),
            end_row.map(|r| r + 1),
            Some(end_col + 1),
        )
    }

    fn lookup_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        formulon_eval::get(name)
    }

    fn current_cell(&self) -> NodeKey {
        self.eval_stack
            .last()
            .map(|f| f.key.clone())
            .unwrap_or(NodeKey::Cell { workbook: String::new(), sheet: String::new(), row: 0, col: 0 })
    }
}

/// `resolve_table` doesn't need to restore the caller's home sheet — every
/// `EvalContext` call takes an explicit sheet override — but the helper
/// name documents that `resolve_range` was called with the table's own
/// sheet rather than the currently-evaluating cell's.
trait TapSheet {
    fn tap_sheet(self, _sheet: &str) -> Self;
}

impl TapSheet for EvalResult {
    fn tap_sheet(self, _sheet: &str) -> Self {
        self
    }
}

fn open_range(sr: Option<u32>, sc: Option<u32>, er: Option<u32>, ec: Option<u32>) -> Range {
    Range::new(
        sr.unwrap_or(0),
        sc.unwrap_or(0),
        er.map(RangeEnd::Number).unwrap_or(RangeEnd::Infinity),
        ec.map(RangeEnd::Number).unwrap_or(RangeEnd::Infinity),
    )
}

impl EvaluationManager {
    fn table_bounds(&self, workbook: &str, table_name: &str, specifier: Option<&formulon_parse::parser::TableSpecifier>) -> Result<(u32, u32, Option<u32>, u32, String), ErrKind> {
        let wb = self.workbooks.get(workbook).ok_or(ErrKind::Ref)?;
        let table = wb.tables.get(table_name).ok_or(ErrKind::Ref)?;
        let sheet = wb.sheet(&table.sheet).ok_or(ErrKind::Ref)?;
        let (start_row, start_col, end_row, end_col) = table.resolve(specifier, sheet)?;
        Ok((start_row, start_col, end_row, end_col, table.sheet.clone()))
    }
}
