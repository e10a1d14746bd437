//! A single sheet: a sparse map from zero-based `(row, col)` to cell
//! content. We key internally by `(row, col)` pairs rather than the A1
//! string itself — the codec in `formulon_common::node_key` is the
//! canonical string form used at the graph-node boundary; internally a
//! tuple key is cheaper and just as unambiguous, and `to_a1` is always
//! available for diagnostics.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use formulon_parse::parser::ASTNode;

use crate::raw::RawContent;

/// What's actually stored for one occupied cell.
#[derive(Clone, Debug)]
pub(crate) enum CellSlot {
    Literal(RawContent),
    Formula {
        source: String,
        parsed: FormulaSlot,
    },
}

#[derive(Clone, Debug)]
pub(crate) enum FormulaSlot {
    Parsed(Arc<ASTNode>),
    /// The parser rejected the formula text with a lexical or syntactic
    /// failure — stored so evaluation can surface it as `ErrKind::Error`
    /// without re-parsing on every read.
    ParseError(String),
}

#[derive(Default)]
pub struct Sheet {
    cells: FxHashMap<(u32, u32), CellSlot>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slot(&self, row: u32, col: u32) -> Option<&CellSlot> {
        self.cells.get(&(row, col))
    }

    pub(crate) fn set(&mut self, row: u32, col: u32, content: RawContent) {
        match content {
            RawContent::Empty => {
                self.cells.remove(&(row, col));
            }
            RawContent::String(s) if s.starts_with('=') => {
                let source = s[1..].to_string();
                let parsed = match formulon_parse::parser::parse(&source) {
                    Ok(ast) => FormulaSlot::Parsed(Arc::new(ast)),
                    Err(e) => FormulaSlot::ParseError(e.message),
                };
                self.cells.insert((row, col), CellSlot::Formula { source, parsed });
            }
            other => {
                self.cells.insert((row, col), CellSlot::Literal(other));
            }
        }
    }

    pub(crate) fn remove(&mut self, row: u32, col: u32) {
        self.cells.remove(&(row, col));
    }

    pub fn is_empty_at(&self, row: u32, col: u32) -> bool {
        !self.cells.contains_key(&(row, col))
    }

    /// Raw content as the host would see it back (spec `getCellContent`):
    /// formulas round-trip as `=<source>`.
    pub fn get_raw_content(&self, row: u32, col: u32) -> RawContent {
        match self.cells.get(&(row, col)) {
            None => RawContent::Empty,
            Some(CellSlot::Literal(v)) => v.clone(),
            Some(CellSlot::Formula { source, .. }) => RawContent::String(format!("={source}")),
        }
    }

    /// All occupied `(row, col)` pairs within `[start_row, end_row] x
    /// [start_col, end_col]` inclusive (0-based), unordered. Used by
    /// `iter_range_values` / `iter_table_values` to avoid materializing
    /// large bounded ranges.
    pub(crate) fn occupied_in(
        &self,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.cells.keys().copied().filter(move |&(r, c)| {
            r >= start_row && r <= end_row && c >= start_col && c <= end_col
        })
    }

    /// The highest occupied row in `col`, if any — used to bound whole-column
    /// references and `endRow = Infinity` structured references without an
    /// explicit "used range" abstraction.
    pub fn max_used_row_in_col(&self, col: u32) -> Option<u32> {
        self.cells.keys().filter(|&&(_, c)| c == col).map(|&(r, _)| r).max()
    }

    pub fn max_used_col_in_row(&self, row: u32) -> Option<u32> {
        self.cells.keys().filter(|&&(r, _)| r == row).map(|&(_, c)| c).max()
    }

    /// Highest occupied row across every column in `[col_lo, col_hi]` —
    /// used to bound a column-open reference (`A2:B`) to the sheet's used
    /// range.
    pub fn max_used_row_in_col_range(&self, col_lo: u32, col_hi: u32) -> Option<u32> {
        self.cells
            .keys()
            .filter(|&&(_, c)| c >= col_lo && c <= col_hi)
            .map(|&(r, _)| r)
            .max()
    }

    /// Highest occupied column across every row in `[row_lo, row_hi]` —
    /// used to bound a row-open reference (`A2:10`) to the sheet's used
    /// range.
    pub fn max_used_col_in_row_range(&self, row_lo: u32, row_hi: u32) -> Option<u32> {
        self.cells
            .keys()
            .filter(|&&(r, _)| r >= row_lo && r <= row_hi)
            .map(|&(_, c)| c)
            .max()
    }

    pub fn max_used_row(&self) -> Option<u32> {
        self.cells.keys().map(|&(r, _)| r).max()
    }

    pub fn max_used_col(&self) -> Option<u32> {
        self.cells.keys().map(|&(_, c)| c).max()
    }
}
