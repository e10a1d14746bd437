//! Table definitions and structured-reference resolution: a
//! `StructuredReference` resolves against its table definition into an
//! equivalent `Range`. A table is anchored at its header row; `end_row`
//! may be a fixed row or `Infinity` ("grows with data"), honored all the
//! way through to the dependency-key codec.

use formulon_common::ErrKind;
use formulon_parse::parser::{SpecialItem, TableReference, TableRowSpecifier, TableSpecifier};

use crate::sheet::Sheet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableEndRow {
    Fixed(u32),
    Infinity,
}

#[derive(Clone, Debug)]
pub struct TableDef {
    pub name: String,
    pub sheet: String,
    /// 0-based row of the header row.
    pub anchor_row: u32,
    /// 0-based column of the first header.
    pub anchor_col: u32,
    pub headers: Vec<String>,
    pub end_row: TableEndRow,
}

impl TableDef {
    pub fn col_index(&self, header: &str) -> Option<u32> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
            .map(|i| self.anchor_col + i as u32)
    }

    fn data_start_row(&self) -> u32 {
        self.anchor_row + 1
    }

    /// The last occupied data row, honoring a fixed `endRow` or consulting
    /// the sheet's used range when the table grows (`Infinity`).
    fn data_end_row(&self, sheet: &Sheet) -> Option<u32> {
        match self.end_row {
            TableEndRow::Fixed(r) => Some(r),
            TableEndRow::Infinity => {
                let last_col = self.anchor_col + self.headers.len().saturating_sub(1) as u32;
                (self.anchor_col..=last_col)
                    .filter_map(|c| sheet.max_used_row_in_col(c))
                    .max()
                    .filter(|&r| r >= self.data_start_row())
            }
        }
    }

    /// Resolve a structured reference into a 0-based `(start_row, start_col,
    /// end_row, end_col)` tuple. `end_row = None` means the open/`INFINITY`
    /// form of the codec.
    pub fn resolve(
        &self,
        specifier: Option<&TableSpecifier>,
        sheet: &Sheet,
    ) -> Result<(u32, u32, Option<u32>, u32), ErrKind> {
        let first_col = self.anchor_col;
        let last_col = self.anchor_col + self.headers.len().saturating_sub(1) as u32;
        let data_start = self.data_start_row();
        let is_open = matches!(self.end_row, TableEndRow::Infinity);
        let data_end = self.data_end_row(sheet);

        let data_range = || -> (u32, Option<u32>) {
            if is_open {
                (data_start, None)
            } else {
                (data_start, data_end.or(Some(data_start.saturating_sub(1))))
            }
        };

        match specifier {
            None | Some(TableSpecifier::All) => {
                let (_, end) = data_range();
                Ok((self.anchor_row, first_col, end, last_col))
            }
            Some(TableSpecifier::Data) => {
                let (start, end) = data_range();
                Ok((start, first_col, end, last_col))
            }
            Some(TableSpecifier::Headers) => Ok((self.anchor_row, first_col, Some(self.anchor_row), last_col)),
            Some(TableSpecifier::Totals) => {
                let row = data_end.map(|r| r + 1).unwrap_or(data_start);
                Ok((row, first_col, Some(row), last_col))
            }
            Some(TableSpecifier::Column(name)) => {
                let col = self.col_index(name).ok_or(ErrKind::Ref)?;
                let (start, end) = data_range();
                Ok((start, col, end, col))
            }
            Some(TableSpecifier::ColumnRange(a, b)) => {
                let ca = self.col_index(a).ok_or(ErrKind::Ref)?;
                let cb = self.col_index(b).ok_or(ErrKind::Ref)?;
                let (start, end) = data_range();
                Ok((start, ca.min(cb), end, ca.max(cb)))
            }
            Some(TableSpecifier::Row(row_spec)) => self.resolve_row(row_spec, sheet),
            Some(TableSpecifier::SpecialItem(item)) => self.resolve_special(item, sheet),
            Some(TableSpecifier::Combination(parts)) => {
                // Union the row range of every part over the full column span;
                // the common case is `[[#Headers],[col]]`.
                let mut start = u32::MAX;
                let mut end: Option<u32> = Some(0);
                let mut any_open = false;
                for part in parts {
                    let (s, _, e, _) = self.resolve(Some(part.as_ref()), sheet)?;
                    start = start.min(s);
                    match e {
                        None => any_open = true,
                        Some(e) => {
                            if let Some(cur) = end {
                                end = Some(cur.max(e));
                            }
                        }
                    }
                }
                let end = if any_open { None } else { end };
                Ok((start, first_col, end, last_col))
            }
        }
    }

    fn resolve_row(&self, row_spec: &TableRowSpecifier, sheet: &Sheet) -> Result<(u32, u32, Option<u32>, u32), ErrKind> {
        let first_col = self.anchor_col;
        let last_col = self.anchor_col + self.headers.len().saturating_sub(1) as u32;
        match row_spec {
            TableRowSpecifier::Current => Err(ErrKind::Ref), // only meaningful inside a row-context formula, unsupported here
            TableRowSpecifier::All | TableRowSpecifier::Data => {
                let (start, end) = if matches!(self.end_row, TableEndRow::Infinity) {
                    (self.data_start_row(), None)
                } else {
                    (self.data_start_row(), self.data_end_row(sheet))
                };
                Ok((start, first_col, end, last_col))
            }
            TableRowSpecifier::Headers => Ok((self.anchor_row, first_col, Some(self.anchor_row), last_col)),
            TableRowSpecifier::Totals => {
                let row = self.data_end_row(sheet).map(|r| r + 1).unwrap_or(self.data_start_row());
                Ok((row, first_col, Some(row), last_col))
            }
            TableRowSpecifier::Index(n) => {
                let row = self.data_start_row() + n.saturating_sub(1);
                Ok((row, first_col, Some(row), last_col))
            }
        }
    }

    fn resolve_special(&self, item: &SpecialItem, sheet: &Sheet) -> Result<(u32, u32, Option<u32>, u32), ErrKind> {
        match item {
            SpecialItem::Headers => self.resolve(Some(&TableSpecifier::Headers), sheet),
            SpecialItem::Data => self.resolve(Some(&TableSpecifier::Data), sheet),
            SpecialItem::Totals => self.resolve(Some(&TableSpecifier::Totals), sheet),
            SpecialItem::All => self.resolve(Some(&TableSpecifier::All), sheet),
            SpecialItem::ThisRow => Err(ErrKind::Ref),
        }
    }
}
