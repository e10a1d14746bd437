//! Address and range model.
//!
//! Rows/columns are zero-based internally throughout this module; A1
//! rendering (1-based rows) happens only at the `Display` boundary.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coord::RelativeCoord;

/// A single `CellAddress`: `(workbook, sheet, row, col)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub workbook: String,
    pub sheet: String,
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(workbook: impl Into<String>, sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            workbook: workbook.into(),
            sheet: sheet.into(),
            row,
            col,
        }
    }

    pub fn to_a1(&self) -> String {
        RelativeCoord::new(self.row, self.col, false, false).to_string()
    }
}

/// A row or column endpoint: a concrete index, or unbounded (`A:A`, `1:1`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RangeEnd {
    Number(u32),
    Infinity,
}

impl RangeEnd {
    pub fn is_infinite(self) -> bool {
        matches!(self, RangeEnd::Infinity)
    }

    /// Numeric value for ordering purposes; infinite endpoints sort last.
    pub fn as_u32(self) -> Option<u32> {
        match self {
            RangeEnd::Number(n) => Some(n),
            RangeEnd::Infinity => None,
        }
    }
}

impl fmt::Display for RangeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeEnd::Number(n) => write!(f, "{n}"),
            RangeEnd::Infinity => write!(f, "INFINITY"),
        }
    }
}

/// A rectangular range within a single sheet. `start` is always concrete
/// (the top-left corner); `end` may be open on either axis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: RangeEnd,
    pub end_col: RangeEnd,
}

impl Range {
    pub fn new(start_row: u32, start_col: u32, end_row: RangeEnd, end_col: RangeEnd) -> Self {
        Self {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    pub fn single_cell(row: u32, col: u32) -> Self {
        Self::new(row, col, RangeEnd::Number(row), RangeEnd::Number(col))
    }

    pub fn is_single_cell(&self) -> bool {
        self.end_row == RangeEnd::Number(self.start_row) && self.end_col == RangeEnd::Number(self.start_col)
    }

    pub fn is_bounded(&self) -> bool {
        !self.end_row.is_infinite() && !self.end_col.is_infinite()
    }

    /// Width in cells, when bounded.
    pub fn width(&self) -> Option<u32> {
        match self.end_col {
            RangeEnd::Number(c) => Some(c - self.start_col + 1),
            RangeEnd::Infinity => None,
        }
    }

    pub fn height(&self) -> Option<u32> {
        match self.end_row {
            RangeEnd::Number(r) => Some(r - self.start_row + 1),
            RangeEnd::Infinity => None,
        }
    }

    /// Does `(row, col)` fall inside this range?
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.start_row
            && col >= self.start_col
            && match self.end_row {
                RangeEnd::Number(r) => row <= r,
                RangeEnd::Infinity => true,
            }
            && match self.end_col {
                RangeEnd::Number(c) => col <= c,
                RangeEnd::Infinity => true,
            }
    }

    /// Do two ranges share at least one cell?
    pub fn overlaps(&self, other: &Range) -> bool {
        let row_overlap = match (self.end_row, other.end_row) {
            (RangeEnd::Number(a), RangeEnd::Number(b)) => {
                self.start_row <= b && other.start_row <= a
            }
            _ => true,
        };
        let col_overlap = match (self.end_col, other.end_col) {
            (RangeEnd::Number(a), RangeEnd::Number(b)) => {
                self.start_col <= b && other.start_col <= a
            }
            _ => true,
        };
        row_overlap && col_overlap
    }

    /// The smallest range containing both `self` and `other`, re-anchored
    /// so both share the same top-left corner as `self` (used by operator
    /// lifting to union two spill areas that should track the same anchor).
    pub fn union(&self, other: &Range) -> Range {
        let start_row = self.start_row.min(other.start_row);
        let start_col = self.start_col.min(other.start_col);
        let end_row = match (self.end_row, other.end_row) {
            (RangeEnd::Number(a), RangeEnd::Number(b)) => RangeEnd::Number(a.max(b)),
            _ => RangeEnd::Infinity,
        };
        let end_col = match (self.end_col, other.end_col) {
            (RangeEnd::Number(a), RangeEnd::Number(b)) => RangeEnd::Number(a.max(b)),
            _ => RangeEnd::Infinity,
        };
        Range::new(start_row, start_col, end_row, end_col)
    }

    /// Canonical A1 rendering: the smallest of finite/column-open/row-open/
    /// fully-open forms that represents this range. The start anchor is
    /// always the full cell reference; only the end side drops the
    /// dimension that's unbounded: finite `A2:B10`, column-open (rows
    /// bounded, columns open) `A2:10`, row-open (columns bounded, rows
    /// open) `A2:B`, fully open `A2:INFINITY`.
    pub fn to_canonical_a1(&self) -> String {
        let start = RelativeCoord::new(self.start_row, self.start_col, false, false);
        match (self.end_row, self.end_col) {
            (RangeEnd::Number(r), RangeEnd::Number(c)) => {
                let end = RelativeCoord::new(r, c, false, false);
                format!("{start}:{end}")
            }
            (RangeEnd::Infinity, RangeEnd::Number(c)) => {
                let end_col_letters = RelativeCoord::col_to_letters(c);
                format!("{start}:{end_col_letters}")
            }
            (RangeEnd::Number(r), RangeEnd::Infinity) => {
                format!("{start}:{}", r + 1)
            }
            (RangeEnd::Infinity, RangeEnd::Infinity) => format!("{start}:INFINITY"),
        }
    }
}

/// How a 3-D (multi-sheet) reference selects its member sheets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SheetSelector {
    /// An explicit, order-preserving list of sheet names.
    List(Vec<String>),
    /// A contiguous run `[start..=end]` in workbook sheet order ("3-D reference").
    Contiguous { start: String, end: String },
}

/// A range bundled with a sheet selector, e.g. `Sheet1:Sheet3!A1:B2`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MultiSheetRange {
    pub workbook: String,
    pub selector: SheetSelector,
    pub range: Range,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_open_column() {
        let r = Range::new(0, 0, RangeEnd::Infinity, RangeEnd::Number(0));
        assert!(r.contains(1_000_000, 0));
        assert!(!r.contains(0, 1));
    }

    #[test]
    fn overlap_detection() {
        let a = Range::new(0, 0, RangeEnd::Number(2), RangeEnd::Number(2));
        let b = Range::new(2, 2, RangeEnd::Number(4), RangeEnd::Number(4));
        let c = Range::new(3, 3, RangeEnd::Number(4), RangeEnd::Number(4));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn canonical_forms() {
        let row_open = Range::new(0, 0, RangeEnd::Infinity, RangeEnd::Number(0));
        assert_eq!(row_open.to_canonical_a1(), "A1:A");
        let column_open = Range::new(0, 0, RangeEnd::Number(0), RangeEnd::Infinity);
        assert_eq!(column_open.to_canonical_a1(), "A1:1");
        let finite = Range::new(1, 0, RangeEnd::Number(9), RangeEnd::Number(1));
        assert_eq!(finite.to_canonical_a1(), "A2:B10");
        let fully_open = Range::new(1, 0, RangeEnd::Infinity, RangeEnd::Infinity);
        assert_eq!(fully_open.to_canonical_a1(), "A2:INFINITY");
    }
}
