//! Dependency graph key codec.
//!
//! Every node the evaluation manager tracks — a single cell, a range, a
//! 3-D multi-sheet range, a named expression, or a table area — is given a
//! deterministic, injective ASCII string key. Keys are used as map keys in
//! `evaluatedNodes` and as edge endpoints in the dependency graph, so two
//! different nodes must never encode to the same string and the same node
//! must always encode to the same string.
//!
//! All fields are separated by `:`. Sheet, table and named-expression names
//! cannot themselves contain `:` (disallowed by Excel), so the encoding
//! stays unambiguous without escaping. Open range endpoints are written as
//! the literal token `INFINITY`.

use std::fmt;

use crate::range::{MultiSheetRange, Range, RangeEnd, SheetSelector};

/// A decoded dependency graph node key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Cell {
        workbook: String,
        sheet: String,
        row: u32,
        col: u32,
    },
    Range {
        workbook: String,
        sheet: String,
        range: Range,
    },
    MultiRangeList {
        workbook: String,
        sheets: Vec<String>,
        range: Range,
    },
    MultiRangeRange {
        workbook: String,
        start_sheet: String,
        end_sheet: String,
        range: Range,
    },
    Named {
        workbook: String,
        scope: Option<String>,
        name: String,
    },
    Table {
        workbook: String,
        sheet: String,
        name: String,
        area: String,
    },
}

/// Errors produced while decoding a dependency key string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKeyError {
    UnknownPrefix(String),
    MalformedField(&'static str, String),
}

impl fmt::Display for NodeKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKeyError::UnknownPrefix(s) => write!(f, "unrecognised node key prefix in '{s}'"),
            NodeKeyError::MalformedField(field, s) => {
                write!(f, "malformed '{field}' field while decoding '{s}'")
            }
        }
    }
}

impl std::error::Error for NodeKeyError {}

fn fmt_end(end: RangeEnd) -> String {
    match end {
        RangeEnd::Number(n) => n.to_string(),
        RangeEnd::Infinity => "INFINITY".to_string(),
    }
}

fn parse_end(s: &str, field: &'static str, whole: &str) -> Result<RangeEnd, NodeKeyError> {
    if s == "INFINITY" {
        Ok(RangeEnd::Infinity)
    } else {
        s.parse::<u32>()
            .map(RangeEnd::Number)
            .map_err(|_| NodeKeyError::MalformedField(field, whole.to_string()))
    }
}

fn fmt_range(range: &Range) -> String {
    format!(
        "{}:{}:{}:{}",
        range.start_row,
        range.start_col,
        fmt_end(range.end_row),
        fmt_end(range.end_col)
    )
}

fn parse_range(parts: &[&str], whole: &str) -> Result<Range, NodeKeyError> {
    let [start_row, start_col, end_row, end_col] = parts else {
        return Err(NodeKeyError::MalformedField("range", whole.to_string()));
    };
    Ok(Range::new(
        start_row
            .parse()
            .map_err(|_| NodeKeyError::MalformedField("start_row", whole.to_string()))?,
        start_col
            .parse()
            .map_err(|_| NodeKeyError::MalformedField("start_col", whole.to_string()))?,
        parse_end(end_row, "end_row", whole)?,
        parse_end(end_col, "end_col", whole)?,
    ))
}

impl NodeKey {
    pub fn encode(&self) -> String {
        match self {
            NodeKey::Cell {
                workbook,
                sheet,
                row,
                col,
            } => format!("cell:{workbook}:{sheet}:{row}:{col}"),
            NodeKey::Range {
                workbook,
                sheet,
                range,
            } => format!("range:{workbook}:{sheet}:{}", fmt_range(range)),
            NodeKey::MultiRangeList {
                workbook,
                sheets,
                range,
            } => format!(
                "multi-range:list:{workbook}:{}:{}",
                sheets.join(","),
                fmt_range(range)
            ),
            NodeKey::MultiRangeRange {
                workbook,
                start_sheet,
                end_sheet,
                range,
            } => format!(
                "multi-range:range:{workbook}:{start_sheet}:{end_sheet}:{}",
                fmt_range(range)
            ),
            NodeKey::Named {
                workbook,
                scope,
                name,
            } => match scope {
                Some(sheet) => format!("named:{workbook}:{sheet}:{name}"),
                None => format!("named:{workbook}:global:{name}"),
            },
            NodeKey::Table {
                workbook,
                sheet,
                name,
                area,
            } => format!("table:{workbook}:{sheet}:{name}:{area}"),
        }
    }

    pub fn decode(s: &str) -> Result<Self, NodeKeyError> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.first().copied() {
            Some("cell") => {
                let [_, workbook, sheet, row, col] = parts[..] else {
                    return Err(NodeKeyError::MalformedField("cell", s.to_string()));
                };
                Ok(NodeKey::Cell {
                    workbook: workbook.to_string(),
                    sheet: sheet.to_string(),
                    row: row
                        .parse()
                        .map_err(|_| NodeKeyError::MalformedField("row", s.to_string()))?,
                    col: col
                        .parse()
                        .map_err(|_| NodeKeyError::MalformedField("col", s.to_string()))?,
                })
            }
            Some("range") => {
                if parts.len() != 7 {
                    return Err(NodeKeyError::MalformedField("range", s.to_string()));
                }
                let workbook = parts[1].to_string();
                let sheet = parts[2].to_string();
                let range = parse_range(&parts[3..7], s)?;
                Ok(NodeKey::Range {
                    workbook,
                    sheet,
                    range,
                })
            }
            Some("multi-range") => match parts.get(1).copied() {
                Some("list") => {
                    if parts.len() != 8 {
                        return Err(NodeKeyError::MalformedField("multi-range:list", s.to_string()));
                    }
                    let workbook = parts[2].to_string();
                    let sheets = parts[3].split(',').map(str::to_string).collect();
                    let range = parse_range(&parts[4..8], s)?;
                    Ok(NodeKey::MultiRangeList {
                        workbook,
                        sheets,
                        range,
                    })
                }
                Some("range") => {
                    if parts.len() != 9 {
                        return Err(NodeKeyError::MalformedField(
                            "multi-range:range",
                            s.to_string(),
                        ));
                    }
                    let workbook = parts[2].to_string();
                    let start_sheet = parts[3].to_string();
                    let end_sheet = parts[4].to_string();
                    let range = parse_range(&parts[5..9], s)?;
                    Ok(NodeKey::MultiRangeRange {
                        workbook,
                        start_sheet,
                        end_sheet,
                        range,
                    })
                }
                _ => Err(NodeKeyError::UnknownPrefix(s.to_string())),
            },
            Some("named") => {
                if parts.len() != 4 {
                    return Err(NodeKeyError::MalformedField("named", s.to_string()));
                }
                let workbook = parts[1].to_string();
                let scope = if parts[2] == "global" {
                    None
                } else {
                    Some(parts[2].to_string())
                };
                Ok(NodeKey::Named {
                    workbook,
                    scope,
                    name: parts[3].to_string(),
                })
            }
            Some("table") => {
                if parts.len() != 5 {
                    return Err(NodeKeyError::MalformedField("table", s.to_string()));
                }
                Ok(NodeKey::Table {
                    workbook: parts[1].to_string(),
                    sheet: parts[2].to_string(),
                    name: parts[3].to_string(),
                    area: parts[4].to_string(),
                })
            }
            _ => Err(NodeKeyError::UnknownPrefix(s.to_string())),
        }
    }

    pub fn for_cell(workbook: impl Into<String>, sheet: impl Into<String>, row: u32, col: u32) -> Self {
        NodeKey::Cell {
            workbook: workbook.into(),
            sheet: sheet.into(),
            row,
            col,
        }
    }

    pub fn for_range(workbook: impl Into<String>, sheet: impl Into<String>, range: Range) -> Self {
        NodeKey::Range {
            workbook: workbook.into(),
            sheet: sheet.into(),
            range,
        }
    }

    pub fn for_multi_sheet_range(workbook: impl Into<String>, msr: &MultiSheetRange) -> Self {
        let workbook = workbook.into();
        match &msr.selector {
            SheetSelector::List(sheets) => NodeKey::MultiRangeList {
                workbook,
                sheets: sheets.clone(),
                range: msr.range.clone(),
            },
            SheetSelector::Contiguous { start, end } => NodeKey::MultiRangeRange {
                workbook,
                start_sheet: start.clone(),
                end_sheet: end.clone(),
                range: msr.range.clone(),
            },
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_round_trip() {
        let key = NodeKey::for_cell("Book1", "Sheet1", 4, 2);
        let encoded = key.encode();
        assert_eq!(encoded, "cell:Book1:Sheet1:4:2");
        assert_eq!(NodeKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn range_with_infinite_endpoint_round_trips() {
        let range = Range::new(0, 0, RangeEnd::Infinity, RangeEnd::Number(0));
        let key = NodeKey::for_range("Book1", "Sheet1", range);
        let encoded = key.encode();
        assert_eq!(encoded, "range:Book1:Sheet1:0:0:INFINITY:0");
        assert_eq!(NodeKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn multi_range_list_round_trips() {
        let key = NodeKey::MultiRangeList {
            workbook: "Book1".to_string(),
            sheets: vec!["Jan".to_string(), "Feb".to_string()],
            range: Range::single_cell(0, 0),
        };
        let encoded = key.encode();
        assert_eq!(NodeKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn named_expression_global_vs_scoped() {
        let global = NodeKey::Named {
            workbook: "Book1".to_string(),
            scope: None,
            name: "TaxRate".to_string(),
        };
        assert_eq!(global.encode(), "named:Book1:global:TaxRate");

        let scoped = NodeKey::Named {
            workbook: "Book1".to_string(),
            scope: Some("Sheet1".to_string()),
            name: "TaxRate".to_string(),
        };
        assert_eq!(scoped.encode(), "named:Book1:Sheet1:TaxRate");
        assert_ne!(global.encode(), scoped.encode());
    }

    #[test]
    fn table_area_round_trips() {
        let key = NodeKey::Table {
            workbook: "Book1".to_string(),
            sheet: "Sheet1".to_string(),
            name: "Orders".to_string(),
            area: "Data".to_string(),
        };
        let encoded = key.encode();
        assert_eq!(encoded, "table:Book1:Sheet1:Orders:Data");
        assert_eq!(NodeKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn unknown_prefix_rejected() {
        assert!(matches!(
            NodeKey::decode("bogus:a:b"),
            Err(NodeKeyError::UnknownPrefix(_))
        ));
    }
}
