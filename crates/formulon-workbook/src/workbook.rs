//! Workbook store: a workbook owns an ordered map of sheet-name → `Sheet`,
//! plus its tables and named expressions.

use rustc_hash::FxHashMap;

use formulon_common::{ErrKind, SheetSelector};

use crate::named::NamedExpressions;
use crate::sheet::Sheet;
use crate::table::TableDef;

#[derive(Default)]
pub struct Workbook {
    // Order of insertion matters for host-facing iteration; a side vector
    // keeps that order without pulling in a new dependency for an ordered
    // map.
    sheet_order: Vec<String>,
    sheets: FxHashMap<String, Sheet>,
    pub(crate) tables: FxHashMap<String, TableDef>,
    pub(crate) named: NamedExpressions,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheet_order.iter().map(String::as_str)
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.get_mut(name)
    }

    pub fn add_sheet(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.sheets.contains_key(&name) {
            return false;
        }
        self.sheet_order.push(name.clone());
        self.sheets.insert(name, Sheet::new());
        true
    }

    pub fn remove_sheet(&mut self, name: &str) -> bool {
        if self.sheets.remove(name).is_some() {
            self.sheet_order.retain(|s| s != name);
            true
        } else {
            false
        }
    }

    pub fn rename_sheet(&mut self, old: &str, new: &str) -> bool {
        if !self.sheets.contains_key(old) || self.sheets.contains_key(new) {
            return false;
        }
        let sheet = self.sheets.remove(old).expect("checked above");
        self.sheets.insert(new.to_string(), sheet);
        for entry in self.sheet_order.iter_mut() {
            if entry == old {
                *entry = new.to_string();
            }
        }
        true
    }

    /// Resolve a 3-D reference's sheet selector down to the concrete,
    /// ordered list of sheet names it spans. A `Contiguous` selector is
    /// resolved against insertion order — the same order Excel uses for a
    /// workbook's sheet tabs — so `Sheet3:Sheet1` spans the same sheets as
    /// `Sheet1:Sheet3` regardless of which end is named first.
    pub fn resolve_sheet_selector(&self, selector: &SheetSelector) -> Result<Vec<String>, ErrKind> {
        match selector {
            SheetSelector::List(sheets) => {
                if sheets.iter().all(|s| self.has_sheet(s)) {
                    Ok(sheets.clone())
                } else {
                    Err(ErrKind::Ref)
                }
            }
            SheetSelector::Contiguous { start, end } => {
                let names: Vec<&str> = self.sheet_order.iter().map(String::as_str).collect();
                let start_idx = names.iter().position(|&n| n == start);
                let end_idx = names.iter().position(|&n| n == end);
                match (start_idx, end_idx) {
                    (Some(si), Some(ei)) => {
                        let (lo, hi) = (si.min(ei), si.max(ei));
                        Ok(names[lo..=hi].iter().map(|s| s.to_string()).collect())
                    }
                    _ => Err(ErrKind::Ref),
                }
            }
        }
    }
}
