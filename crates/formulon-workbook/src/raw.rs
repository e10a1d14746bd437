//! Raw cell content: what a host actually writes into a cell, before any
//! parsing happens. A `String` starting with `=` is classified
//! as a formula at `Sheet::set` time rather than carrying its own variant,
//! matching "a string beginning with `=` is a formula" verbatim.

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum RawContent {
    Empty,
    Number(f64),
    Boolean(bool),
    String(String),
}

impl RawContent {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawContent::Empty)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, RawContent::String(s) if s.starts_with('='))
    }
}

impl fmt::Display for RawContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawContent::Empty => Ok(()),
            RawContent::Number(n) => write!(f, "{n}"),
            RawContent::Boolean(b) => write!(f, "{b}"),
            RawContent::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for RawContent {
    fn from(n: f64) -> Self {
        RawContent::Number(n)
    }
}

impl From<bool> for RawContent {
    fn from(b: bool) -> Self {
        RawContent::Boolean(b)
    }
}

impl From<String> for RawContent {
    fn from(s: String) -> Self {
        RawContent::String(s)
    }
}

impl From<&str> for RawContent {
    fn from(s: &str) -> Self {
        RawContent::String(s.to_string())
    }
}
