//! Lightweight metadata shared between the function registry and the
//! `#[excel_fn]` attribute macro (formulon-macros).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgKind {
    Number,
    Text,
    Logical,
    Range,
    Any,
}

impl ArgKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "number" => Self::Number,
            "text" => Self::Text,
            "logical" => Self::Logical,
            "range" => Self::Range,
            _ => Self::Any,
        }
    }
}

/// A single declared argument slot in a function's schema.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ArgSpec {
    pub kind: ArgKind,
}

impl ArgSpec {
    pub const fn new(kind: ArgKind) -> Self {
        Self { kind }
    }
}
