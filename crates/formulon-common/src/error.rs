//! The engine's closed error taxonomy.
//!
//! `ErrKind` is deliberately closed — every operator and evaluation path
//! returns one of these nine kinds, never a free-form error type. Keeping
//! the set closed is what lets operator lifting and propagation stay total
//! (see `ops.rs`): a function from `(Value, Value)` to `Result<Value, ErrKind>`
//! has nowhere else to go.

use std::fmt;

use thiserror::Error;

/// The closed set of Excel-style error codes the engine can produce.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrKind {
    /// Reference to a missing sheet, cell, named expression or table area.
    #[error("#REF!")]
    Ref,
    /// Type mismatch in an operator or function.
    #[error("#VALUE!")]
    Value,
    /// Unknown function or named expression.
    #[error("#NAME?")]
    Name,
    /// Numeric domain error (neg base ^ non-integer exponent, ∞ − ∞, …).
    #[error("#NUM!")]
    Num,
    /// True division by exact zero with a non-zero numerator.
    #[error("#DIV/0!")]
    Div0,
    /// Value deliberately not available.
    #[error("#N/A")]
    Na,
    /// Cell participates in a dependency cycle.
    #[error("#CYCLE!")]
    Cycle,
    /// Intended spill area blocked by cells or another spill.
    #[error("#SPILL!")]
    Spill,
    /// Parser failure, or catch-all for unexpected conditions.
    #[error("#ERROR!")]
    Error,
}

impl ErrKind {
    /// The canonical Excel-style rendering, e.g. `#DIV/0!`.
    pub fn code(self) -> &'static str {
        match self {
            ErrKind::Ref => "#REF!",
            ErrKind::Value => "#VALUE!",
            ErrKind::Name => "#NAME?",
            ErrKind::Num => "#NUM!",
            ErrKind::Div0 => "#DIV/0!",
            ErrKind::Na => "#N/A",
            ErrKind::Cycle => "#CYCLE!",
            ErrKind::Spill => "#SPILL!",
            ErrKind::Error => "#ERROR!",
        }
    }

    /// Parse a canonical error code back into a kind. Used when a literal
    /// error token (`#REF!`, …) appears in formula text.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "#REF!" => ErrKind::Ref,
            "#VALUE!" => ErrKind::Value,
            "#NAME?" => ErrKind::Name,
            "#NUM!" => ErrKind::Num,
            "#DIV/0!" => ErrKind::Div0,
            "#N/A" => ErrKind::Na,
            "#CYCLE!" => ErrKind::Cycle,
            "#SPILL!" => ErrKind::Spill,
            "#ERROR!" => ErrKind::Error,
            _ => return None,
        })
    }

    /// Best-effort classification of a host/runtime exception message into
    /// the closest error kind, so a panic-prone registered function cannot
    /// take the whole engine down with it (see evaluation manager §7).
    pub fn classify_message(msg: &str) -> Self {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("cycle") || lower.contains("circular") {
            ErrKind::Cycle
        } else if lower.contains("div") && lower.contains('0') {
            ErrKind::Div0
        } else if lower.contains("not available") || lower.contains("n/a") {
            ErrKind::Na
        } else if lower.contains("name") || lower.contains("unknown function") {
            ErrKind::Name
        } else if lower.contains("spill") {
            ErrKind::Spill
        } else if lower.contains("reference") || lower.contains("missing sheet") {
            ErrKind::Ref
        } else if lower.contains("numeric") || lower.contains("domain") {
            ErrKind::Num
        } else if lower.contains("type") || lower.contains("value") {
            ErrKind::Value
        } else {
            ErrKind::Error
        }
    }
}

/// An error value: a kind plus an optional diagnostic message.
///
/// The message is only surfaced when the caller asks for debug-mode
/// serialization (`getCellValue(addr, debug: true)`); otherwise only the
/// kind is observable, matching §7's propagation policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineError {
    pub kind: ErrKind,
    pub message: Option<String>,
}

impl EngineError {
    pub fn new(kind: ErrKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: ErrKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// Render per §6: bare code normally, `#KIND: message` in debug mode.
    pub fn serialize(&self, debug: bool) -> String {
        match (&self.message, debug) {
            (Some(msg), true) => format!("{}: {msg}", self.kind),
            _ => self.kind.code().to_string(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize(true))
    }
}

impl std::error::Error for EngineError {}

impl From<ErrKind> for EngineError {
    fn from(kind: ErrKind) -> Self {
        EngineError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [
            ErrKind::Ref,
            ErrKind::Value,
            ErrKind::Name,
            ErrKind::Num,
            ErrKind::Div0,
            ErrKind::Na,
            ErrKind::Cycle,
            ErrKind::Spill,
            ErrKind::Error,
        ] {
            assert_eq!(ErrKind::parse(kind.code()), Some(kind));
        }
    }

    #[test]
    fn debug_mode_includes_message() {
        let e = EngineError::with_message(ErrKind::Div0, "divide by zero in SUM");
        assert_eq!(e.serialize(false), "#DIV/0!");
        assert_eq!(e.serialize(true), "#DIV/0!: divide by zero in SUM");
    }
}
