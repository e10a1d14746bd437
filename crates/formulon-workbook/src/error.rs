//! Structural failures at the workbook boundary. Distinct from
//! `formulon_common::ErrKind`: a `WorkbookError` never appears inside an
//! evaluated cell's result, it only surfaces from the handful of `Engine`
//! methods that can fail for reasons outside the value algebra (an unknown
//! workbook, a duplicate name, a re-entrant call).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkbookError {
    #[error("workbook '{0}' already exists")]
    WorkbookAlreadyExists(String),

    #[error("unknown workbook '{0}'")]
    UnknownWorkbook(String),

    #[error("sheet '{1}' already exists in workbook '{0}'")]
    SheetAlreadyExists(String, String),

    #[error("unknown sheet '{1}' in workbook '{0}'")]
    UnknownSheet(String, String),

    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("named expression '{0}' already exists in scope {1:?}")]
    NamedExpressionAlreadyExists(String, Option<String>),

    #[error("unknown named expression '{0}' in scope {1:?}")]
    UnknownNamedExpression(String, Option<String>),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("evaluation already in progress")]
    ReentrantEvaluation,
}
