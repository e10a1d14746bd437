//! Meta crate that re-exports the Formulon building blocks with sensible
//! defaults. Downstream users can depend on this crate and opt into
//! specific layers via feature flags while keeping access to the
//! underlying crates when deeper integration is required.

#[cfg(feature = "common")]
pub use formulon_common as common;

#[cfg(feature = "parse")]
pub use formulon_parse as parse;

#[cfg(feature = "eval")]
pub use formulon_eval as eval;

#[cfg(feature = "workbook")]
pub use formulon_workbook as workbook;

#[cfg(feature = "workbook")]
pub use formulon_workbook::{SerializedValue, Engine, EngineConfig, RawContent, WorkbookError};

#[cfg(feature = "common")]
pub use formulon_common::{CellAddress, ErrKind, Sign, Value};

#[cfg(feature = "workbook")]
pub mod doc_examples;
