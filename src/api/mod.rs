//! Purpose: Define the stable public Rust API boundary for the XMI bindings.
//! Exports: Session lifecycle, value marshalling, grid, and error types, plus run helpers.
//! Role: Public, additive-only surface; the CLI and embedders build on it.
//! Invariants: Every native call is issued through `Session`; there are no free-function calls.
//! Invariants: Types re-exported here keep their `core` semantics unchanged.

mod run;
mod summary;

pub use crate::core::address::VarAddress;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::grid::GridType;
pub use crate::core::library::{
    LoadOptions, NativeLibrary, SymbolSource, prepend_library_search_path,
};
pub use crate::core::session::{
    DEFAULT_SUBCOMPONENT, Session, SessionOptions, SolveReport, State, StepReport,
};
pub use crate::core::timer::{ScopeTotal, Timer};
pub use crate::core::value::{Element, Value, ValueView, VarInfo};
pub use crate::core::vartype::VarType;
pub use crate::core::workdir::WorkingDirectory;
pub use run::{RunOptions, RunSummary, StepMode, run_to_end};
pub use summary::{GridSummary, ModelSummary};

pub type ApiResult<T> = Result<T, Error>;
