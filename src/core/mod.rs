// Core modules implementing the native boundary, the session lifecycle, and value marshalling.
pub mod address;
pub mod buffer;
pub mod error;
pub mod grid;
pub mod library;
pub mod session;
pub(crate) mod status;
pub mod sys;
pub mod timer;
pub mod value;
pub mod vartype;
pub mod workdir;
