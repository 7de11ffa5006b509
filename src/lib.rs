//! Purpose: Typed bindings for simulation kernels exposing the XMI/BMI C interface.
//! Exports: `api` (stable surface), `core` (native boundary, session, marshalling, errors).
//! Role: Library backing the `xmi` CLI and tests; embedders should go through `api`.
//! Invariants: All native calls flow through a `Session`; none are issued from free functions.
//! Invariants: Zero-copy views borrow their session, so kernel memory cannot be read after it is freed.
pub mod api;
pub mod core;
