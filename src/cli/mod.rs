//! Command Line Interface (CLI) layer for satcoloc.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `pair` and `mission`
//! flows. It wires user-provided options to the underlying library
//! functionality exposed via `satcoloc::api`.
//!
//! If you are embedding satcoloc into another application, prefer using
//! the high-level `satcoloc::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
