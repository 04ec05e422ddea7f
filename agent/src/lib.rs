//! Bank statement parser generation agent.
//!
//! Given a sample statement PDF and the CSV it should turn into, the agent asks
//! a language model for a Python `parse(pdf_path)` function, runs the candidate
//! in a throwaway interpreter, and compares the DataFrame it returns with the
//! reference table. Failed candidates are sent back to the model together with
//! the validation error until the output matches or the attempt budget runs out.
//!
//! The crate is split into two layers:
//!
//! - **[`core`]**: Pure, deterministic logic (tables and their comparison, code
//!   block extraction, the loop's branching rule). No I/O.
//! - **[`io`]**: Side-effecting collaborators (config, child processes, the
//!   document helper, the generation service, artifact persistence).
//!
//! Orchestration modules ([`extract`], [`generate`], [`validate`], [`looping`])
//! wire core logic to the collaborators and implement the CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod extract;
pub mod generate;
pub mod io;
pub mod logging;
pub mod looping;
pub mod targets;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
