//! I/O collaborators for the agent loop.

pub mod artifact;
pub mod config;
pub mod document;
pub mod generator;
pub mod process;
pub mod prompt;
pub mod reference;
pub mod report;
pub mod sandbox;
