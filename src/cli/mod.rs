//! Command line interface module
//!
//! Parses the fake-push flags and drives the push through the runner.

pub mod args;
pub mod runner;

pub use args::Args;
pub use runner::Runner;
