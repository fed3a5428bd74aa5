//! Stepwise CLI
//!
//! Command-line front end for the Stepwise step engine: run case files
//! against a target URL, inspect how step sentences are classified, and
//! manage the configuration file.

pub mod commands;
pub mod output;
