//! CLI Commands

pub mod classify;
pub mod config;
pub mod run;
