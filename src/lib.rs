//! prosper-autoinvest — scheduled auto-investor for Prosper.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod error;
pub mod marketplace;
pub mod secrets;
pub mod types;
