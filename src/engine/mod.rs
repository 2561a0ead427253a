//! Core engine — allocation and the single-run driver.

pub mod allocator;
pub mod report;
pub mod runner;
