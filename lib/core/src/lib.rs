//! Core types shared by the merlinflow crates.
//!
//! This crate provides the run identifiers and the rootcause-based `Result`
//! alias used throughout the workflow engine and its HTTP boundary.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{NodeExecutionId, ParseIdError, RunId};
