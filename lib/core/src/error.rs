//! Error handling foundation for merlinflow.
//!
//! Only the `Result` alias lives here. Each crate defines its own domain
//! error enums and wraps them in a rootcause `Report` at I/O seams, adding
//! context with `.context()` as errors cross layers.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
