//! Presentation helpers layered on top of computed values.

pub mod trace;

pub use trace::format_trace;
