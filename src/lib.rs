//! Item dates for files: when their *contents* were created.
//!
//! For pictures that is Date Taken, for videos Media Created. The
//! [`core`] module extracts and formats the date; [`shell`] adapts the
//! command line; [`runtime`] holds the process and dispatch primitives used
//! by the test harness.

pub mod config;
pub mod core;
pub mod runtime;
pub mod shell;
