//! Shell-facing helpers.
//!
//! The binary talks to the calling shell through **stdout** only: one line
//! with the formatted date, or nothing at all. Everything a script should not
//! parse (warnings, usage, errors) goes to stderr.

pub mod args;
pub mod env;
