//! Core algorithms: container sniffing, metadata extraction, and formatting.
//!
//! Nothing in this module prints or exits; the binary decides how results
//! and errors are surfaced.

pub mod bmff;
pub mod exif;
pub mod format;
pub mod item_date;
pub mod sniff;
