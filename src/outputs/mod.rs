//! Saved copies of query results.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2026-10-16/
//!     ├── ap-automation-united-kingdom.json
//!     └── payroll.json
//! ```
//!
//! A repeated query on the same day overwrites its earlier file.

pub mod json;
