//! Spreadsheet-driven report forms.
//!
//! A session loads rows from a workbook, lets the user edit and lock them,
//! drafts ratings and an executive summary through a text generation
//! service, and exports the confirmed result into a `.docx` or `.pdf`
//! template.
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod export;
pub mod gateway;
pub mod lm_log;
pub mod session;
pub mod sheet;
pub mod util;
