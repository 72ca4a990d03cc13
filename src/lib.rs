//! Filterable web view over a table of AI model feedback records.

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod state;
