//! askdata — natural-language questions over tabular business data
//!
//! Routes a question to a database table, synthesizes a SQL query through a
//! text-generation model under a per-user row filter, executes it behind a
//! guard that absorbs malformed generated statements, then concurrently
//! summarizes the rows and renders an optional chart from generated plotting
//! code run in a sandbox with bounded self-repair.

pub mod catalog;
pub mod chart;
pub mod config;
pub mod error;
pub mod executor;
pub mod fence;
pub mod llm;
pub mod pipeline;
pub mod router;
pub mod store;
pub mod summarizer;
pub mod synthesizer;
pub mod value;

pub use error::{AskError, Result};
pub use pipeline::{Answer, Pipeline};
