//! Tools exposed to the model-orchestration layer.
//!
//! `db_query` is the single data tool: it composes identity validation,
//! authorization, execution, and formatting, and never lets a failure
//! escape as an exception past the tool boundary.

pub mod cards;
pub mod db_query;

pub use cards::{CardComponent, build_cards};
pub use db_query::{DbQueryInput, ErrorKind, ErrorPayload, ToolResponse, db_query_declaration, run_db_query};
