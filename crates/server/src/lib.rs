//! TechTrend Support server library.
//!
//! The customer-support chat API as a library, allowing it to be tested
//! and reused by the binary.
//!
//! # Architecture
//!
//! - Axum web framework serving `POST /api/chat`
//! - Gemini API for the assistant, with the `db_query` tool advertised
//! - `PostgreSQL` for customer, product, order, and ticket data
//!
//! # Request flow
//!
//! Inbound conversation, then identity extraction, then the model call;
//! when the model invokes `db_query`, the pipeline in [`query`] authorizes
//! and runs the lookup and [`tools`] wraps the outcome for the model.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod gemini;
pub mod identity;
pub mod middleware;
pub mod query;
pub mod routes;
pub mod services;
pub mod state;
pub mod tools;
