//! TechTrend Support Core - Shared types library.
//!
//! This crate provides common types used across the TechTrend support chat
//! components:
//! - `server` - The chat API service (model orchestration + scoped queries)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, the validated [`types::Email`] identity, the
//!   closed [`types::EntityType`] enumeration, and chat transcript types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
