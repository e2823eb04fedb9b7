//! Core types for TechTrend Support.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod entity;
pub mod id;
pub mod message;

pub use email::{Email, EmailError};
pub use entity::EntityType;
pub use id::*;
pub use message::{ChatMessage, MessageRole};
