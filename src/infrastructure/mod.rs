//! Infrastructure layer for external integrations.
//!
//! Concrete implementations of the ports defined by the domain layer.
//!
//! # Modules
//!
//! - [`cache`] - Fast cache backends (Redis, in-memory, disabled)
//! - [`persistence`] - PostgreSQL repository implementations

pub mod cache;
pub mod persistence;
