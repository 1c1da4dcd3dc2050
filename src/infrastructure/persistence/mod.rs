//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx with
//! runtime-bound parameters.
//!
//! # Repositories
//!
//! - [`PgMappingRepository`] - Short mappings and durable visit totals
//! - [`PgVisitRepository`] - Visit log inserts and recent-visit queries

pub mod pg_mapping_repository;
pub mod pg_visit_repository;

pub use pg_mapping_repository::PgMappingRepository;
pub use pg_visit_repository::PgVisitRepository;
