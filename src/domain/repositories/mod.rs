//! Repository trait definitions for the domain layer.
//!
//! Traits define the contract for durable data operations; implementations
//! live in `crate::infrastructure::persistence`. Mock implementations are
//! generated via `mockall` for unit tests.
//!
//! - [`MappingRepository`] - Short mappings and their durable visit totals
//! - [`VisitRepository`] - Append-only visit log

pub mod mapping_repository;
pub mod visit_repository;

pub use mapping_repository::MappingRepository;
pub use visit_repository::VisitRepository;

#[cfg(test)]
pub use mapping_repository::MockMappingRepository;
#[cfg(test)]
pub use visit_repository::MockVisitRepository;
