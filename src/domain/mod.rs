//! Domain layer: entities, repository contracts and the visit pipeline.
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`visit_event`] - Request context and queued visit message
//! - [`visit_worker`] - Background persistence of visit events
//! - [`geo`] - Optional geo lookup capability
//!
//! # Visit Recording Flow
//!
//! 1. The resolver serves a redirect
//! 2. A [`visit_event::VisitEvent`] is pushed to a bounded channel (never awaited)
//! 3. [`visit_worker::run_visit_worker`] persists it with bounded retries
//! 4. The row lands in the durable store via [`repositories::VisitRepository`]

pub mod entities;
pub mod geo;
pub mod repositories;
pub mod visit_event;
pub mod visit_worker;
