//! Application layer services implementing the redirect and sync logic.
//!
//! Services consume the repository and cache traits and never touch a
//! concrete backend directly.
//!
//! # Available Services
//!
//! - [`services::redirect_resolver::RedirectResolver`] - Mapping creation, cache-aside redirects, listings
//! - [`services::reconciliation::ReconciliationJob`] - Periodic counter folding into the durable store

pub mod services;
