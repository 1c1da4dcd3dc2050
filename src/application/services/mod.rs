//! Redirect resolution and counter reconciliation.

pub mod reconciliation;
pub mod redirect_resolver;

pub use reconciliation::{ReconcileReport, ReconciliationJob};
pub use redirect_resolver::{MappingWithVisits, RedirectResolver, ResolverSettings};
