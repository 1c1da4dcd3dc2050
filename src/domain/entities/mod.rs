//! Core domain entities.
//!
//! - [`ShortMapping`] - A short code and its long URL
//! - [`Visit`] - A recorded redirect
//!
//! Creation inputs are separate structs (`NewShortMapping`, `NewVisit`).

pub mod short_mapping;
pub mod visit;

pub use short_mapping::{NewShortMapping, ShortMapping};
pub use visit::{GeoInfo, NewVisit, Visit};
