//! Utility functions for code generation, URL validation, and request handling.
//!
//! - [`code_generator`] - Short code generation and format validation
//! - [`url_validator`] - Long URL validation
//! - [`client_ip`] - Client IP extraction from HTTP headers

pub mod client_ip;
pub mod code_generator;
pub mod url_validator;
