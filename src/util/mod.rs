//! Shared utilities.
//!
//! Currently just feed URL validation: security-focused checks applied
//! before a URL is accepted by the `add` command.

mod url_validator;

pub use url_validator::{validate_url, UrlValidationError};
