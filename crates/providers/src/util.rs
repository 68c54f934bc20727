//! Shared utility functions for provider adapters.

use dp_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read an API key from the named environment variable.
pub(crate) fn resolve_api_key_env(env_var: &str) -> dp_domain::error::Result<String> {
    std::env::var(env_var).map_err(|_| {
        Error::Config(format!(
            "environment variable '{env_var}' not set or not valid UTF-8"
        ))
    })
}
