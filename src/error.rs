//! Shared error types.

use thiserror::Error;

/// A deployment secret that a feature needs is not set.
///
/// Raised by the operation that needs the value, never at startup.
#[derive(Debug, Clone, Error)]
#[error("{name} is not configured. {hint}")]
pub struct MissingSecret {
    pub name: &'static str,
    pub hint: &'static str,
}

impl MissingSecret {
    pub const fn new(name: &'static str, hint: &'static str) -> Self {
        Self { name, hint }
    }
}

/// Resolve an optional secret, failing with a remediation hint when absent.
pub fn require<'a>(
    value: Option<&'a str>,
    name: &'static str,
    hint: &'static str,
) -> Result<&'a str, MissingSecret> {
    value.ok_or(MissingSecret::new(name, hint))
}
