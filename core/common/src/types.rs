//! Common types used throughout drivekit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned to a resource by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a new ResourceId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "id can't be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Require a non-empty name argument.
///
/// `what` names the argument in the error message, e.g. "folder name".
pub fn require_name<'a>(name: &'a str, what: &str) -> crate::Result<&'a str> {
    if name.is_empty() {
        return Err(crate::Error::InvalidInput(format!("{} can't be empty", what)));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_creation() {
        let id = ResourceId::new("1AbC").unwrap();
        assert_eq!(id.as_str(), "1AbC");
        assert_eq!(id.to_string(), "1AbC");
    }

    #[test]
    fn test_resource_id_empty_fails() {
        let err = ResourceId::new("").unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_resource_id_serializes_as_plain_string() {
        let id = ResourceId::new("xyz").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"xyz\"");
    }

    #[test]
    fn test_require_name() {
        assert_eq!(require_name("docs", "folder name").unwrap(), "docs");
        let err = require_name("", "folder name").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: folder name can't be empty");
    }
}
