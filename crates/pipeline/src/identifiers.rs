//! Newtype identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a single invocation of an [`crate::ApiFunction`].
///
/// Generated fresh for every call and attached to the call's tracing span so
/// all activity from one request can be correlated across middleware and
/// transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a new random call identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`CallId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_differ() {
        assert_ne!(CallId::new_random(), CallId::new_random());
    }

    #[test]
    fn display_matches_uuid() {
        let id = CallId::from_uuid(Uuid::nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
        assert_eq!(id.as_uuid(), Uuid::nil());
    }
}
