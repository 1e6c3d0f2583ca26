//! Opaque external identifiers.
//!
//! Course and student identifiers are owned by the catalog and directory
//! services respectively. Registrar never interprets them beyond requiring
//! that they are non-blank.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EnrollmentError;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a raw identifier. Surrounding whitespace
            /// is trimmed.
            ///
            /// # Errors
            ///
            /// Returns `EnrollmentError::Validation` if the identifier is
            /// empty or blank.
            pub fn new(raw: impl AsRef<str>) -> Result<Self, EnrollmentError> {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(EnrollmentError::Validation(format!(
                        "{} must not be empty",
                        $label
                    )));
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = EnrollmentError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of a course in the catalog service.
    CourseId,
    "course id"
);

opaque_id!(
    /// Identifier of a student in the directory service.
    StudentId,
    "student id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_surrounding_whitespace() {
        let id = CourseId::new("  CS101 ").unwrap();
        assert_eq!(id.as_str(), "CS101");
    }

    #[test]
    fn test_blank_identifier_is_rejected() {
        let result = StudentId::new("   ");
        match result.unwrap_err() {
            EnrollmentError::Validation(msg) => assert!(msg.contains("student id")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialization_rejects_empty_identifier() {
        let result: Result<CourseId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = StudentId::new("S-42").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"S-42\"");
    }
}
