//! Wire DTOs for schema version 1 of the catalog and directory APIs.
//!
//! Responses are decoded into these transport types first and then mapped
//! into domain values in one pass.

use registrar_core::catalog::CourseCapacity;
use registrar_core::ids::CourseId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every successful response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeDto<T> {
    pub(crate) data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseDto {
    pub(crate) id: String,
    pub(crate) capacity: u32,
    pub(crate) enrolled: u32,
}

impl CourseDto {
    /// Maps the payload, checking it describes the course that was asked for.
    pub(crate) fn into_capacity(self, requested: &CourseId) -> Result<CourseCapacity, String> {
        if self.id != requested.as_str() {
            return Err(format!(
                "response describes course {:?}, expected {:?}",
                self.id,
                requested.as_str()
            ));
        }
        Ok(CourseCapacity {
            course_id: requested.clone(),
            capacity: self.capacity,
            enrolled_count: self.enrolled,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReservationRequestDto {
    pub(crate) reservation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub(crate) struct AdjustmentRequestDto {
    pub(crate) adjustment_id: Uuid,
    pub(crate) delta: i32,
}

pub(crate) fn parse_course(body: &[u8], requested: &CourseId) -> Result<CourseCapacity, String> {
    let envelope: EnvelopeDto<CourseDto> = serde_json::from_slice(body)
        .map_err(|error| format!("invalid course payload: {error}"))?;
    envelope.data.into_capacity(requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cs101() -> CourseId {
        CourseId::new("CS101").unwrap()
    }

    #[test]
    fn test_parse_course_maps_enveloped_payload() {
        let body = br#"{"data":{"id":"CS101","capacity":30,"enrolled":12,"title":"Intro"}}"#;

        let capacity = parse_course(body, &cs101()).unwrap();

        assert_eq!(capacity.capacity, 30);
        assert_eq!(capacity.enrolled_count, 12);
        assert_eq!(capacity.course_id, cs101());
    }

    #[test]
    fn test_parse_course_rejects_missing_fields() {
        let body = br#"{"data":{"id":"CS101","capacity":30}}"#;

        let error = parse_course(body, &cs101()).unwrap_err();

        assert!(error.contains("enrolled"), "unexpected error: {error}");
    }

    #[test]
    fn test_parse_course_rejects_negative_counts() {
        let body = br#"{"data":{"id":"CS101","capacity":30,"enrolled":-1}}"#;

        assert!(parse_course(body, &cs101()).is_err());
    }

    #[test]
    fn test_parse_course_rejects_unwrapped_payload() {
        let body = br#"{"id":"CS101","capacity":30,"enrolled":1}"#;

        assert!(parse_course(body, &cs101()).is_err());
    }

    #[test]
    fn test_parse_course_rejects_mismatched_course() {
        let body = br#"{"data":{"id":"MA201","capacity":30,"enrolled":1}}"#;

        let error = parse_course(body, &cs101()).unwrap_err();

        assert!(error.contains("MA201"));
    }
}
