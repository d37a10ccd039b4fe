use bson::oid::ObjectId;

use super::PollxError;

/// Parse a hex ObjectId from a path segment or request body.
///
/// `what` names the entity for the error message ("Poll", "Option", ...).
/// A malformed id can never resolve to a record, so it is reported as
/// `NotFound` rather than a validation failure.
pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId, PollxError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| PollxError::NotFound(format!("{} not found", what)))
}
