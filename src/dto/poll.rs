use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::validation::validate_item_id;

/// Header carrying the polling client's stable key.
pub const CLIENT_ID_HEADER: &str = "x-client-id";
/// Acknowledgement token returned when nothing is pending.
pub const ACK_TOKEN: &str = "OK";
/// Prefix of a removal notice returned by the request/response transport.
pub const REMOVE_PREFIX: &str = "REMOVE:";

/// Body posted by request/response clients: one id per request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PollRequest {
    #[validate(custom(function = "validate_item_id"))]
    pub id: String,
}

/// Plain-text removal notice for `id`.
pub fn removal_notice(id: &str) -> String {
    format!("{REMOVE_PREFIX}{id}")
}
