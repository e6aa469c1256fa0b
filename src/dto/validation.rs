//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted item identifier.
pub const MAX_ITEM_ID_LEN: usize = 128;

/// Validates that an item ID is 1 to 128 characters of ASCII letters, digits, `_` or `-`.
///
/// # Examples
///
/// ```ignore
/// validate_item_id("g_1_AbCd1234") // Ok
/// validate_item_id("")             // Err - empty
/// validate_item_id("g 1")          // Err - space
/// ```
pub fn validate_item_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ITEM_ID_LEN {
        let mut err = ValidationError::new("item_id_length");
        err.message = Some(
            format!(
                "Item ID must be between 1 and {MAX_ITEM_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("item_id_format");
        err.message =
            Some("Item ID must contain only ASCII letters, digits, '_' or '-'".into());
        return Err(err);
    }

    Ok(())
}

/// Applies [`validate_item_id`] to every element of a declared set.
pub fn validate_item_ids(ids: &[String]) -> Result<(), ValidationError> {
    ids.iter().try_for_each(|id| validate_item_id(id))
}
