//! Helpers for partial-update request bodies.

use serde::{Deserialize, Deserializer};

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default, deserialize_with = ...)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim `value` and reject it when empty or longer than `max` characters.
pub(crate) fn required_text(
    field: &str,
    value: &str,
    max: usize,
) -> civicdesk_core::CivicResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(civicdesk_core::CivicError::validation(
            "MISSING_FIELDS",
            format!("{field} is required"),
        ));
    }
    if value.chars().count() > max {
        return Err(civicdesk_core::CivicError::validation(
            "FIELD_TOO_LONG",
            format!("{field} cannot exceed {max} characters"),
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        head_id: Option<Option<Uuid>>,
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.head_id, None);

        let null: Patch = serde_json::from_str(r#"{"head_id": null}"#).unwrap();
        assert_eq!(null.head_id, Some(None));

        let id = Uuid::new_v4();
        let set: Patch = serde_json::from_str(&format!(r#"{{"head_id": "{id}"}}"#)).unwrap();
        assert_eq!(set.head_id, Some(Some(id)));
    }

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("name", "  Roads ", 10).unwrap(), "Roads");
        assert_eq!(required_text("name", " ", 10).unwrap_err().code(), "MISSING_FIELDS");
        assert_eq!(
            required_text("name", "abcdefghijk", 10).unwrap_err().code(),
            "FIELD_TOO_LONG"
        );
    }
}
