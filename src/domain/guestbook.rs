//! Guestbook entries and the rules a new message must satisfy.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use vitrine_api_types::{GuestbookEntryView, ValidationIssue};

pub const MESSAGE_MIN_CHARS: usize = 1;
pub const MESSAGE_MAX_CHARS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestbookEntry {
    pub id: i64,
    pub message: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: Option<String>,
    pub user_image: Option<String>,
    pub created_at: OffsetDateTime,
}

impl GuestbookEntry {
    pub fn to_view(&self, salt: &str) -> GuestbookEntryView {
        GuestbookEntryView {
            id: obfuscate_id(self.id, salt),
            message: self.message.clone(),
            user_name: self.user_name.clone(),
            user_image: self.user_image.clone(),
            created_at: self.created_at,
        }
    }
}

/// Fields required to persist an entry. The repository assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGuestbookEntry {
    pub message: GuestbookMessage,
    pub user_id: String,
    pub user_name: String,
    pub user_email: Option<String>,
    pub user_image: Option<String>,
}

/// A message that passed [`validate_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestbookMessage(String);

impl GuestbookMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("guestbook message rejected")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }
}

/// Length is measured in Unicode scalar values, not bytes.
pub fn validate_message(raw: &str) -> Result<GuestbookMessage, ValidationError> {
    let length = raw.chars().count();
    if length < MESSAGE_MIN_CHARS {
        return Err(ValidationError::single(
            "message",
            format!("must contain at least {MESSAGE_MIN_CHARS} character"),
        ));
    }
    if length > MESSAGE_MAX_CHARS {
        return Err(ValidationError::single(
            "message",
            format!("must contain at most {MESSAGE_MAX_CHARS} characters"),
        ));
    }
    Ok(GuestbookMessage(raw.to_string()))
}

/// Stable public identifier for a numeric entry id.
pub fn obfuscate_id(id: i64, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_rejected() {
        let err = validate_message("").expect_err("empty rejected");
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].field, "message");
    }

    #[test]
    fn message_length_boundaries() {
        let exact = "a".repeat(MESSAGE_MAX_CHARS);
        assert!(validate_message(&exact).is_ok());

        let over = "a".repeat(MESSAGE_MAX_CHARS + 1);
        assert!(validate_message(&over).is_err());
    }

    #[test]
    fn multibyte_characters_count_once() {
        let message = "é".repeat(MESSAGE_MAX_CHARS);
        assert!(message.len() > MESSAGE_MAX_CHARS);
        assert!(validate_message(&message).is_ok());
    }

    #[test]
    fn obfuscated_ids_are_stable_and_salted() {
        let a = obfuscate_id(42, "salt");
        assert_eq!(a, obfuscate_id(42, "salt"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, obfuscate_id(43, "salt"));
        assert_ne!(a, obfuscate_id(42, "pepper"));
    }
}
