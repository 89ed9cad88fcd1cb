use serde::{Deserialize, Serialize};

pub const MAX_CHIRP_LENGTH: usize = 140;

const PROFANE_WORDS: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];
const PROFANITY_MASK: &str = "****";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    ChirpTooLong { length: usize, max: usize },
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChirpTooLong { .. } => "invalid_request",
        }
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChirpTooLong { .. } => write!(f, "Chirp is too long"),
        }
    }
}

impl std::error::Error for DomainError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chirp {
    pub id: u64,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    /// Argon2id PHC string.
    #[serde(rename = "password")]
    pub password_hash: String,
}

pub fn validate_chirp_body(body: &str) -> Result<(), DomainError> {
    let length = body.chars().count();
    if length > MAX_CHIRP_LENGTH {
        return Err(DomainError::ChirpTooLong {
            length,
            max: MAX_CHIRP_LENGTH,
        });
    }
    Ok(())
}

/// Masks blocked words. Only whole space-separated words match, compared
/// case-insensitively; a word with trailing punctuation is left alone.
pub fn clean_chirp_body(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            if PROFANE_WORDS.contains(&lower.as_str()) {
                PROFANITY_MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn chirp_length_limit_is_inclusive() {
        let at_limit = "a".repeat(MAX_CHIRP_LENGTH);
        assert!(validate_chirp_body(&at_limit).is_ok());

        let over = "a".repeat(MAX_CHIRP_LENGTH + 1);
        let err = validate_chirp_body(&over).unwrap_err();
        assert_eq!(
            err,
            DomainError::ChirpTooLong {
                length: MAX_CHIRP_LENGTH + 1,
                max: MAX_CHIRP_LENGTH
            }
        );
        assert_eq!(err.to_string(), "Chirp is too long");
    }

    #[test]
    fn chirp_length_counts_chars_not_bytes() {
        let body = "é".repeat(MAX_CHIRP_LENGTH);
        assert!(body.len() > MAX_CHIRP_LENGTH);
        assert!(validate_chirp_body(&body).is_ok());
    }

    #[test]
    fn clean_masks_blocked_words_case_insensitively() {
        assert_eq!(
            clean_chirp_body("This is a kerfuffle opinion I need to share with the world"),
            "This is a **** opinion I need to share with the world"
        );
        assert_eq!(clean_chirp_body("Sharbert and FORNAX"), "**** and ****");
    }

    #[test]
    fn clean_leaves_punctuated_words_alone() {
        assert_eq!(clean_chirp_body("Sharbert!"), "Sharbert!");
        assert_eq!(clean_chirp_body("kerfuffle, fornax"), "kerfuffle, ****");
    }

    #[test]
    fn clean_preserves_spacing() {
        assert_eq!(clean_chirp_body("a  fornax  b"), "a  ****  b");
        assert_eq!(clean_chirp_body(""), "");
    }

    #[test]
    fn user_password_hash_serializes_as_password() {
        let user = User {
            id: 1,
            email: "u@test.com".to_string(),
            password_hash: "$argon2id$x".to_string(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": 1, "email": "u@test.com", "password": "$argon2id$x"})
        );
    }
}
