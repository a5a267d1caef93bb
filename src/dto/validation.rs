//! Validation helpers for DTOs.

use validator::ValidationError;

/// Characters allowed in a join code (unambiguous uppercase alphanumerics).
pub const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Fixed join code length.
pub const JOIN_CODE_LENGTH: usize = 6;
/// Longest accepted nickname.
pub const NICKNAME_MAX_LENGTH: usize = 24;

/// Validates that a join code is exactly six characters from the unambiguous
/// uppercase charset.
pub fn validate_join_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != JOIN_CODE_LENGTH {
        let mut err = ValidationError::new("join_code_length");
        err.message = Some(
            format!(
                "join code must be exactly {JOIN_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.bytes().all(|c| JOIN_CODE_CHARSET.contains(&c)) {
        let mut err = ValidationError::new("join_code_format");
        err.message = Some("join code contains characters outside the allowed set".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a nickname is non-blank, within length, and printable.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    if nickname.trim().is_empty() {
        let mut err = ValidationError::new("nickname_blank");
        err.message = Some("nickname must not be blank".into());
        return Err(err);
    }

    if nickname.chars().count() > NICKNAME_MAX_LENGTH {
        let mut err = ValidationError::new("nickname_length");
        err.message =
            Some(format!("nickname must be at most {NICKNAME_MAX_LENGTH} characters").into());
        return Err(err);
    }

    if nickname.chars().any(char::is_control) {
        let mut err = ValidationError::new("nickname_format");
        err.message = Some("nickname must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_join_code_valid() {
        assert!(validate_join_code("ABC234").is_ok());
        assert!(validate_join_code("ZZZZZZ").is_ok());
    }

    #[test]
    fn test_validate_join_code_invalid_length() {
        assert!(validate_join_code("ABC23").is_err()); // too short
        assert!(validate_join_code("ABC2345").is_err()); // too long
        assert!(validate_join_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_join_code_invalid_format() {
        assert!(validate_join_code("abc234").is_err()); // lowercase
        assert!(validate_join_code("ABC10O").is_err()); // ambiguous chars excluded
        assert!(validate_join_code("ABC 34").is_err()); // space
    }

    #[test]
    fn test_validate_nickname() {
        assert!(validate_nickname("ada").is_ok());
        assert!(validate_nickname("  ").is_err());
        assert!(validate_nickname("a\tb").is_err());
        assert!(validate_nickname(&"x".repeat(25)).is_err());
    }
}
