//! Name and text validation shared by the store and the reference commands.

/// Home names: a letter followed by 1 to 15 letters or digits (ASCII only).
pub const HOME_NAME_MIN: usize = 2;
pub const HOME_NAME_MAX: usize = 16;

/// Longest mail body accepted by `mail send`.
pub const MAIL_MAX_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HomeNameError {
    #[error("Home name is too short (minimum {HOME_NAME_MIN} characters)")]
    TooShort,

    #[error("Home name is too long (maximum {HOME_NAME_MAX} characters)")]
    TooLong,

    #[error("Home name must start with a letter")]
    BadStart,

    #[error("Home name may only contain letters and digits")]
    InvalidCharacters,
}

/// Validate a home name. Matching is ASCII and case-insensitive; callers store the
/// lowercased form.
pub fn validate_home_name(name: &str) -> Result<(), HomeNameError> {
    let len = name.chars().count();
    if len < HOME_NAME_MIN {
        return Err(HomeNameError::TooShort);
    }
    if len > HOME_NAME_MAX {
        return Err(HomeNameError::TooLong);
    }
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(HomeNameError::BadStart);
    }
    if !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(HomeNameError::InvalidCharacters);
    }
    Ok(())
}

/// Trim a free-text message and reject empty or oversized ones.
pub fn clean_message(text: &str, max: usize) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max || trimmed.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_names_follow_the_pattern() {
        for ok in ["ab", "Base", "h0me", "abcdefghijklmnop"] {
            assert!(validate_home_name(ok).is_ok(), "{ok} should be valid");
        }
        assert_eq!(validate_home_name("a"), Err(HomeNameError::TooShort));
        assert_eq!(validate_home_name("abcdefghijklmnopq"), Err(HomeNameError::TooLong));
        assert_eq!(validate_home_name("1base"), Err(HomeNameError::BadStart));
        assert_eq!(validate_home_name("my_home"), Err(HomeNameError::InvalidCharacters));
        assert_eq!(validate_home_name("café"), Err(HomeNameError::InvalidCharacters));
    }

    #[test]
    fn messages_are_trimmed_and_bounded() {
        assert_eq!(clean_message("  hi there ", 20).as_deref(), Some("hi there"));
        assert_eq!(clean_message("   ", 20), None);
        assert_eq!(clean_message("line\nbreak", 20), None);
        assert_eq!(clean_message(&"x".repeat(21), 20), None);
    }
}
