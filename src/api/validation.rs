use super::ApiError;
use crate::domain::CodeValue;

const MAX_NOTES_LEN: usize = 500;

pub fn validate_phone(phone: &str) -> Result<&str, ApiError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Phone number is required"));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'))
    {
        return Err(ApiError::validation(
            "Phone number can only contain digits, spaces, hyphens, and a leading +",
        ));
    }

    Ok(trimmed)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    Ok(password)
}

pub fn validate_customer_code(code: &str) -> Result<CodeValue, ApiError> {
    CodeValue::parse(code)
        .ok_or_else(|| ApiError::validation("Customer code must be a 6-digit number"))
}

pub fn validate_notes(notes: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(notes) = notes else {
        return Ok(None);
    };

    let trimmed = notes.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.chars().count() > MAX_NOTES_LEN {
        return Err(ApiError::validation(format!(
            "Notes must be {MAX_NOTES_LEN} characters or less"
        )));
    }

    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone(" 5512345678 ").unwrap(), "5512345678");
        assert!(validate_phone("+52 55-1234-5678").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("55abc45678").is_err());
    }

    #[test]
    fn test_validate_customer_code() {
        assert_eq!(validate_customer_code("482913").unwrap().as_str(), "482913");
        assert!(validate_customer_code("48291").is_err());
        assert!(validate_customer_code("abcdef").is_err());
    }

    #[test]
    fn test_validate_notes() {
        assert_eq!(validate_notes(None).unwrap(), None);
        assert_eq!(validate_notes(Some("   ".to_string())).unwrap(), None);
        assert_eq!(
            validate_notes(Some(" extra sauce ".to_string())).unwrap(),
            Some("extra sauce".to_string())
        );
        assert!(validate_notes(Some("x".repeat(501))).is_err());
    }
}
