use chronicle_shared::errors::AppError;

/// Collects password-strength violations instead of failing on the first.
pub fn password_violations(password: &str, errors: &mut Vec<String>) {
    if password.len() < 8 {
        errors.push("password must be at least 8 characters".into());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("password must contain at least one uppercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("password must contain at least one lowercase letter".into());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("password must contain at least one digit".into());
    }
}

/// Usernames: 3-50 chars from [A-Za-z0-9_-].
pub fn username_violation(username: &str) -> Option<String> {
    if username.len() < 3 || username.len() > 50 {
        return Some("username must be between 3 and 50 characters".into());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Some("username may only contain letters, digits, underscores and hyphens".into());
    }
    None
}

/// Registration input check. All violations are aggregated into a single
/// `ValidationError` rather than surfacing one at a time.
pub fn validate_registration(
    email: &str,
    password: &str,
    username: Option<&str>,
) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if !validator::validate_email(email) {
        errors.push("invalid email format".into());
    }
    password_violations(password, &mut errors);
    if let Some(username) = username {
        if let Some(msg) = username_violation(username) {
            errors.push(msg);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors))
    }
}

/// Password check used outside registration (change/reset paths).
pub fn validate_password(password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    password_violations(password, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors))
    }
}
