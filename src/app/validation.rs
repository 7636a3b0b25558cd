// Credential checks shared by the sign-up and login forms
use std::sync::LazyLock;

use regex::Regex;

pub const EMAIL_ERROR: &str = "Please insert a valid email.";
pub const PASSWORD_ERROR: &str = "Your password should have at least six characters and include one digit, one lower case letter and one upper case letter.";
pub const PASSWORD_MATCH_ERROR: &str = "Passwords do not match.";
pub const EMPTY_PASSWORD_ERROR: &str = "Password cannot be empty.";

const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$")
        .expect("valid email pattern")
});

pub fn is_valid_email(email: &str) -> bool {
    !email.trim().is_empty() && EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
}

pub fn password_matches(password: &str, repeated: &str) -> bool {
    password == repeated
}
