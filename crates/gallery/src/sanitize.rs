//! Ingress cleaning for free-text checkout fields.
//!
//! Every function trims its result. Nothing here validates; blank results
//! are left for the checkout to reject.

const MARKUP: [char; 5] = ['<', '>', '"', '\'', ';'];

/// Strip markup characters from free text.
#[must_use]
pub fn text(input: &str) -> String {
    input.replace(MARKUP, "").trim().to_owned()
}

/// Keep letters, whitespace and hyphens.
#[must_use]
pub fn name(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace() || *c == '-')
        .collect::<String>()
        .trim()
        .to_owned()
}

#[must_use]
pub fn email(input: &str) -> String {
    text(&input.to_lowercase())
}

/// Digits only, with an optional leading `+`.
#[must_use]
pub fn phone(input: &str) -> String {
    let trimmed = input.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with('+') {
        format!("+{digits}")
    } else {
        digits
    }
}

#[must_use]
pub fn postal_code(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Same rule as free text; references are opaque to us.
#[must_use]
pub fn payment_reference(input: &str) -> String {
    text(input)
}
