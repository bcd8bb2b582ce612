use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Invalid phone number: {0}")]
pub struct PhoneError(pub String);

fn e164() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("static regex"))
}

/// Normalize user-entered phone numbers to E.164. Numbers without a country
/// code default to Israel, matching the upstream booking UI.
pub fn normalize_phone_e164(input: &str) -> Result<String, PhoneError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let candidate = if let Some(rest) = cleaned.strip_prefix("00") {
        format!("+{}", rest)
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("+972{}", rest)
    } else if cleaned.starts_with('+') {
        cleaned
    } else {
        return Err(PhoneError(input.to_string()));
    };

    if !e164().is_match(&candidate) {
        return Err(PhoneError(input.to_string()));
    }
    Ok(candidate)
}
