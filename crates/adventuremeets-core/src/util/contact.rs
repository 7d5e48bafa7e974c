//! Contact normalization for signup duplicate detection.
//!
//! ## Summary
//! Two signups to the same meet belong to the same person when either the
//! email or the phone matches case-insensitively. Both sides of the comparison
//! go through these helpers so stored and submitted values agree.

/// Normalize an email for comparison: trimmed and lowercased.
///
/// Returns `None` for blank input so an empty field never matches.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalize a phone number for comparison.
///
/// Whitespace, dashes, dots and parentheses are dropped; a leading `+` is kept.
/// Letters are lowercased so vanity numbers compare case-insensitively.
#[must_use]
pub fn normalize_phone(phone: &str) -> Option<String> {
    let normalized = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '\t'))
        .collect::<String>()
        .to_lowercase();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// ## Summary
/// Returns `true` when two contacts belong to the same person: emails match or
/// phones match, after normalization. Missing values never match.
#[must_use]
pub fn same_person(
    (email_a, phone_a): (Option<&str>, Option<&str>),
    (email_b, phone_b): (Option<&str>, Option<&str>),
) -> bool {
    let emails = email_a
        .and_then(normalize_email)
        .zip(email_b.and_then(normalize_email))
        .is_some_and(|(a, b)| a == b);
    let phones = phone_a
        .and_then(normalize_phone)
        .zip(phone_b.and_then(normalize_phone))
        .is_some_and(|(a, b)| a == b);
    emails || phones
}
