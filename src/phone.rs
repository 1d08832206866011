// Phone number normalization: turns whatever the operator typed into the
// canonical digit-only form used as the report key, and maps the country
// calling code to a region for the FLAG column.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Numbers shorter than this (after stripping separators) are rejected.
pub const MIN_DIGITS: usize = 7;

/// A validated phone number: ASCII digits only, at least `MIN_DIGITS` long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

/// Raised when a raw entry does not contain enough digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid phone number format: {raw}")]
pub struct InvalidFormat {
    pub raw: String,
}

/// Strip every non-digit character and validate the length.
pub fn normalize(raw: &str) -> Result<PhoneNumber, InvalidFormat> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_DIGITS {
        return Err(InvalidFormat {
            raw: raw.trim().to_string(),
        });
    }
    Ok(PhoneNumber(digits))
}

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits in international format, prefixed with `+`.
    pub fn international(&self) -> String {
        format!("+{}", self.0)
    }

    /// ISO region of the number's country calling code, if the prefix is
    /// assigned.
    pub fn region(&self) -> Option<String> {
        region_for(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Main region for the calling code that prefixes `digits`, as found in
/// libphonenumber's metadata. Shared codes (1, 7, 44, ...) resolve to their
/// main country; non-geographic codes such as 800 resolve to `001`.
pub fn region_for(digits: &str) -> Option<String> {
    let parsed = phonenumber::parse(None, format!("+{digits}")).ok()?;
    let code = parsed.code().value();
    let regions = phonenumber::metadata::DATABASE.by_code(&code)?;
    regions
        .iter()
        .find(|meta| meta.is_main_country_for_code())
        .or_else(|| regions.first())
        .map(|meta| meta.id().to_string())
}
