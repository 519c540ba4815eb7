//! Canonicalisation of Kenyan subscriber numbers.
//!
//! The provider wants `254XXXXXXXXX`. Users type `07XX...`, `+254 7XX...`, `254-7XX...` and every spacing variant in
//! between. Normalise once at the boundary; everything downstream only ever sees a [`PhoneNumber`].

use std::{fmt::Display, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

// One of the three accepted prefixes followed by a 9-digit subscriber number.
const PHONE_PATTERN: &str = r"^(?:0|\+254|254)(\d{9})$";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid phone number format: {0}")]
pub struct PhoneFormatError(pub String);

/// A subscriber number in canonical `254XXXXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_phone(s)
    }
}

/// Canonicalises a subscriber number. Accepts `0XXXXXXXXX`, `+254XXXXXXXXX` and `254XXXXXXXXX`, ignoring whitespace
/// and common punctuation. Pure function; anything that does not match fails with [`PhoneFormatError`].
pub fn normalize_phone(input: &str) -> Result<PhoneNumber, PhoneFormatError> {
    let cleaned: String = input.chars().filter(|c| !matches!(c, ' ' | '\t' | '-' | '.' | '(' | ')')).collect();
    let re = Regex::new(PHONE_PATTERN).unwrap();
    let captures = re.captures(&cleaned).ok_or_else(|| PhoneFormatError(input.to_string()))?;
    Ok(PhoneNumber(format!("254{}", &captures[1])))
}
