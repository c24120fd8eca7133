//! Identifier arithmetic: facility codes, sequential sources, check digits.

use crate::{IdentifierError, IdentifierResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Master Facility List code, used as the prefix of generated patient
/// numbers.
///
/// MFL codes are short all-digit strings assigned nationally; anything
/// else is rejected at construction so downstream code can assume a
/// well-formed prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacilityCode(String);

impl FacilityCode {
    /// Validates and wraps an MFL code.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidFacilityCode`] unless the input is
    /// 1-10 ASCII digits.
    pub fn parse(input: &str) -> IdentifierResult<Self> {
        let trimmed = input.trim();
        let ok = !trimmed.is_empty()
            && trimmed.len() <= 10
            && trimmed.bytes().all(|b| b.is_ascii_digit());
        if !ok {
            return Err(IdentifierError::InvalidFacilityCode(input.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FacilityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FacilityCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FacilityCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FacilityCode::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A named sequential identifier source over an arbitrary character set.
///
/// The source hands out identifiers in positional order over its character
/// set (`"0123456789"` gives `0001, 0002, …`; a Luhn base-30-style set
/// works the same way), appending a Luhn mod-N check digit so transposed
/// or mistyped identifiers can be rejected at entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSource {
    name: String,
    base_character_set: String,
    next_sequence: String,
}

impl IdentifierSource {
    /// Creates a source starting from `first_base`.
    ///
    /// # Errors
    ///
    /// Rejects character sets with fewer than two characters or with
    /// duplicates, and a `first_base` containing characters outside the
    /// set.
    pub fn new(
        name: impl Into<String>,
        base_character_set: impl Into<String>,
        first_base: impl Into<String>,
    ) -> IdentifierResult<Self> {
        let base_character_set = base_character_set.into();
        let chars: Vec<char> = base_character_set.chars().collect();
        if chars.len() < 2 {
            return Err(IdentifierError::CharacterSetTooSmall);
        }
        for (i, c) in chars.iter().enumerate() {
            if chars[..i].contains(c) {
                return Err(IdentifierError::DuplicateCharacter(*c));
            }
        }

        let first_base = first_base.into();
        if first_base.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if let Some(bad) = first_base.chars().find(|c| !chars.contains(c)) {
            return Err(IdentifierError::CharacterNotInSet(bad));
        }

        Ok(Self {
            name: name.into(),
            base_character_set,
            next_sequence: first_base,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sequence the next call to [`next_identifier`] will consume.
    ///
    /// [`next_identifier`]: IdentifierSource::next_identifier
    pub fn peek_sequence(&self) -> &str {
        &self.next_sequence
    }

    /// Hands out the next identifier: the current sequence plus its check
    /// digit, advancing the source.
    pub fn next_identifier(&mut self) -> IdentifierResult<String> {
        let sequence = self.next_sequence.clone();
        let check = luhn_check_digit(&sequence, &self.base_character_set)?;
        self.next_sequence = self.increment(&sequence);

        let mut identifier = sequence;
        identifier.push(check);
        Ok(identifier)
    }

    /// A facility-prefixed unique patient number.
    pub fn next_facility_number(&mut self, facility: &FacilityCode) -> IdentifierResult<String> {
        let identifier = self.next_identifier()?;
        Ok(format!("{}{}", facility.as_str(), identifier))
    }

    fn increment(&self, sequence: &str) -> String {
        let chars: Vec<char> = self.base_character_set.chars().collect();
        let one_past_last = chars.len();

        let mut digits: Vec<usize> = sequence
            .chars()
            .map(|c| {
                chars
                    .iter()
                    .position(|&x| x == c)
                    .unwrap_or(0)
            })
            .collect();

        let mut carry = 1;
        for digit in digits.iter_mut().rev() {
            if carry == 0 {
                break;
            }
            *digit += carry;
            if *digit >= one_past_last {
                *digit = 0;
                carry = 1;
            } else {
                carry = 0;
            }
        }

        let mut out: String = digits.into_iter().map(|d| chars[d]).collect();
        if carry == 1 {
            // Rolled over the width, grow by one position.
            out.insert(0, chars[1]);
        }
        out
    }
}

/// Computes the Luhn mod-N check digit of `sequence` over `character_set`.
///
/// # Errors
///
/// Returns [`IdentifierError::CharacterNotInSet`] when the sequence uses a
/// character outside the set, or [`IdentifierError::Empty`] for an empty
/// sequence.
pub fn luhn_check_digit(sequence: &str, character_set: &str) -> IdentifierResult<char> {
    let chars: Vec<char> = character_set.chars().collect();
    let n = chars.len();
    if sequence.is_empty() {
        return Err(IdentifierError::Empty);
    }

    let mut factor = 2;
    let mut sum = 0;
    for c in sequence.chars().rev() {
        let code_point = chars
            .iter()
            .position(|&x| x == c)
            .ok_or(IdentifierError::CharacterNotInSet(c))?;
        let addend = factor * code_point;
        factor = if factor == 2 { 1 } else { 2 };
        sum += addend / n + addend % n;
    }

    let remainder = sum % n;
    let check_code_point = (n - remainder) % n;
    Ok(chars[check_code_point])
}

/// Whether `identifier`'s final character is the correct check digit for
/// the rest of it.
pub fn validate_identifier(identifier: &str, character_set: &str) -> IdentifierResult<bool> {
    let mut chars = identifier.chars();
    let Some(check) = chars.next_back() else {
        return Err(IdentifierError::Empty);
    };
    let body: String = chars.collect();
    if body.is_empty() {
        return Err(IdentifierError::Empty);
    }
    Ok(luhn_check_digit(&body, character_set)? == check)
}
