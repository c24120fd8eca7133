//! Validated primitive types shared across the ACE workspace.
//!
//! These wrappers exist so that identifiers, codes, and report filters are
//! checked once at the system boundary and can be assumed valid everywhere
//! else. Record structs and query contracts live in `ace-store`; this crate
//! holds only the small value types they are built from.

pub mod period;

pub use period::{DateTimeRange, Period, PeriodError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// The input text was empty or contained only whitespace
    #[error("value cannot be empty")]
    Empty,
    #[error("invalid concept code '{0}': only ASCII alphanumerics and '-' are allowed")]
    InvalidConceptCode(String),
    #[error("invalid program UUID '{0}'")]
    InvalidProgramUuid(String),
    #[error("invalid gender '{0}': expected \"M\" or \"F\"")]
    InvalidGender(String),
    #[error("invalid age selector '{0}': expected an operator (<, <=, >, >=, =) followed by years")]
    InvalidAgeSelector(String),
}

/// Opaque identifier of a patient in the external clinical data store.
///
/// Patients are owned by the host platform; the engine only ever holds their
/// identifiers and derives transient sets of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub i64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a visit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub i64);

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a materialized drug-order-processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugOrderProcessedId(pub i64);

impl fmt::Display for DrugOrderProcessedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a materialized drug-observation-processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugObsProcessedId(pub i64);

impl fmt::Display for DrugObsProcessedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A care program's UUID (for example the ART or HIV program).
///
/// Programs are genuine RFC 4122 UUIDs in the source data, unlike concept
/// codes, so this wraps `uuid::Uuid` and accepts the standard hyphenated
/// form only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramUuid(uuid::Uuid);

impl ProgramUuid {
    /// Validates and parses a program UUID in standard hyphenated form.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidProgramUuid`] if `input` is not a valid
    /// hyphenated UUID.
    pub fn parse(input: &str) -> Result<Self, ValueError> {
        uuid::Uuid::try_parse(input)
            .map(Self)
            .map_err(|_| ValueError::InvalidProgramUuid(input.to_owned()))
    }

    pub fn uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for ProgramUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Serialize for ProgramUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProgramUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ProgramUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A clinical concept code from the host platform's dictionary.
///
/// Concept codes look UUID-ish but are not all valid UUIDs (padded legacy
/// codes such as `5240AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA` occur in real
/// dictionaries), so this is a validated string rather than a `uuid::Uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptCode(String);

impl ConceptCode {
    /// Creates a concept code from the given input.
    ///
    /// The input is trimmed; it must be non-empty and consist of ASCII
    /// alphanumerics and hyphens only.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::Empty`] for blank input and
    /// [`ValueError::InvalidConceptCode`] for disallowed characters.
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty);
        }
        let ok = trimmed
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-'));
        if !ok {
            return Err(ValueError::InvalidConceptCode(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ConceptCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ConceptCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConceptCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ConceptCode::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Patient gender as recorded by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            other => Err(ValueError::InvalidGender(other.to_owned())),
        }
    }
}

/// Comparison operator of an [`AgeSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

/// A structured age filter: an operator plus a whole number of years.
///
/// The host platform's reporting pages historically passed freeform SQL
/// comparator fragments (`">=15"`, `"<5"`); this type is the structured
/// replacement. [`AgeSelector::from_str`] still accepts the legacy fragment
/// syntax so existing report definitions can be carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgeSelector {
    pub op: AgeOp,
    pub years: u32,
}

impl AgeSelector {
    pub fn new(op: AgeOp, years: u32) -> Self {
        Self { op, years }
    }

    /// Whether an age in whole years satisfies this selector.
    pub fn matches(&self, age_years: u32) -> bool {
        match self.op {
            AgeOp::Lt => age_years < self.years,
            AgeOp::Le => age_years <= self.years,
            AgeOp::Gt => age_years > self.years,
            AgeOp::Ge => age_years >= self.years,
            AgeOp::Eq => age_years == self.years,
        }
    }
}

impl fmt::Display for AgeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            AgeOp::Lt => "<",
            AgeOp::Le => "<=",
            AgeOp::Gt => ">",
            AgeOp::Ge => ">=",
            AgeOp::Eq => "=",
        };
        write!(f, "{}{}", op, self.years)
    }
}

impl FromStr for AgeSelector {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (op, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            (AgeOp::Ge, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (AgeOp::Le, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (AgeOp::Gt, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (AgeOp::Lt, rest)
        } else if let Some(rest) = trimmed.strip_prefix('=') {
            (AgeOp::Eq, rest)
        } else {
            return Err(ValueError::InvalidAgeSelector(trimmed.to_owned()));
        };

        let years = rest
            .trim()
            .parse::<u32>()
            .map_err(|_| ValueError::InvalidAgeSelector(trimmed.to_owned()))?;
        Ok(Self { op, years })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_uuid_accepts_hyphenated_form() {
        let uuid = ProgramUuid::parse("96ec813f-aaf0-45b2-add6-e661d5bf79d6")
            .expect("hyphenated UUID should parse");
        assert_eq!(uuid.to_string(), "96ec813f-aaf0-45b2-add6-e661d5bf79d6");
    }

    #[test]
    fn test_program_uuid_rejects_garbage() {
        let err = ProgramUuid::parse("not-a-uuid").expect_err("should reject non-UUID input");
        assert!(matches!(err, ValueError::InvalidProgramUuid(_)));
    }

    #[test]
    fn test_concept_code_accepts_padded_legacy_codes() {
        let code = ConceptCode::new("5240AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .expect("padded legacy code should be accepted");
        assert_eq!(code.as_str(), "5240AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn test_concept_code_rejects_empty_and_invalid() {
        assert!(matches!(ConceptCode::new("  "), Err(ValueError::Empty)));
        assert!(matches!(
            ConceptCode::new("abc def"),
            Err(ValueError::InvalidConceptCode(_))
        ));
    }

    #[test]
    fn test_gender_round_trips_through_str() {
        assert_eq!("M".parse::<Gender>().expect("M should parse"), Gender::Male);
        assert_eq!(
            "F".parse::<Gender>().expect("F should parse"),
            Gender::Female
        );
        assert!(matches!(
            "X".parse::<Gender>(),
            Err(ValueError::InvalidGender(_))
        ));
    }

    #[test]
    fn test_age_selector_parses_legacy_fragments() {
        let ge15 = ">=15".parse::<AgeSelector>().expect(">=15 should parse");
        assert_eq!(ge15, AgeSelector::new(AgeOp::Ge, 15));
        assert!(ge15.matches(15));
        assert!(ge15.matches(40));
        assert!(!ge15.matches(14));

        let lt5 = "<5".parse::<AgeSelector>().expect("<5 should parse");
        assert_eq!(lt5, AgeSelector::new(AgeOp::Lt, 5));
        assert!(lt5.matches(4));
        assert!(!lt5.matches(5));
    }

    #[test]
    fn test_age_selector_rejects_freeform_sql() {
        assert!(matches!(
            ">= 15 OR 1=1".parse::<AgeSelector>(),
            Err(ValueError::InvalidAgeSelector(_))
        ));
        assert!(matches!(
            "15".parse::<AgeSelector>(),
            Err(ValueError::InvalidAgeSelector(_))
        ));
    }
}
