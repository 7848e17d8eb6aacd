//! Concept identifiers.

use std::fmt;
use std::str::FromStr;

use crate::checksum::is_valid_checksum;

/// Longest identifier accepted (SCTIDs are at most 18 digits).
pub const MAX_IDENTIFIER_DIGITS: usize = 18;

/// A checksum-validated concept identifier.
///
/// # Examples
///
/// ```
/// use authoring::ConceptId;
///
/// let disease = ConceptId::parse("64572001").unwrap();
/// assert_eq!(disease.to_string(), "64572001");
/// assert!(ConceptId::parse("64572002").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConceptId(u64);

/// `116680003 |Is a|`
pub const IS_A: ConceptId = ConceptId(116_680_003);

/// `410662002 |Concept model attribute|`
pub const CONCEPT_MODEL_ATTRIBUTE: ConceptId = ConceptId(410_662_002);

/// `138875005 |SNOMED CT Concept|`
pub const ROOT: ConceptId = ConceptId(138_875_005);

impl ConceptId {
    /// Parses an identifier, returning `None` unless it is 2 to 18 ASCII
    /// digits with no leading zero and a valid check digit.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() > MAX_IDENTIFIER_DIGITS || s.starts_with('0') || !is_valid_checksum(s) {
            return None;
        }
        s.parse::<u64>().ok().map(Self)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned by [`ConceptId::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid concept identifier")]
pub struct InvalidConceptId(pub String);

impl FromStr for ConceptId {
    type Err = InvalidConceptId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidConceptId(s.to_string()))
    }
}
