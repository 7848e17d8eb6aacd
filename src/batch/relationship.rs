//! Relationship values produced by the batch import parser.
//!
//! Relationships are immutable once built. The parser never knows the
//! source concept; callers stamp it afterwards with
//! [`Relationship::with_source_id`], which returns a new value.

use std::fmt;

use crate::concept::{ConceptId, IS_A};

/// Group number of the implicit ungrouped attribute cluster.
pub const UNGROUPED: u32 = 0;

/// Prefix of the temporary ids given to parent links (`isa_0`, `isa_1`, ...).
pub const PARENT_ID_PREFIX: &str = "isa_";

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicType {
    Stated,
    Inferred,
    Additional,
}

impl CharacteristicType {
    /// Wire token for this characteristic type.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Stated => "STATED_RELATIONSHIP",
            Self::Inferred => "INFERRED_RELATIONSHIP",
            Self::Additional => "ADDITIONAL_RELATIONSHIP",
        }
    }

    /// Parses a wire token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "STATED_RELATIONSHIP" => Some(Self::Stated),
            "INFERRED_RELATIONSHIP" => Some(Self::Inferred),
            "ADDITIONAL_RELATIONSHIP" => Some(Self::Additional),
            _ => None,
        }
    }
}

impl fmt::Display for CharacteristicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipModifier {
    Existential,
    Universal,
}

impl RelationshipModifier {
    /// Wire token for this modifier.
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Existential => "EXISTENTIAL",
            Self::Universal => "UNIVERSAL",
        }
    }

    /// Parses a wire token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "EXISTENTIAL" => Some(Self::Existential),
            "UNIVERSAL" => Some(Self::Universal),
            _ => None,
        }
    }
}

/// A relationship in the browser view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    relationship_id: String,
    source_id: Option<String>,
    type_id: ConceptId,
    target_id: ConceptId,
    group_id: u32,
    characteristic_type: CharacteristicType,
    modifier: RelationshipModifier,
    active: bool,
}

impl Relationship {
    /// Creates an active, existential, stated relationship.
    #[must_use]
    pub fn stated(
        relationship_id: impl Into<String>,
        type_id: ConceptId,
        target_id: ConceptId,
        group_id: u32,
    ) -> Self {
        Self {
            relationship_id: relationship_id.into(),
            source_id: None,
            type_id,
            target_id,
            group_id,
            characteristic_type: CharacteristicType::Stated,
            modifier: RelationshipModifier::Existential,
            active: true,
        }
    }

    /// Creates a fully specified relationship.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        relationship_id: impl Into<String>,
        source_id: Option<String>,
        type_id: ConceptId,
        target_id: ConceptId,
        group_id: u32,
        characteristic_type: CharacteristicType,
        modifier: RelationshipModifier,
        active: bool,
    ) -> Self {
        Self {
            relationship_id: relationship_id.into(),
            source_id,
            type_id,
            target_id,
            group_id,
            characteristic_type,
            modifier,
            active,
        }
    }

    /// Returns a copy of this relationship attached to `source_id`.
    #[must_use]
    pub fn with_source_id(&self, source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..self.clone()
        }
    }

    /// Temporary identifier assigned at parse time.
    #[must_use]
    pub fn relationship_id(&self) -> &str {
        &self.relationship_id
    }

    /// Source concept, once stamped.
    #[must_use]
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Attribute type; `IS_A` for parent links.
    #[must_use]
    pub const fn type_id(&self) -> ConceptId {
        self.type_id
    }

    /// Destination concept.
    #[must_use]
    pub const fn target_id(&self) -> ConceptId {
        self.target_id
    }

    /// Group number; [`UNGROUPED`] for group 0.
    #[must_use]
    pub const fn group_id(&self) -> u32 {
        self.group_id
    }

    /// Characteristic type.
    #[must_use]
    pub const fn characteristic_type(&self) -> CharacteristicType {
        self.characteristic_type
    }

    /// Modifier.
    #[must_use]
    pub const fn modifier(&self) -> RelationshipModifier {
        self.modifier
    }

    /// Whether the relationship is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true for the ungrouped `IS_A` links generated from focus
    /// concepts.
    ///
    /// An `IS_A` written as an attribute keeps its `rel_*` id and is not a
    /// parent link.
    #[must_use]
    pub fn is_parent(&self) -> bool {
        self.type_id == IS_A && self.group_id == UNGROUPED && self.relationship_id.starts_with(PARENT_ID_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ConceptId {
        ConceptId::parse(s).unwrap()
    }

    #[test]
    fn stated_relationship_defaults() {
        let rel = Relationship::stated("rel_1_0", id("363698007"), id("38848004"), 1);
        assert_eq!(rel.characteristic_type(), CharacteristicType::Stated);
        assert_eq!(rel.modifier(), RelationshipModifier::Existential);
        assert!(rel.is_active());
        assert!(rel.source_id().is_none());
        assert!(!rel.is_parent());
    }

    #[test]
    fn with_source_id_leaves_original_untouched() {
        let rel = Relationship::stated("isa_0", IS_A, id("64572001"), UNGROUPED);
        let stamped = rel.with_source_id("tmp_1");
        assert_eq!(stamped.source_id(), Some("tmp_1"));
        assert!(rel.source_id().is_none());
        assert!(stamped.is_parent());
    }

    #[test]
    fn is_a_attribute_is_not_a_parent_link() {
        let attribute = Relationship::stated("rel_0_0", IS_A, id("404684003"), UNGROUPED);
        assert!(!attribute.is_parent());
    }

    #[test]
    fn tokens_round_trip() {
        for ct in [
            CharacteristicType::Stated,
            CharacteristicType::Inferred,
            CharacteristicType::Additional,
        ] {
            assert_eq!(CharacteristicType::from_token(ct.as_token()), Some(ct));
        }
        assert_eq!(RelationshipModifier::from_token("EXISTENTIAL"), Some(RelationshipModifier::Existential));
        assert_eq!(RelationshipModifier::from_token("SOME"), None);
    }
}
