//! Batch import expression parser.
//!
//! Parses the compact post-coordinated grammar used by batch import:
//!
//! ```text
//! [=== | <<<] focus [+ focus ...] [: attr, ... , { attr, ... }, ...]
//! attr := type = value
//! ```
//!
//! Identifiers may carry a `|term|` annotation, which is ignored. Every
//! identifier must pass the Verhoeff checksum. Any error aborts the whole
//! expression; partial results are never returned.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::concept::{ConceptId, IS_A};
use crate::error::{AttributeSide, ProcessingError};

use super::relationship::{Relationship, PARENT_ID_PREFIX, UNGROUPED};

const FOCUS_SEPARATOR: char = ':';
const FOCUS_CONCEPT_SEPARATOR: char = '+';
const ATTRIBUTE_SEPARATOR: char = ',';
const TYPE_SEPARATOR: char = '=';
const GROUP_OPEN: char = '{';
const GROUP_CLOSE: char = '}';

const FULLY_DEFINED_PREFIX: &str = "===";
const PRIMITIVE_PREFIX: &str = "<<<";

/// Attribute sets keyed by group number.
pub type AttributeGroups = BTreeMap<u32, BTreeSet<(ConceptId, ConceptId)>>;

/// Definition status declared by the expression prefix.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DefinitionStatus {
    /// `===`, also assumed when no prefix is given.
    #[default]
    FullyDefined,
    /// `<<<`
    Primitive,
}

impl DefinitionStatus {
    /// The textual prefix for this status.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::FullyDefined => FULLY_DEFINED_PREFIX,
            Self::Primitive => PRIMITIVE_PREFIX,
        }
    }
}

/// One attribute cluster of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImportGroup {
    group_number: u32,
    relationships: Vec<Relationship>,
}

impl BatchImportGroup {
    /// Group number; 0 is the ungrouped cluster.
    #[must_use]
    pub const fn group_number(&self) -> u32 {
        self.group_number
    }

    /// Attribute relationships in parse order.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Number of attributes in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    /// True when the group holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}

/// A parsed batch import expression.
///
/// # Examples
///
/// ```
/// use authoring::batch::BatchImportExpression;
///
/// let expr = BatchImportExpression::parse(
///     "64572001 |Disease| : { 363698007 |Finding site| = 38848004 |Duodenal structure| }",
/// )
/// .unwrap();
/// assert_eq!(expr.focus_concepts().len(), 1);
/// assert_eq!(expr.relationship_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImportExpression {
    definition_status: DefinitionStatus,
    focus_concepts: Vec<ConceptId>,
    groups: Vec<BatchImportGroup>,
}

impl BatchImportExpression {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessingError`] naming the substring at fault when the
    /// expression is empty, lacks a focus concept, contains a malformed
    /// attribute, has unbalanced or nested braces, or contains an identifier
    /// that fails the checksum.
    pub fn parse(expression: &str) -> Result<Self, ProcessingError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ProcessingError::EmptyExpression);
        }

        let (definition_status, body) = split_definition_status(trimmed);
        let (focus_section, attribute_section) = match body.split_once(FOCUS_SEPARATOR) {
            Some((focus, attributes)) => (focus, Some(attributes)),
            None => (body, None),
        };

        let focus_concepts = parse_focus_concepts(focus_section, trimmed)?;
        let groups = match attribute_section {
            Some(section) => parse_attribute_section(section)?,
            None => Vec::new(),
        };

        Ok(Self {
            definition_status,
            focus_concepts,
            groups,
        })
    }

    /// Declared definition status; fully defined when no prefix is given.
    #[must_use]
    pub const fn definition_status(&self) -> DefinitionStatus {
        self.definition_status
    }

    /// Focus concepts in expression order.
    #[must_use]
    pub fn focus_concepts(&self) -> &[ConceptId] {
        &self.focus_concepts
    }

    /// Attribute groups; group 0 (if present) comes first.
    #[must_use]
    pub fn groups(&self) -> &[BatchImportGroup] {
        &self.groups
    }

    /// One `IS_A` relationship per focus concept, in group 0.
    #[must_use]
    pub fn parent_relationships(&self) -> Vec<Relationship> {
        self.focus_concepts
            .iter()
            .enumerate()
            .map(|(index, &parent)| Relationship::stated(format!("{PARENT_ID_PREFIX}{index}"), IS_A, parent, UNGROUPED))
            .collect()
    }

    /// Parent links followed by every attribute relationship.
    #[must_use]
    pub fn relationships(&self) -> Vec<Relationship> {
        let mut out = self.parent_relationships();
        out.extend(self.groups.iter().flat_map(|g| g.relationships.iter().cloned()));
        out
    }

    /// Number of attributes across all groups.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.groups.iter().map(BatchImportGroup::len).sum()
    }

    /// Parent links plus attributes.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.focus_concepts.len() + self.attribute_count()
    }

    /// The attribute `(type, target)` pairs of each group.
    #[must_use]
    pub fn attribute_groups(&self) -> AttributeGroups {
        let mut out = AttributeGroups::new();
        for group in &self.groups {
            let set = out.entry(group.group_number).or_default();
            set.extend(group.relationships.iter().map(|r| (r.type_id(), r.target_id())));
        }
        out
    }
}

/// Rebuilds attribute groups from a flat relationship list, skipping the
/// parent links generated from focus concepts.
#[must_use]
pub fn attribute_groups_from_relationships(relationships: &[Relationship]) -> AttributeGroups {
    let mut out = AttributeGroups::new();
    for rel in relationships {
        if rel.is_parent() {
            continue;
        }
        out.entry(rel.group_id())
            .or_default()
            .insert((rel.type_id(), rel.target_id()));
    }
    out
}

impl fmt::Display for BatchImportExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.definition_status.prefix())?;
        for (i, focus) in self.focus_concepts.iter().enumerate() {
            if i > 0 {
                write!(f, " {FOCUS_CONCEPT_SEPARATOR} ")?;
            }
            write!(f, "{focus}")?;
        }
        if self.groups.is_empty() {
            return Ok(());
        }

        write!(f, " {FOCUS_SEPARATOR} ")?;
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                write!(f, "{ATTRIBUTE_SEPARATOR} ")?;
            }
            let braced = group.group_number != UNGROUPED;
            if braced {
                write!(f, "{GROUP_OPEN} ")?;
            }
            for (j, rel) in group.relationships.iter().enumerate() {
                if j > 0 {
                    write!(f, "{ATTRIBUTE_SEPARATOR} ")?;
                }
                write!(f, "{} {TYPE_SEPARATOR} {}", rel.type_id(), rel.target_id())?;
            }
            if braced {
                write!(f, " {GROUP_CLOSE}")?;
            }
        }
        Ok(())
    }
}

fn split_definition_status(expression: &str) -> (DefinitionStatus, &str) {
    if let Some(rest) = expression.strip_prefix(FULLY_DEFINED_PREFIX) {
        (DefinitionStatus::FullyDefined, rest)
    } else if let Some(rest) = expression.strip_prefix(PRIMITIVE_PREFIX) {
        (DefinitionStatus::Primitive, rest)
    } else {
        (DefinitionStatus::default(), expression)
    }
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*([^|\s]*)\s*(?:\|.*)?$").expect("identifier regex is valid")
    })
}

/// Strips whitespace and any `|term|` annotation, leaving the identifier.
fn identifier_token(raw: &str) -> &str {
    identifier_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| raw.trim(), |m| m.as_str())
}

fn parse_identifier(raw: &str) -> Result<ConceptId, String> {
    let token = identifier_token(raw);
    ConceptId::parse(token).ok_or_else(|| token.to_string())
}

fn parse_focus_concepts(section: &str, expression: &str) -> Result<Vec<ConceptId>, ProcessingError> {
    if section.trim().is_empty() {
        return Err(ProcessingError::MissingFocusConcept {
            expression: expression.to_string(),
        });
    }

    section
        .split(FOCUS_CONCEPT_SEPARATOR)
        .map(|token| parse_identifier(token).map_err(|token| ProcessingError::InvalidFocusConcept { token }))
        .collect()
}

fn parse_attribute_section(section: &str) -> Result<Vec<BatchImportGroup>, ProcessingError> {
    let mut ungrouped = String::new();
    let mut braced: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for ch in section.chars() {
        match ch {
            GROUP_OPEN => {
                if current.is_some() {
                    return Err(ProcessingError::NestedGroup {
                        section: section.trim().to_string(),
                    });
                }
                current = Some(String::new());
            }
            GROUP_CLOSE => match current.take() {
                Some(group) => braced.push(group),
                None => {
                    return Err(ProcessingError::UnbalancedBraces {
                        section: section.trim().to_string(),
                    })
                }
            },
            c => match current.as_mut() {
                Some(group) => group.push(c),
                None => ungrouped.push(c),
            },
        }
    }

    if current.is_some() {
        return Err(ProcessingError::UnbalancedBraces {
            section: section.trim().to_string(),
        });
    }

    let mut groups = Vec::with_capacity(braced.len() + 1);

    let group_zero = parse_group(UNGROUPED, &ungrouped)?;
    if !group_zero.is_empty() {
        groups.push(group_zero);
    } else if braced.is_empty() {
        return Err(ProcessingError::EmptyGroup {
            group_number: UNGROUPED,
        });
    }

    for (text, group_number) in braced.iter().zip(1u32..) {
        let group = parse_group(group_number, text)?;
        if group.is_empty() {
            return Err(ProcessingError::EmptyGroup { group_number });
        }
        groups.push(group);
    }

    Ok(groups)
}

fn parse_group(group_number: u32, text: &str) -> Result<BatchImportGroup, ProcessingError> {
    let relationships = text
        .split(ATTRIBUTE_SEPARATOR)
        .map(str::trim)
        .filter(|attribute| !attribute.is_empty())
        .enumerate()
        .map(|(index, attribute)| parse_attribute(group_number, index, attribute))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BatchImportGroup {
        group_number,
        relationships,
    })
}

fn parse_attribute(group_number: u32, index: usize, attribute: &str) -> Result<Relationship, ProcessingError> {
    let parts: Vec<&str> = attribute.split(TYPE_SEPARATOR).collect();
    let [type_part, value_part] = parts.as_slice() else {
        return Err(ProcessingError::MalformedAttribute {
            attribute: attribute.to_string(),
        });
    };

    let type_id = parse_identifier(type_part).map_err(|value| ProcessingError::InvalidAttribute {
        side: AttributeSide::Type,
        value,
        attribute: attribute.to_string(),
    })?;
    let target_id = parse_identifier(value_part).map_err(|value| ProcessingError::InvalidAttribute {
        side: AttributeSide::Destination,
        value,
        attribute: attribute.to_string(),
    })?;

    Ok(Relationship::stated(
        format!("rel_{group_number}_{index}"),
        type_id,
        target_id,
        group_number,
    ))
}
