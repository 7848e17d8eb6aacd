//! Batch import: expression parsing, relationship construction and runs.

/// Per-run ancestor cache.
pub mod closure;
/// Expression grammar and parser.
pub mod expression;
/// Relationship values.
pub mod relationship;
/// Row-by-row batch import runs.
pub mod run;

pub use closure::{ClosureCache, ConceptHierarchy};
pub use expression::{
    attribute_groups_from_relationships, AttributeGroups, BatchImportExpression, BatchImportGroup,
    DefinitionStatus,
};
pub use relationship::{CharacteristicType, Relationship, RelationshipModifier, UNGROUPED};
pub use run::{BatchImportConcept, BatchImportReport, BatchImportRow, BatchImportRun, RowOutcome};
