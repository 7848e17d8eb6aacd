//! Batch import runs.
//!
//! A run processes a sequence of rows, each carrying one expression. Rows are
//! independent: a malformed expression fails its own row and the run moves
//! on. Each run owns a fresh [`ClosureCache`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::concept::{ConceptId, CONCEPT_MODEL_ATTRIBUTE};
use crate::config::BatchImportConfig;
use crate::error::{AuthoringError, AuthoringResult, ConfigError, ProcessingError};

use super::closure::{ClosureCache, ConceptHierarchy};
use super::expression::BatchImportExpression;
use super::relationship::Relationship;

/// One input row.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImportRow {
    pub row_number: usize,
    /// Identifier of the concept being created; generated when absent.
    pub source_id: Option<String>,
    pub expression: String,
}

impl BatchImportRow {
    /// Creates a row with no source id.
    #[must_use]
    pub fn new(row_number: usize, expression: impl Into<String>) -> Self {
        Self {
            row_number,
            source_id: None,
            expression: expression.into(),
        }
    }

    /// Sets the source concept id.
    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    fn effective_source_id(&self) -> String {
        self.source_id
            .clone()
            .unwrap_or_else(|| format!("tmp_{}", self.row_number))
    }
}

/// A successfully processed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImportConcept {
    row_number: usize,
    source_id: String,
    expression: BatchImportExpression,
    relationships: Vec<Relationship>,
}

impl BatchImportConcept {
    /// Input row number.
    #[must_use]
    pub const fn row_number(&self) -> usize {
        self.row_number
    }

    /// Source concept id, generated when the row had none.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The parsed expression.
    #[must_use]
    pub const fn expression(&self) -> &BatchImportExpression {
        &self.expression
    }

    /// Relationships stamped with this concept's source id.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }
}

/// Result of one row.
#[allow(missing_docs)]
#[derive(Debug)]
pub enum RowOutcome {
    Loaded(BatchImportConcept),
    Failed {
        row_number: usize,
        source_id: String,
        error: AuthoringError,
    },
}

impl RowOutcome {
    /// Input row number.
    #[must_use]
    pub const fn row_number(&self) -> usize {
        match self {
            Self::Loaded(concept) => concept.row_number,
            Self::Failed { row_number, .. } => *row_number,
        }
    }

    /// True when the row loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Outcome of a whole run.
#[allow(missing_docs)]
#[derive(Debug)]
pub struct BatchImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcomes: Vec<RowOutcome>,
}

impl BatchImportReport {
    /// Rows that loaded.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_loaded()).count()
    }

    /// Rows that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.loaded_count()
    }

    /// Relationships across all loaded rows.
    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                RowOutcome::Loaded(concept) => concept.relationships.len(),
                RowOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    /// Loaded concepts in row order.
    pub fn loaded(&self) -> impl Iterator<Item = &BatchImportConcept> {
        self.outcomes.iter().filter_map(|o| match o {
            RowOutcome::Loaded(concept) => Some(concept),
            RowOutcome::Failed { .. } => None,
        })
    }

    /// `(row_number, error)` of every failed row.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &AuthoringError)> {
        self.outcomes.iter().filter_map(|o| match o {
            RowOutcome::Failed { row_number, error, .. } => Some((*row_number, error)),
            RowOutcome::Loaded(_) => None,
        })
    }
}

/// A single batch import run.
pub struct BatchImportRun {
    id: Uuid,
    config: BatchImportConfig,
    closure: ClosureCache,
    hierarchy: Option<Arc<dyn ConceptHierarchy>>,
}

impl BatchImportRun {
    /// Creates a run with no concept hierarchy attached.
    #[must_use]
    pub fn new(config: BatchImportConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            closure: ClosureCache::new(),
            hierarchy: None,
        }
    }

    /// Attaches the hierarchy used for attribute type validation.
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: Arc<dyn ConceptHierarchy>) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Run identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The closure cache owned by this run.
    #[must_use]
    pub const fn closure(&self) -> &ClosureCache {
        &self.closure
    }

    /// Processes one row.
    ///
    /// # Errors
    ///
    /// Returns a processing error for malformed or out-of-model
    /// expressions, a service error when the hierarchy lookup fails, and a
    /// config error when hierarchy validation is enabled without a hierarchy.
    pub fn process_row(&self, row: &BatchImportRow) -> AuthoringResult<BatchImportConcept> {
        let actual = row.expression.len();
        if actual > self.config.max_expression_len {
            return Err(ProcessingError::ExpressionTooLong {
                max_length: self.config.max_expression_len,
                actual,
            }
            .into());
        }

        let expression = BatchImportExpression::parse(&row.expression)?;

        if self.config.validate_attribute_hierarchy {
            self.check_attribute_types(&expression)?;
        }

        let source_id = row.effective_source_id();
        let relationships = expression
            .relationships()
            .iter()
            .map(|r| r.with_source_id(source_id.as_str()))
            .collect();

        Ok(BatchImportConcept {
            row_number: row.row_number,
            source_id,
            expression,
            relationships,
        })
    }

    fn check_attribute_types(&self, expression: &BatchImportExpression) -> AuthoringResult<()> {
        let Some(hierarchy) = self.hierarchy.as_deref() else {
            return Err(ConfigError::Invalid {
                field: "batch_import.validate_attribute_hierarchy".to_string(),
                reason: "no concept hierarchy attached to the run".to_string(),
            }
            .into());
        };

        let types: BTreeSet<ConceptId> = expression
            .groups()
            .iter()
            .flat_map(|g| g.relationships().iter().map(Relationship::type_id))
            .collect();

        for type_id in types {
            if !self
                .closure
                .is_descendant_or_self(type_id, CONCEPT_MODEL_ATTRIBUTE, hierarchy)?
            {
                return Err(ProcessingError::AttributeTypeOutsideModel {
                    type_id: type_id.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Processes every row; failures are recorded per row.
    pub fn process<I>(&self, rows: I) -> BatchImportReport
    where
        I: IntoIterator<Item = BatchImportRow>,
    {
        let started_at = Utc::now();
        let mut outcomes = Vec::new();

        for row in rows {
            match self.process_row(&row) {
                Ok(concept) => outcomes.push(RowOutcome::Loaded(concept)),
                Err(error) => {
                    warn!(run_id = %self.id, row = row.row_number, error = %error, "batch import row failed");
                    outcomes.push(RowOutcome::Failed {
                        row_number: row.row_number,
                        source_id: row.effective_source_id(),
                        error,
                    });
                }
            }
        }

        let report = BatchImportReport {
            run_id: self.id,
            started_at,
            completed_at: Utc::now(),
            outcomes,
        };
        info!(
            run_id = %self.id,
            loaded = report.loaded_count(),
            failed = report.failed_count(),
            cache_misses = self.closure.misses(),
            "batch import run complete"
        );
        report
    }
}

impl std::fmt::Debug for BatchImportRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchImportRun")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("cached_concepts", &self.closure.len())
            .field("has_hierarchy", &self.hierarchy.is_some())
            .finish()
    }
}
