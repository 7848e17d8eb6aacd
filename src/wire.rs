//! External wire shapes.
//!
//! Domain values never derive `Serialize`; these views do, and are built
//! from them through explicit `From`/`TryFrom` conversions. Field names
//! follow the browser API (camelCase, concept ids as strings).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::{BatchImportReport, CharacteristicType, Relationship, RelationshipModifier, RowOutcome};
use crate::concept::ConceptId;
use crate::error::{AttributeSide, ProcessingError};
use crate::notification::Notification;

/// Reference to a concept by id.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMini {
    pub concept_id: String,
}

impl From<ConceptId> for ConceptMini {
    fn from(id: ConceptId) -> Self {
        Self {
            concept_id: id.to_string(),
        }
    }
}

/// A relationship as the browser API exchanges it.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserRelationship {
    pub relationship_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(rename = "type")]
    pub type_concept: ConceptMini,
    pub target: ConceptMini,
    pub group_id: u32,
    pub characteristic_type: String,
    pub modifier: String,
    pub active: bool,
}

impl From<&Relationship> for BrowserRelationship {
    fn from(r: &Relationship) -> Self {
        Self {
            relationship_id: r.relationship_id().to_string(),
            source_id: r.source_id().map(str::to_string),
            type_concept: r.type_id().into(),
            target: r.target_id().into(),
            group_id: r.group_id(),
            characteristic_type: r.characteristic_type().as_token().to_string(),
            modifier: r.modifier().as_token().to_string(),
            active: r.is_active(),
        }
    }
}

impl TryFrom<BrowserRelationship> for Relationship {
    type Error = ProcessingError;

    fn try_from(view: BrowserRelationship) -> Result<Self, Self::Error> {
        let attribute = view.relationship_id.clone();
        let concept = |side: AttributeSide, value: &str| {
            ConceptId::parse(value).ok_or_else(|| ProcessingError::InvalidAttribute {
                side,
                value: value.to_string(),
                attribute: attribute.clone(),
            })
        };
        let type_id = concept(AttributeSide::Type, &view.type_concept.concept_id)?;
        let target_id = concept(AttributeSide::Destination, &view.target.concept_id)?;

        let characteristic_type = CharacteristicType::from_token(&view.characteristic_type).ok_or_else(|| {
            ProcessingError::MalformedAttribute {
                attribute: format!("{attribute}: characteristicType {}", view.characteristic_type),
            }
        })?;
        let modifier = RelationshipModifier::from_token(&view.modifier).ok_or_else(|| {
            ProcessingError::MalformedAttribute {
                attribute: format!("{attribute}: modifier {}", view.modifier),
            }
        })?;

        Ok(Self::new(
            view.relationship_id,
            view.source_id,
            type_id,
            target_id,
            view.group_id,
            characteristic_type,
            modifier,
            view.active,
        ))
    }
}

/// Notification as pushed to clients.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub id: Uuid,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub entity_type: String,
    pub event: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Notification> for NotificationMessage {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id(),
            project: n.project().to_string(),
            task: n.task().map(str::to_string),
            entity_type: n.entity_type().as_str().to_string(),
            event: n.event().to_string(),
            timestamp: n.timestamp(),
        }
    }
}

/// Row status in a report.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Loaded,
    Failed,
}

/// One row of a batch import report.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportRowView {
    pub row_number: usize,
    pub source_id: String,
    pub status: RowStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<BrowserRelationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl From<&RowOutcome> for BatchImportRowView {
    fn from(outcome: &RowOutcome) -> Self {
        match outcome {
            RowOutcome::Loaded(concept) => Self {
                row_number: concept.row_number(),
                source_id: concept.source_id().to_string(),
                status: RowStatus::Loaded,
                relationships: concept.relationships().iter().map(BrowserRelationship::from).collect(),
                error: None,
                status_code: None,
            },
            RowOutcome::Failed {
                row_number,
                source_id,
                error,
            } => Self {
                row_number: *row_number,
                source_id: source_id.clone(),
                status: RowStatus::Failed,
                relationships: Vec::new(),
                error: Some(error.to_string()),
                status_code: Some(error.status_code()),
            },
        }
    }
}

/// Summary of a batch import run.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportReportView {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub loaded: usize,
    pub failed: usize,
    pub relationship_count: usize,
    pub rows: Vec<BatchImportRowView>,
}

impl From<&BatchImportReport> for BatchImportReportView {
    fn from(report: &BatchImportReport) -> Self {
        Self {
            run_id: report.run_id,
            started_at: report.started_at,
            completed_at: report.completed_at,
            loaded: report.loaded_count(),
            failed: report.failed_count(),
            relationship_count: report.relationship_count(),
            rows: report.outcomes.iter().map(BatchImportRowView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::batch::{BatchImportRow, BatchImportRun};
    use crate::config::BatchImportConfig;
    use crate::notification::EntityType;
    use crate::task::TaskKey;

    fn id(s: &str) -> ConceptId {
        ConceptId::parse(s).unwrap()
    }

    #[test]
    fn relationship_serialises_in_browser_shape() {
        let rel = Relationship::stated("rel_1_0", id("363698007"), id("38848004"), 1).with_source_id("tmp_1");
        let value = serde_json::to_value(BrowserRelationship::from(&rel)).unwrap();
        assert_eq!(
            value,
            json!({
                "relationshipId": "rel_1_0",
                "sourceId": "tmp_1",
                "type": { "conceptId": "363698007" },
                "target": { "conceptId": "38848004" },
                "groupId": 1,
                "characteristicType": "STATED_RELATIONSHIP",
                "modifier": "EXISTENTIAL",
                "active": true
            })
        );
    }

    #[test]
    fn relationship_view_converts_back() {
        let rel = Relationship::stated("isa_0", id("116680003"), id("64572001"), 0);
        let back = Relationship::try_from(BrowserRelationship::from(&rel)).unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn invalid_target_is_rejected() {
        let mut view = BrowserRelationship::from(&Relationship::stated("r", id("363698007"), id("38848004"), 0));
        view.target.concept_id = "38848005".to_string();
        let err = Relationship::try_from(view).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InvalidAttribute {
                side: AttributeSide::Destination,
                ..
            }
        ));
    }

    #[test]
    fn unknown_modifier_is_rejected() {
        let mut view = BrowserRelationship::from(&Relationship::stated("r", id("363698007"), id("38848004"), 0));
        view.modifier = "SOMETIMES".to_string();
        assert!(matches!(
            Relationship::try_from(view),
            Err(ProcessingError::MalformedAttribute { .. })
        ));
    }

    #[test]
    fn notification_message_shape() {
        let n = Notification::for_task(&TaskKey::new("PROJ", "PROJ-1"), EntityType::BranchState, "BEHIND");
        let value = serde_json::to_value(NotificationMessage::from(&n)).unwrap();
        assert_eq!(value["project"], "PROJ");
        assert_eq!(value["task"], "PROJ-1");
        assert_eq!(value["entityType"], "BranchState");
        assert_eq!(value["event"], "BEHIND");

        let project_only = Notification::for_project("PROJ", EntityType::Promotion, "done");
        let value = serde_json::to_value(NotificationMessage::from(&project_only)).unwrap();
        assert!(value.get("task").is_none());
    }

    #[test]
    fn report_view_counts_and_statuses() {
        let run = BatchImportRun::new(BatchImportConfig::default());
        let report = run.process(vec![
            BatchImportRow::new(1, "64572001 : 363698007=38848004").with_source_id("A"),
            BatchImportRow::new(2, "64572001 : 363698007"),
        ]);
        let view = BatchImportReportView::from(&report);
        assert_eq!(view.loaded, 1);
        assert_eq!(view.failed, 1);
        assert_eq!(view.relationship_count, 2);
        assert_eq!(view.rows[0].status, RowStatus::Loaded);
        assert_eq!(view.rows[0].relationships[1].source_id.as_deref(), Some("A"));
        assert_eq!(view.rows[1].status, RowStatus::Failed);
        assert_eq!(view.rows[1].source_id, "tmp_2");
        assert_eq!(view.rows[1].status_code, Some(400));

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["rows"][1]["status"], "FAILED");
        assert!(value["rows"][1].get("relationships").is_none());
    }
}
