use std::collections::HashMap;
use std::sync::Arc;

use authoring::batch::{BatchImportExpression, BatchImportRow, BatchImportRun, ConceptHierarchy, RowOutcome};
use authoring::concept::{CONCEPT_MODEL_ATTRIBUTE, IS_A, ROOT};
use authoring::config::{AuthoringConfig, BatchImportConfig};
use authoring::error::ServiceError;
use authoring::wire::{BatchImportReportView, BrowserRelationship};
use authoring::{is_valid_checksum, ConceptId, ProcessingError, Relationship};

fn id(s: &str) -> ConceptId {
    ConceptId::parse(s).unwrap()
}

/// Finding site, associated morphology and occurrence are model attributes;
/// everything else hangs directly under the root.
struct FakeHierarchy {
    ancestors: HashMap<ConceptId, Vec<ConceptId>>,
}

impl FakeHierarchy {
    fn new() -> Self {
        let attribute = vec![CONCEPT_MODEL_ATTRIBUTE, ROOT];
        let ancestors = ["363698007", "116676008", "246454002"]
            .into_iter()
            .map(|s| (id(s), attribute.clone()))
            .collect();
        Self { ancestors }
    }
}

impl ConceptHierarchy for FakeHierarchy {
    fn ancestors(&self, concept: ConceptId) -> Result<Vec<ConceptId>, ServiceError> {
        Ok(self.ancestors.get(&concept).cloned().unwrap_or_else(|| vec![ROOT]))
    }
}

struct DownHierarchy;

impl ConceptHierarchy for DownHierarchy {
    fn ancestors(&self, _concept: ConceptId) -> Result<Vec<ConceptId>, ServiceError> {
        Err(ServiceError::unavailable("terminology server unreachable"))
    }
}

const DUODENAL_AVM: &str = "=== 64572001 | Disease |: { 363698007 | Finding site | = 38848004 | Duodenal structure , 116676008 | Associated morphology | = 24551003 | Arteriovenous malformation , 246454002 | Occurrence | = 255399007 | Congenital} ";

#[test]
fn rows_fail_independently() {
    let run = BatchImportRun::new(BatchImportConfig::default());
    let report = run.process(vec![
        BatchImportRow::new(1, DUODENAL_AVM).with_source_id("C1"),
        BatchImportRow::new(2, "64572001 : 363698007 38848004"),
        BatchImportRow::new(3, "64572001 : 363698007 = 38848005"),
        BatchImportRow::new(4, "404684003 + 64572001 : 363698007 = 38848004, { 116676008 = 24551003 }"),
    ]);

    assert_eq!(report.loaded_count(), 2);
    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.relationship_count(), 4 + 4);

    let failures: Vec<usize> = report.failures().map(|(row, _)| row).collect();
    assert_eq!(failures, vec![2, 3]);

    let RowOutcome::Failed { error, source_id, .. } = &report.outcomes[1] else {
        panic!("row 2 should fail");
    };
    assert_eq!(source_id, "tmp_2");
    assert!(error.is_processing());
    assert!(error.to_string().contains("363698007 38848004"));

    let loaded: Vec<&str> = report.loaded().map(|c| c.source_id()).collect();
    assert_eq!(loaded, vec!["C1", "tmp_4"]);
    for concept in report.loaded() {
        assert!(concept
            .relationships()
            .iter()
            .all(|r| r.source_id() == Some(concept.source_id())));
    }
}

#[test]
fn relationship_count_matches_structure() {
    let cases = [
        ("64572001", 1),
        ("64572001 : 363698007 = 38848004", 2),
        ("64572001 + 404684003 : 363698007 = 38848004", 3),
        (DUODENAL_AVM, 4),
        (
            "64572001 : 246454002 = 255399007, { 363698007 = 38848004, 116676008 = 24551003 }, { 363698007 = 38848004 }",
            5,
        ),
    ];

    for (text, expected) in cases {
        let expr = BatchImportExpression::parse(text).unwrap();
        assert_eq!(expr.relationships().len(), expected, "{text}");
        assert_eq!(expr.relationship_count(), expected, "{text}");
        assert_eq!(
            expr.relationships().iter().filter(|r| r.type_id() == IS_A).count(),
            expr.focus_concepts().len()
        );
    }
}

#[test]
fn every_parsed_identifier_passes_checksum() {
    let expr = BatchImportExpression::parse(DUODENAL_AVM).unwrap();
    for rel in expr.relationships() {
        assert!(is_valid_checksum(&rel.type_id().to_string()));
        assert!(is_valid_checksum(&rel.target_id().to_string()));
    }
}

#[test]
fn reparsing_display_is_stable() {
    let expr = BatchImportExpression::parse(DUODENAL_AVM).unwrap();
    let again = BatchImportExpression::parse(&expr.to_string()).unwrap();
    assert_eq!(again.attribute_groups(), expr.attribute_groups());
    assert_eq!(again.focus_concepts(), expr.focus_concepts());
}

#[test]
fn hierarchy_validation_uses_run_cache() {
    let config = AuthoringConfig::from_toml_str(
        r#"
        [batch_import]
        validate_attribute_hierarchy = true
        "#,
    )
    .unwrap();
    let run = BatchImportRun::new(config.batch_import).with_hierarchy(Arc::new(FakeHierarchy::new()));

    let report = run.process(vec![
        BatchImportRow::new(1, DUODENAL_AVM),
        BatchImportRow::new(2, DUODENAL_AVM),
        BatchImportRow::new(3, "64572001 : 24551003 = 38848004"),
    ]);

    assert_eq!(report.loaded_count(), 2);
    let (row, error) = report.failures().next().unwrap();
    assert_eq!(row, 3);
    assert!(error.to_string().contains("24551003"));

    // Three distinct attribute types plus the bad one, each fetched once.
    assert_eq!(run.closure().misses(), 4);
    assert_eq!(run.closure().len(), 4);
}

#[test]
fn hierarchy_outage_fails_rows_with_service_error() {
    let config = BatchImportConfig {
        validate_attribute_hierarchy: true,
        ..BatchImportConfig::default()
    };
    let run = BatchImportRun::new(config).with_hierarchy(Arc::new(DownHierarchy));

    let err = run.process_row(&BatchImportRow::new(1, DUODENAL_AVM)).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.status_code(), 503);
    assert!(run.closure().is_empty());
}

#[test]
fn overlong_expression_is_rejected_before_parsing() {
    let config = BatchImportConfig {
        max_expression_len: 16,
        ..BatchImportConfig::default()
    };
    let run = BatchImportRun::new(config);
    let err = run.process_row(&BatchImportRow::new(1, DUODENAL_AVM)).unwrap_err();
    assert!(matches!(
        err,
        authoring::AuthoringError::Processing(ProcessingError::ExpressionTooLong { max_length: 16, .. })
    ));
}

#[test]
fn report_view_round_trips_through_json() {
    let run = BatchImportRun::new(BatchImportConfig::default());
    let report = run.process(vec![
        BatchImportRow::new(1, DUODENAL_AVM).with_source_id("C1"),
        BatchImportRow::new(2, "not an expression"),
    ]);
    let view = BatchImportReportView::from(&report);

    let json = serde_json::to_string_pretty(&view).unwrap();
    let back: BatchImportReportView = serde_json::from_str(&json).unwrap();
    assert_eq!(back, view);

    let rebuilt: Vec<Relationship> = back.rows[0]
        .relationships
        .iter()
        .cloned()
        .map(Relationship::try_from)
        .collect::<Result<_, _>>()
        .unwrap();
    let original: Vec<BrowserRelationship> = report
        .loaded()
        .next()
        .unwrap()
        .relationships()
        .iter()
        .map(BrowserRelationship::from)
        .collect();
    assert_eq!(back.rows[0].relationships, original);
    assert_eq!(rebuilt.len(), original.len());
    assert_eq!(rebuilt[0].source_id(), Some("C1"));
    assert_eq!(rebuilt[0].type_id(), IS_A);
    assert_eq!(rebuilt[0].target_id(), id("64572001"));
}
