//! # Authoring services core
//!
//! Domain core of a SNOMED CT authoring platform: batch import of concept
//! expressions, change monitors over branch state, and notification
//! delivery to the users working on a task.
//!
//! ## Core Concepts
//!
//! - **ConceptId**: a checksum-validated SNOMED CT identifier
//! - **BatchImportExpression**: one parsed expression, focus concepts plus grouped attributes
//! - **Relationship**: an immutable stated relationship produced by the parser
//! - **Monitor**: a single-shot change detector polled by the [`MonitorService`]
//! - **Notification**: an immutable change event handed to a delivery sink
//!
//! ## Usage
//!
//! ```rust
//! use authoring::batch::BatchImportExpression;
//!
//! let expression = BatchImportExpression::parse(
//!     "64572001 |Disease| : { 363698007 |Finding site| = 38848004 |Duodenal structure| }",
//! )?;
//! assert_eq!(expression.relationship_count(), 2);
//! # Ok::<(), authoring::ProcessingError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identifiers and parsing
pub mod batch;
pub mod checksum;
pub mod concept;

// Collaborators and monitoring
pub mod branch;
pub mod monitor;
pub mod notification;
pub mod task;

// Ambient
pub mod config;
pub mod error;
pub mod logging;
pub mod wire;

// Re-export primary types at crate root for convenience
pub use batch::{BatchImportExpression, BatchImportReport, BatchImportRow, BatchImportRun, Relationship};
pub use checksum::is_valid_checksum;
pub use concept::ConceptId;
pub use config::AuthoringConfig;
pub use error::{AuthoringError, AuthoringResult, ConfigError, MonitorError, ProcessingError, ServiceError};
pub use monitor::{Monitor, MonitorKey, MonitorScheduler, MonitorService};
pub use notification::{EntityType, Notification, NotificationSink};
pub use task::{TaskDirectory, TaskKey};
