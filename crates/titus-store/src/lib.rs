pub mod annotation;
pub mod datastore;
pub mod merge;
pub mod provenance_row;
pub mod schema;

pub use annotation::{AnnotationTarget, MatchAnnotation};
pub use datastore::{
    BatchEntry, Datastore, FindingSummary, MatchRecord, ProvenanceRecord, RecordStats, RuleSummary,
    Transaction,
};
pub use merge::{merge, MergeStats};
pub use schema::SCHEMA_VERSION;
