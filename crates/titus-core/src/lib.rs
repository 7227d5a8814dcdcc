pub mod blob;
pub mod blob_id;
pub mod blob_id_map;
pub mod blob_id_set;
pub mod bstring_escape;
pub mod defaults;
pub mod location;
pub mod match_type;
pub mod matcher;
pub mod matcher_stats;
pub mod provenance;
pub mod provenance_set;
pub mod rules_database;
pub mod snippet;
pub mod validation;
pub mod validator;

pub use blob::{Blob, BlobId};
pub use location::{Location, LocationMapping, OffsetPoint, OffsetSpan, SourcePoint, SourceSpan};
pub use match_type::{finding_id, Group, Groups, Match, NamedGroups};
pub use matcher::{BlobMatch, Matcher};
pub use matcher_stats::MatcherStats;
pub use provenance::Provenance;
pub use provenance_set::ProvenanceSet;
pub use rules_database::RulesDatabase;
pub use snippet::{Snippet, DEFAULT_CONTEXT_LINES};
pub use validation::{ValidationResult, ValidationStatus};
pub use validator::{NullValidator, Validator};
