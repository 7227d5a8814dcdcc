use bstr::BString;
use bstring_serde::BStringBase64;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

use crate::blob_id::BlobId;
use crate::location::{Location, LocationMapping, OffsetSpan};
use crate::matcher::BlobMatch;
use crate::snippet::Snippet;
use crate::validation::ValidationResult;
use titus_digest::Sha1;

// -------------------------------------------------------------------------------------------------
// Group
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Group(#[serde(with = "BStringBase64")] pub BString);

impl Group {
    pub fn new(m: regex::bytes::Match<'_>) -> Self {
        Self(BString::from(m.as_bytes()))
    }
}

// -------------------------------------------------------------------------------------------------
// Groups
// -------------------------------------------------------------------------------------------------
/// Numbered capture groups, in declaration order. Index 0 (the whole match) is never included.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Groups(pub SmallVec<[Option<Group>; 1]>);

// -------------------------------------------------------------------------------------------------
// NamedGroups
// -------------------------------------------------------------------------------------------------
/// Named capture groups, keyed by name. A `BTreeMap` keeps serialization deterministic.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NamedGroups(pub BTreeMap<String, Group>);

// -------------------------------------------------------------------------------------------------
// sql
// -------------------------------------------------------------------------------------------------
mod sql {
    use super::*;

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
    use rusqlite::Error::ToSqlConversionFailure;

    impl ToSql for Groups {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            match serde_json::to_string(self) {
                Err(e) => Err(ToSqlConversionFailure(e.into())),
                Ok(s) => Ok(s.into()),
            }
        }
    }

    impl FromSql for Groups {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value {
                ValueRef::Text(s) => {
                    serde_json::from_slice(s).map_err(|e| FromSqlError::Other(e.into()))
                }
                ValueRef::Blob(b) => {
                    serde_json::from_slice(b).map_err(|e| FromSqlError::Other(e.into()))
                }
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Match
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Match {
    /// The blob this match comes from
    pub blob_id: BlobId,

    /// The location of the entire matching content
    pub location: Location,

    /// Numbered capture groups
    pub groups: Groups,

    /// Named capture groups
    pub named_groups: NamedGroups,

    /// A snippet of the match and surrounding context
    pub snippet: Snippet,

    /// The location-based unique identifier of this match
    pub structural_id: String,

    /// The rule that produced this match
    pub rule_structural_id: String,

    /// The text identifier of the rule that produced this match
    pub rule_text_id: String,

    /// The name of the rule that produced this match
    pub rule_name: String,

    /// An optional out-of-band validation outcome
    pub validation_result: Option<ValidationResult>,
}

impl Match {
    #[inline]
    pub fn convert<'a>(
        loc_mapping: &'a LocationMapping,
        blob_match: &'a BlobMatch<'a>,
        context_lines: usize,
    ) -> Self {
        let offset_span = blob_match.matching_input_offset_span;
        let source_span = loc_mapping.get_source_span(&offset_span);

        debug_assert!(
            blob_match.captures.len() >= 1,
            "blob {}: no captures for rule {}",
            blob_match.blob_id,
            blob_match.rule.id()
        );

        let groups: SmallVec<[Option<Group>; 1]> = blob_match
            .captures
            .iter()
            .enumerate()
            .skip(1)
            .map(|(group_index, group)| match group {
                Some(group) => Some(Group::new(group)),
                None => {
                    debug!(
                        "blob {}: empty capture group at index {group_index}: {} {}",
                        blob_match.blob_id,
                        blob_match.rule.id(),
                        blob_match.rule.name()
                    );
                    None
                }
            })
            .collect();

        let mut named_groups = BTreeMap::new();
        for name in blob_match.regex.capture_names().flatten() {
            if let Some(m) = blob_match.captures.name(name) {
                named_groups.insert(name.to_owned(), Group::new(m));
            }
        }

        let rule_structural_id = blob_match.rule.structural_id().to_owned();
        let structural_id =
            Self::compute_structural_id(&rule_structural_id, &blob_match.blob_id, offset_span);

        let snippet = Snippet::extract(blob_match.content, offset_span, context_lines);

        Match {
            blob_id: blob_match.blob_id,
            rule_structural_id,
            rule_name: blob_match.rule.name().to_owned(),
            rule_text_id: blob_match.rule.id().to_owned(),
            snippet,
            location: Location {
                offset_span,
                source_span,
            },
            groups: Groups(groups),
            named_groups: NamedGroups(named_groups),
            structural_id,
            validation_result: None,
        }
    }

    /// Returns a location-based unique identifier of the match: a hash over the rule's
    /// structural ID, the blob ID, and the match's byte offsets.
    fn compute_structural_id(
        rule_structural_id: &str,
        blob_id: &BlobId,
        span: OffsetSpan,
    ) -> String {
        let mut h = Sha1::new();
        write!(
            &mut h,
            "{}\0{}\0{}\0{}",
            rule_structural_id,
            blob_id.hex(),
            span.start,
            span.end,
        )
        .expect("should be able to compute structural id");

        h.hexdigest()
    }
}

/// The content-based identifier of a finding: a hash over a rule's structural ID and a match's
/// capture groups. Two matches under the same rule with the same captured groups — anywhere in
/// any blob — produce the same finding id. This is deliberately a distinct function from
/// `Match::compute_structural_id`, which is location-based.
pub fn finding_id(rule_structural_id: &str, groups: &Groups) -> String {
    let mut h = Sha1::new();
    write!(&mut h, "{}\0", rule_structural_id).expect("should be able to write to memory");
    serde_json::to_writer(&mut h, groups).expect("should be able to serialize groups as JSON");
    h.hexdigest()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finding_id_is_content_based() {
        let g1 = Groups(smallvec::smallvec![Some(Group(BString::from("secret")))]);
        let g2 = Groups(smallvec::smallvec![Some(Group(BString::from("secret")))]);
        assert_eq!(finding_id("rule-x", &g1), finding_id("rule-x", &g2));
    }

    #[test]
    fn finding_id_depends_on_rule_and_groups() {
        let g = Groups(smallvec::smallvec![Some(Group(BString::from("secret")))]);
        assert_ne!(finding_id("rule-x", &g), finding_id("rule-y", &g));
    }

    #[test]
    fn structural_id_depends_on_offsets() {
        let id1 = Match::compute_structural_id("r", &BlobId::new(b"x"), OffsetSpan { start: 0, end: 1 });
        let id2 = Match::compute_structural_id("r", &BlobId::new(b"x"), OffsetSpan { start: 1, end: 2 });
        assert_ne!(id1, id2);
    }
}
