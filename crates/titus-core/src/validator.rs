use std::time::{SystemTime, UNIX_EPOCH};

use crate::match_type::{Groups, NamedGroups};
use crate::validation::ValidationResult;

/// An external collaborator that turns a match's captured groups into a verdict about whether
/// the secret is actually live, e.g. by probing the issuing provider's API.
///
/// Implementations may perform network I/O and should expect to be called concurrently from
/// multiple worker threads; a `RulesDatabase`-style immutable-after-construction design is the
/// expected shape.
pub trait Validator: Send + Sync {
    fn validate(&self, rule_id: &str, groups: &Groups, named_groups: &NamedGroups) -> ValidationResult;
}

/// A `Validator` that never actually validates anything. Every match comes back `undetermined`.
///
/// This exists so the orchestrator's validation-submission plumbing has something to call when
/// no real validator is configured; it is not meant to be mistaken for an honest result.
pub struct NullValidator;

impl Validator for NullValidator {
    fn validate(&self, _rule_id: &str, _groups: &Groups, _named_groups: &NamedGroups) -> ValidationResult {
        let validated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        ValidationResult::undetermined("validation not configured", validated_at)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_validator_is_always_undetermined() {
        let v = NullValidator;
        let groups = Groups::default();
        let named_groups = NamedGroups::default();
        let result = v.validate("np.aws.1", &groups, &named_groups);
        assert_eq!(result.status, crate::validation::ValidationStatus::Undetermined);
    }
}
