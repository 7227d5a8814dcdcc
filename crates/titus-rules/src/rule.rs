use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use titus_digest::sha1_hexdigest;

/// A pattern-based rule as represented syntactically.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct RuleSyntax {
    /// The human-readable name of the rule
    pub name: String,

    /// A globally-unique identifier for the rule
    pub id: String,

    /// The regex pattern that the rule uses
    pub pattern: String,

    /// A human-readable description of the rule, often answering what was found and how an
    /// attacker could use it
    #[serde(default)]
    pub description: Option<String>,

    /// Example inputs that this rule is expected to match
    #[serde(default)]
    pub examples: Vec<String>,

    /// Example inputs that this rule is expected _not_ to match
    #[serde(default)]
    pub negative_examples: Vec<String>,

    /// Freeform references for the rule; usually URLs
    #[serde(default)]
    pub references: Vec<String>,

    /// A list of string categories for the rule
    #[serde(default)]
    pub categories: Vec<String>,
}

lazy_static! {
    // used to strip out vectorscan-style comments like `(?# this is a comment)`,
    // which Rust's regex crate doesn't like
    static ref RULE_COMMENTS_PATTERN: Regex = Regex::new(r"\(\?#[^)]*\)")
        .expect("comment-stripping regex should compile");
}

impl RuleSyntax {
    /// Get the pattern for this rule with any comments removed.
    pub fn uncommented_pattern(&self) -> Cow<'_, str> {
        RULE_COMMENTS_PATTERN.replace_all(&self.pattern, "")
    }

    // Some of the default rules have patterns complicated enough to need more than the
    // default regex size limit to compile.
    const REGEX_SIZE_LIMIT: usize = 16 * 1024 * 1024;

    fn build_regex(pattern: &str) -> Result<regex::bytes::Regex> {
        let pattern = regex::bytes::RegexBuilder::new(pattern)
            .unicode(false)
            .size_limit(Self::REGEX_SIZE_LIMIT)
            .build()?;
        Ok(pattern)
    }

    /// Compile this pattern into a regular expression.
    pub fn as_regex(&self) -> Result<regex::bytes::Regex> {
        Self::build_regex(&self.uncommented_pattern())
    }

    /// Compile this rule into a regex with an end-of-input anchor appended.
    /// This ensures that the second-stage regex match ends exactly where a first-stage
    /// coarse match ended.
    ///
    /// ```
    /// # use pretty_assertions::assert_eq;
    /// # use titus_rules::RuleSyntax;
    /// let r = RuleSyntax {
    ///     name: "Test rule".to_string(),
    ///     id: "test.1".to_string(),
    ///     pattern: r"hello\s*world".to_string(),
    ///     description: None,
    ///     examples: vec![],
    ///     negative_examples: vec![],
    ///     references: vec![],
    ///     categories: vec![],
    /// };
    /// assert_eq!(r.as_anchored_regex().unwrap().as_str(), r"hello\s*world\z");
    /// ```
    pub fn as_anchored_regex(&self) -> Result<regex::bytes::Regex> {
        Self::build_regex(&format!(r"{}\z", self.uncommented_pattern()))
    }

    /// Compute the content-based structural ID of this rule: a hash over its externally
    /// visible identity (`id`, `name`, `pattern`), independent of database row identity.
    pub fn structural_id(&self) -> String {
        let mut buf = Vec::with_capacity(self.id.len() + self.name.len() + self.pattern.len() + 2);
        buf.extend_from_slice(self.id.as_bytes());
        buf.push(b'|');
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(b'|');
        buf.extend_from_slice(self.pattern.as_bytes());
        sha1_hexdigest(&buf)
    }

    /// Return a JSON serialization of this rule.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("should be able to serialize rule syntax as JSON")
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    syntax: RuleSyntax,
    structural_id: String,
}

impl Rule {
    pub fn new(syntax: RuleSyntax) -> Self {
        Self {
            structural_id: syntax.structural_id(),
            syntax,
        }
    }

    /// Get the AST of this rule.
    pub fn syntax(&self) -> &RuleSyntax {
        &self.syntax
    }

    pub fn json_syntax(&self) -> String {
        self.syntax.to_json()
    }

    pub fn structural_id(&self) -> &str {
        &self.structural_id
    }

    pub fn name(&self) -> &str {
        &self.syntax.name
    }

    pub fn id(&self) -> &str {
        &self.syntax.id
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_syntax() -> RuleSyntax {
        RuleSyntax {
            name: "Test rule".to_string(),
            id: "test.1".to_string(),
            pattern: r"hello\s*world".to_string(),
            description: None,
            examples: vec![],
            negative_examples: vec![],
            references: vec![],
            categories: vec![],
        }
    }

    #[test]
    fn structural_id_is_deterministic() {
        let r1 = Rule::new(test_syntax());
        let r2 = Rule::new(test_syntax());
        assert_eq!(r1.structural_id(), r2.structural_id());
    }

    #[test]
    fn structural_id_depends_on_all_identity_fields() {
        let mut other = test_syntax();
        other.name = "Different name".to_string();
        assert_ne!(test_syntax().structural_id(), other.structural_id());

        let mut other = test_syntax();
        other.id = "test.2".to_string();
        assert_ne!(test_syntax().structural_id(), other.structural_id());
    }

    #[test]
    fn strips_vectorscan_comments() {
        let mut s = test_syntax();
        s.pattern = r"hello(?# this matches a greeting)\s*world".to_string();
        assert_eq!(s.uncommented_pattern(), r"hello\s*world");
    }
}
