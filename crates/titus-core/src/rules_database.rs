use anyhow::{bail, Context, Result};
use tracing::debug_span;

use titus_rules::Rule;

/// A single rule together with the regex compiled from its pattern.
pub struct CompiledRule {
    pub rule: Rule,
    pub regex: regex::bytes::Regex,
}

/// A compiled collection of rules, ready to be driven by a `Matcher`.
///
/// Unlike the reference implementation's two-stage design (a coarse multi-pattern engine
/// followed by per-rule regex confirmation), this compiles each rule directly into a `regex`
/// automaton and matches it against the whole buffer. This keeps the matcher single-engine while
/// still meeting the same contract: every non-overlapping match of every rule, with captures.
pub struct RulesDatabase {
    compiled: Vec<CompiledRule>,
}

impl RulesDatabase {
    /// Create a new `RulesDatabase` from the given collection of rules.
    ///
    /// Any pattern that fails to compile fails the whole construction: the scan must refuse to
    /// run on a partially valid rule set.
    pub fn from_rules(rules: Vec<Rule>) -> Result<Self> {
        let _span = debug_span!("RulesDatabase::from_rules").entered();

        if rules.is_empty() {
            bail!("No rules to compile");
        }

        let compiled = rules
            .into_iter()
            .map(|rule| {
                let regex = rule
                    .syntax()
                    .as_regex()
                    .with_context(|| format!("Failed to compile rule {}", rule.id()))?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<Result<Vec<CompiledRule>>>()?;

        Ok(RulesDatabase { compiled })
    }

    #[inline]
    pub fn num_rules(&self) -> usize {
        self.compiled.len()
    }

    #[inline]
    pub fn get_rule(&self, index: usize) -> Option<&Rule> {
        self.compiled.get(index).map(|c| &c.rule)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.compiled.iter().map(|c| &c.rule)
    }

    pub(crate) fn compiled(&self) -> &[CompiledRule] {
        &self.compiled
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use titus_rules::RuleSyntax;

    fn aws_rule() -> Rule {
        Rule::new(RuleSyntax {
            name: "AWS Access Key ID".to_string(),
            id: "np.aws.1".to_string(),
            pattern: r"AKIA[A-Z0-9]{16}".to_string(),
            description: None,
            examples: vec![],
            negative_examples: vec![],
            references: vec![],
            categories: vec![],
        })
    }

    #[test]
    fn compiles_valid_rules() {
        let db = RulesDatabase::from_rules(vec![aws_rule()]).unwrap();
        assert_eq!(db.num_rules(), 1);
    }

    #[test]
    fn rejects_empty_rule_set() {
        assert!(RulesDatabase::from_rules(vec![]).is_err());
    }

    #[test]
    fn rejects_invalid_pattern() {
        let bad = Rule::new(RuleSyntax {
            name: "bad".to_string(),
            id: "bad.1".to_string(),
            pattern: r"(unclosed".to_string(),
            description: None,
            examples: vec![],
            negative_examples: vec![],
            references: vec![],
            categories: vec![],
        });
        assert!(RulesDatabase::from_rules(vec![bad]).is_err());
    }
}
