use anyhow::Result;
use std::path::PathBuf;

use titus_rules::Rules;

use crate::args::RuleSpecifierArgs;

/// Loads a combined rule set from the builtin rules and/or additional rule files/directories.
pub struct RuleLoader {
    load_builtin_rules: bool,
    additional_rule_paths: Vec<PathBuf>,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self {
            load_builtin_rules: true,
            additional_rule_paths: Vec::new(),
        }
    }

    pub fn load_builtin_rules(mut self, load_builtin_rules: bool) -> Self {
        self.load_builtin_rules = load_builtin_rules;
        self
    }

    pub fn additional_rule_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.additional_rule_paths = paths;
        self
    }

    pub fn from_rule_specifiers(specs: &RuleSpecifierArgs) -> Self {
        Self::new()
            .load_builtin_rules(specs.load_builtins)
            .additional_rule_paths(specs.rules_path.clone())
    }

    pub fn load(&self) -> Result<Rules> {
        let mut rules = if self.load_builtin_rules {
            titus_core::defaults::get_builtin_rules()?
        } else {
            Rules::new()
        };

        if !self.additional_rule_paths.is_empty() {
            rules.extend(Rules::from_paths(&self.additional_rule_paths)?);
        }

        rules.rules.sort_by(|a, b| a.id().cmp(b.id()));

        Ok(rules)
    }
}

impl Default for RuleLoader {
    fn default() -> Self {
        Self::new()
    }
}
