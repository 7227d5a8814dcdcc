use anyhow::{Context, Result};

use titus_rules::Rules;

/// A small built-in rule set covering a few widely recognizable secret formats.
///
/// The full reference rule corpus (hundreds of entries covering most forges and cloud providers)
/// is distributed separately and loaded via `--rules-path`; this set exists so that `scan` and
/// `rules list` produce useful output with no external rules directory configured.
const DEFAULT_RULES_YAML: &str = include_str!("default_rules.yml");

pub fn get_builtin_rules() -> Result<Rules> {
    Rules::from_paths_and_contents([(
        std::path::Path::new("<builtin>"),
        DEFAULT_RULES_YAML.as_bytes(),
    )])
    .context("Failed to parse builtin rules")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_rules_parse() {
        let rules = get_builtin_rules().unwrap();
        assert!(!rules.is_empty());
    }

    #[test]
    fn builtin_rules_have_unique_ids() {
        let rules = get_builtin_rules().unwrap();
        let mut ids: Vec<&str> = rules.iter().map(|r| r.id()).collect();
        ids.sort_unstable();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
    }
}
